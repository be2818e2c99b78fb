//! User-controlled visibility filters.
//!
//! Two filters feed into quest visibility besides the quest status:
//!
//! - [`VisibleQuestTypes`]: quest types the user switched off
//! - [`TeamModeQuestFilter`]: when mapping in a team, each member only sees
//!   the share of quests assigned to their slot
//!
//! Both are shared, mutable at runtime and publish changes to listeners.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

use super::types::Quest;
use crate::listeners::ListenerList;

// ─────────────────────────────────────────────────────────────────────────────
// Quest type visibility
// ─────────────────────────────────────────────────────────────────────────────

/// Notified when quest types are enabled or disabled.
pub trait QuestTypeVisibilityListener: Send + Sync {
    fn on_quest_type_visibilities_changed(&self);
}

/// Set of quest types the user has disabled.
#[derive(Default)]
pub struct VisibleQuestTypes {
    disabled: RwLock<HashSet<String>>,
    listeners: ListenerList<dyn QuestTypeVisibilityListener>,
}

impl VisibleQuestTypes {
    /// All quest types enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `disabled` switched off.
    pub fn with_disabled<I, S>(disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disabled: RwLock::new(disabled.into_iter().map(Into::into).collect()),
            listeners: ListenerList::new(),
        }
    }

    pub fn is_visible(&self, quest_type: &str) -> bool {
        !self.disabled.read().contains(quest_type)
    }

    /// Enable or disable one quest type. Listeners are only told about
    /// actual changes.
    pub fn set_visible(&self, quest_type: &str, visible: bool) {
        let changed = {
            let mut disabled = self.disabled.write();
            if visible {
                disabled.remove(quest_type)
            } else {
                disabled.insert(quest_type.to_string())
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Re-enable every quest type.
    pub fn clear(&self) {
        let changed = {
            let mut disabled = self.disabled.write();
            let had_any = !disabled.is_empty();
            disabled.clear();
            had_any
        };
        if changed {
            self.notify();
        }
    }

    pub fn disabled(&self) -> HashSet<String> {
        self.disabled.read().clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn QuestTypeVisibilityListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn QuestTypeVisibilityListener>) -> bool {
        self.listeners.remove(listener)
    }

    fn notify(&self) {
        self.listeners
            .for_each(|l| l.on_quest_type_visibilities_changed());
    }
}

impl std::fmt::Debug for VisibleQuestTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibleQuestTypes")
            .field("disabled", &*self.disabled.read())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Team mode
// ─────────────────────────────────────────────────────────────────────────────

/// Smallest team for which team mode makes sense.
pub const MIN_TEAM_SIZE: u32 = 2;

/// Invalid team mode settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TeamModeError {
    #[error("team size must be at least 2, got {0}")]
    TeamTooSmall(u32),

    #[error("index in team {index_in_team} is out of range for team of {team_size}")]
    IndexOutOfRange { team_size: u32, index_in_team: u32 },
}

/// Notified when team mode is switched on, off or reassigned.
pub trait TeamModeListener: Send + Sync {
    fn on_team_mode_changed(&self, enabled: bool);
}

/// Team mode assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamMode {
    pub team_size: u32,
    pub index_in_team: u32,
}

impl TeamMode {
    pub fn new(team_size: u32, index_in_team: u32) -> Result<Self, TeamModeError> {
        if team_size < MIN_TEAM_SIZE {
            return Err(TeamModeError::TeamTooSmall(team_size));
        }
        if index_in_team >= team_size {
            return Err(TeamModeError::IndexOutOfRange {
                team_size,
                index_in_team,
            });
        }
        Ok(Self {
            team_size,
            index_in_team,
        })
    }
}

/// Splits quests among team members by id.
#[derive(Default)]
pub struct TeamModeQuestFilter {
    mode: RwLock<Option<TeamMode>>,
    listeners: ListenerList<dyn TeamModeListener>,
}

impl TeamModeQuestFilter {
    /// Team mode off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: TeamMode) -> Self {
        Self {
            mode: RwLock::new(Some(mode)),
            listeners: ListenerList::new(),
        }
    }

    pub fn mode(&self) -> Option<TeamMode> {
        *self.mode.read()
    }

    pub fn is_enabled(&self) -> bool {
        self.mode.read().is_some()
    }

    /// Whether `quest` is assigned to this team member.
    pub fn is_visible(&self, quest: &Quest) -> bool {
        match *self.mode.read() {
            None => true,
            Some(mode) => quest.id.0 % u64::from(mode.team_size) == u64::from(mode.index_in_team),
        }
    }

    pub fn enable(&self, team_size: u32, index_in_team: u32) -> Result<(), TeamModeError> {
        let mode = TeamMode::new(team_size, index_in_team)?;
        self.set(Some(mode));
        Ok(())
    }

    pub fn disable(&self) {
        self.set(None);
    }

    fn set(&self, mode: Option<TeamMode>) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous == mode {
            return;
        }
        info!(
            enabled = mode.is_some(),
            team_size = mode.map(|m| m.team_size),
            index_in_team = mode.map(|m| m.index_in_team),
            "Team mode changed"
        );
        self.listeners
            .for_each(|l| l.on_team_mode_changed(mode.is_some()));
    }

    pub fn add_listener(&self, listener: Arc<dyn TeamModeListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TeamModeListener>) -> bool {
        self.listeners.remove(listener)
    }
}

impl std::fmt::Debug for TeamModeQuestFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamModeQuestFilter")
            .field("mode", &self.mode())
            .finish()
    }
}
