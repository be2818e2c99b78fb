//! In-memory quest store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::source::{QuestSource, QuestStatusListener};
use super::types::{Quest, QuestGroup, QuestId, QuestStatus};
use crate::coord::BoundingBox;
use crate::listeners::ListenerList;

/// [`QuestSource`] keeping all quests of one group in a hash map.
///
/// Listeners are notified after the map lock is released, so they may query
/// the store from inside a callback.
pub struct MemoryQuestStore {
    group: QuestGroup,
    quests: RwLock<HashMap<QuestId, Quest>>,
    listeners: ListenerList<dyn QuestStatusListener>,
}

/// Result of [`MemoryQuestStore::replace_in_bbox`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl MemoryQuestStore {
    pub fn new(group: QuestGroup) -> Self {
        Self {
            group,
            quests: RwLock::new(HashMap::new()),
            listeners: ListenerList::new(),
        }
    }

    pub fn get(&self, id: QuestId) -> Option<Quest> {
        self.quests.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.quests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.read().is_empty()
    }

    /// Insert a quest, or replace the quest with the same id.
    ///
    /// Fires `on_added` for unknown ids and `on_changed` otherwise.
    pub fn insert(&self, quest: Quest) {
        let previous = self.quests.write().insert(quest.id, quest.clone());
        match previous {
            Some(previous) => self
                .listeners
                .for_each(|l| l.on_changed(&quest, previous.status)),
            None => self.listeners.for_each(|l| l.on_added(&quest)),
        }
    }

    /// Change the status of a quest. Returns the previous status.
    pub fn set_status(&self, id: QuestId, status: QuestStatus) -> Option<QuestStatus> {
        let (quest, previous) = {
            let mut quests = self.quests.write();
            let quest = quests.get_mut(&id)?;
            let previous = quest.status;
            quest.status = status;
            (quest.clone(), previous)
        };
        self.listeners.for_each(|l| l.on_changed(&quest, previous));
        Some(previous)
    }

    /// Delete a quest. Returns it if it was present.
    pub fn remove(&self, id: QuestId) -> Option<Quest> {
        let removed = self.quests.write().remove(&id)?;
        self.listeners
            .for_each(|l| l.on_removed(removed.id, removed.status));
        Some(removed)
    }

    /// Apply a batch of changes and fire one `on_updated`.
    pub fn update(&self, added: Vec<Quest>, updated: Vec<Quest>, deleted: Vec<QuestId>) {
        {
            let mut quests = self.quests.write();
            for quest in added.iter().chain(updated.iter()) {
                quests.insert(quest.id, quest.clone());
            }
            for id in &deleted {
                quests.remove(id);
            }
        }
        self.listeners
            .for_each(|l| l.on_updated(&added, &updated, &deleted));
    }

    /// Replace every quest located in `bbox` with `quests`.
    ///
    /// Quests with unknown ids are reported as added, known ids whose
    /// content changed as updated, and quests in `bbox` missing from
    /// `quests` as deleted. One `on_updated` is fired, even if nothing
    /// changed.
    ///
    /// A known quest keeps its local status when that status is anything but
    /// `New`, so hidden or locally answered quests stay that way across
    /// re-downloads.
    pub fn replace_in_bbox(&self, bbox: &BoundingBox, quests: Vec<Quest>) -> ReplaceSummary {
        let mut added = Vec::new();
        let mut updated = Vec::new();
        let deleted: Vec<QuestId>;
        {
            let mut store = self.quests.write();
            let incoming: HashSet<QuestId> = quests.iter().map(|q| q.id).collect();

            deleted = store
                .values()
                .filter(|q| q.geometry.is_within(bbox) && !incoming.contains(&q.id))
                .map(|q| q.id)
                .collect();
            for id in &deleted {
                store.remove(id);
            }

            for mut quest in quests {
                if let Some(existing) = store.get(&quest.id) {
                    if existing.status != QuestStatus::New {
                        quest.status = existing.status;
                    }
                }
                match store.insert(quest.id, quest.clone()) {
                    None => added.push(quest),
                    Some(previous) if previous != quest => updated.push(quest),
                    Some(_) => {}
                }
            }
        }

        let summary = ReplaceSummary {
            added: added.len(),
            updated: updated.len(),
            deleted: deleted.len(),
        };
        debug!(
            group = %self.group,
            bbox = %bbox,
            added = summary.added,
            updated = summary.updated,
            deleted = summary.deleted,
            "Replaced quests in bounding box"
        );

        self.listeners
            .for_each(|l| l.on_updated(&added, &updated, &deleted));
        summary
    }

    fn matches(quest: &Quest, bbox: &BoundingBox) -> bool {
        quest.is_visible() && quest.geometry.is_within(bbox)
    }
}

impl QuestSource for MemoryQuestStore {
    fn group(&self) -> QuestGroup {
        self.group
    }

    fn add_listener(&self, listener: Arc<dyn QuestStatusListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn QuestStatusListener>) -> bool {
        self.listeners.remove(listener)
    }

    fn visible_count_in(&self, bbox: &BoundingBox) -> usize {
        self.quests
            .read()
            .values()
            .filter(|q| Self::matches(q, bbox))
            .count()
    }

    fn visible_in(&self, bbox: &BoundingBox, quest_types: Option<&HashSet<String>>) -> Vec<Quest> {
        let mut visible: Vec<Quest> = self
            .quests
            .read()
            .values()
            .filter(|q| Self::matches(q, bbox))
            .filter(|q| quest_types.map_or(true, |types| types.contains(&q.quest_type)))
            .cloned()
            .collect();
        visible.sort_by_key(|q| q.id);
        visible
    }
}

impl std::fmt::Debug for MemoryQuestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQuestStore")
            .field("group", &self.group)
            .field("quests", &self.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
