//! Quests and their visibility.
//!
//! Quests live in per-group stores ([`QuestSource`]). Whether a quest shows
//! up on the map depends on three independent inputs:
//!
//! 1. its [`QuestStatus`] (only `New` is visible)
//! 2. whether the user disabled its type ([`VisibleQuestTypes`])
//! 3. team mode ([`TeamModeQuestFilter`])
//!
//! The [`VisibleQuestRegistry`] combines all of them into a single event
//! stream and query surface.

mod filters;
mod memory;
mod registry;
mod source;
mod types;

pub use filters::{
    QuestTypeVisibilityListener, TeamMode, TeamModeError, TeamModeListener, TeamModeQuestFilter,
    VisibleQuestTypes, MIN_TEAM_SIZE,
};
pub use memory::{MemoryQuestStore, ReplaceSummary};
pub use registry::{RegisteredSource, VisibleQuestListener, VisibleQuestRegistry};
pub use source::{QuestSource, QuestStatusListener};
pub use types::{Quest, QuestAndGroup, QuestGeometry, QuestGroup, QuestId, QuestStatus};
