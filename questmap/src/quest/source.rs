//! Quest store abstraction.
//!
//! Each quest group is backed by one store implementing [`QuestSource`].
//! Stores publish their changes through [`QuestStatusListener`]; the
//! [`VisibleQuestRegistry`](super::VisibleQuestRegistry) is the main
//! subscriber.

use std::collections::HashSet;
use std::sync::Arc;

use super::types::{Quest, QuestGroup, QuestId, QuestStatus};
use crate::coord::BoundingBox;

/// Change notifications from a quest store.
pub trait QuestStatusListener: Send + Sync {
    /// A quest the store has never seen was created.
    fn on_added(&self, quest: &Quest);

    /// The status (or content) of a known quest changed.
    fn on_changed(&self, quest: &Quest, previous_status: QuestStatus);

    /// A quest was deleted from the store.
    fn on_removed(&self, id: QuestId, previous_status: QuestStatus);

    /// Many quests changed at once, typically after a download.
    fn on_updated(&self, added: &[Quest], updated: &[Quest], deleted: &[QuestId]);
}

/// A store of quests for one group.
pub trait QuestSource: Send + Sync {
    fn group(&self) -> QuestGroup;

    fn add_listener(&self, listener: Arc<dyn QuestStatusListener>);

    fn remove_listener(&self, listener: &Arc<dyn QuestStatusListener>) -> bool;

    /// Number of visible quests in `bbox`.
    fn visible_count_in(&self, bbox: &BoundingBox) -> usize;

    /// Visible quests in `bbox`, restricted to `quest_types` when given.
    fn visible_in(&self, bbox: &BoundingBox, quest_types: Option<&HashSet<String>>) -> Vec<Quest>;
}
