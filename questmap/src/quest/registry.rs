//! Registry of quests currently visible on the map.
//!
//! The registry holds no quests itself. It subscribes to every quest store
//! and to the visibility filters, and republishes a normalized stream of
//! "these quests appeared / these ids disappeared" events per group.
//!
//! ```text
//! ┌──────────────┐  on_added / on_changed / on_removed / on_updated
//! │ QuestSource  │ ─────────────────────────────────┐
//! │ (per group)  │                                  │
//! └──────────────┘                                  ▼
//! ┌──────────────┐  on_team_mode_changed   ┌────────────────────┐  on_updated_visible_quests
//! │ TeamMode     │ ──────────────────────▶ │VisibleQuestRegistry│ ─────────────────────────▶ subscribers
//! └──────────────┘                         └────────────────────┘  on_visible_quests_invalidated
//! ┌──────────────┐  on_quest_type_visibilities_changed   ▲
//! │ QuestTypes   │ ───────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! # Single events vs batches
//!
//! Single-quest events only look at the quest status. Batch updates
//! additionally drop quest types the user disabled (for stores registered
//! with [`RegisteredSource::with_quest_type_filter`]) and apply team mode.
//! Downstream subscribers depend on this event shape, so both paths are kept
//! as they are.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::filters::{
    QuestTypeVisibilityListener, TeamModeListener, TeamModeQuestFilter, VisibleQuestTypes,
};
use super::source::{QuestSource, QuestStatusListener};
use super::types::{Quest, QuestAndGroup, QuestGroup, QuestId, QuestStatus};
use crate::coord::BoundingBox;
use crate::listeners::ListenerList;

/// Subscriber to visible quest changes.
pub trait VisibleQuestListener: Send + Sync {
    /// Quests in `group` became visible (`added`) or stopped being visible
    /// (`removed`).
    fn on_updated_visible_quests(&self, added: &[Quest], removed: &[QuestId], group: QuestGroup);

    /// Visibility changed in a way not expressed as a diff. Re-query
    /// everything.
    fn on_visible_quests_invalidated(&self);
}

/// A quest store plus how the registry treats its batches.
#[derive(Clone)]
pub struct RegisteredSource {
    source: Arc<dyn QuestSource>,
    filter_quest_types: bool,
}

impl RegisteredSource {
    pub fn new(source: Arc<dyn QuestSource>) -> Self {
        Self {
            source,
            filter_quest_types: false,
        }
    }

    /// Batches from this store drop quests of disabled types before
    /// visibility is computed.
    pub fn with_quest_type_filter(source: Arc<dyn QuestSource>) -> Self {
        Self {
            source,
            filter_quest_types: true,
        }
    }

    pub fn group(&self) -> QuestGroup {
        self.source.group()
    }
}

/// Aggregates all quest stores into one view of visible quests.
pub struct VisibleQuestRegistry {
    sources: Vec<RegisteredSource>,
    quest_types: Arc<VisibleQuestTypes>,
    team_mode: Arc<TeamModeQuestFilter>,
    listeners: ListenerList<dyn VisibleQuestListener>,

    store_adapters: Vec<Arc<dyn QuestStatusListener>>,
    team_mode_adapter: Arc<dyn TeamModeListener>,
    quest_types_adapter: Arc<dyn QuestTypeVisibilityListener>,
}

impl VisibleQuestRegistry {
    /// Build the registry and subscribe it to every store and filter.
    ///
    /// Subscriptions are removed again when the registry is dropped.
    pub fn new(
        sources: Vec<RegisteredSource>,
        quest_types: Arc<VisibleQuestTypes>,
        team_mode: Arc<TeamModeQuestFilter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|registry: &Weak<Self>| {
            let store_adapters: Vec<Arc<dyn QuestStatusListener>> = sources
                .iter()
                .map(|entry| {
                    let adapter: Arc<dyn QuestStatusListener> = Arc::new(StoreAdapter {
                        registry: registry.clone(),
                        group: entry.group(),
                        filter_quest_types: entry.filter_quest_types,
                    });
                    entry.source.add_listener(Arc::clone(&adapter));
                    adapter
                })
                .collect();

            let team_mode_adapter: Arc<dyn TeamModeListener> = Arc::new(InvalidationAdapter {
                registry: registry.clone(),
            });
            team_mode.add_listener(Arc::clone(&team_mode_adapter));

            let quest_types_adapter: Arc<dyn QuestTypeVisibilityListener> =
                Arc::new(InvalidationAdapter {
                    registry: registry.clone(),
                });
            quest_types.add_listener(Arc::clone(&quest_types_adapter));

            debug!(
                groups = ?sources.iter().map(|s| s.group().name()).collect::<Vec<_>>(),
                "Visible quest registry subscribed"
            );

            Self {
                sources,
                quest_types,
                team_mode,
                listeners: ListenerList::new(),
                store_adapters,
                team_mode_adapter,
                quest_types_adapter,
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Number of visible quests in `bbox` across all groups.
    pub fn visible_count(&self, bbox: &BoundingBox) -> usize {
        self.sources
            .iter()
            .map(|entry| entry.source.visible_count_in(bbox))
            .sum()
    }

    /// Every visible quest in `bbox` whose type is in `allowed_types`.
    ///
    /// Returns immediately, without querying any store, when
    /// `allowed_types` is empty.
    pub fn all_visible(
        &self,
        bbox: &BoundingBox,
        allowed_types: &HashSet<String>,
    ) -> Vec<QuestAndGroup> {
        if allowed_types.is_empty() {
            return Vec::new();
        }

        self.sources
            .iter()
            .flat_map(|entry| {
                let group = entry.group();
                entry
                    .source
                    .visible_in(bbox, Some(allowed_types))
                    .into_iter()
                    .filter(|quest| self.team_mode.is_visible(quest))
                    .map(move |quest| QuestAndGroup { quest, group })
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscribers
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn VisibleQuestListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn VisibleQuestListener>) -> bool {
        self.listeners.remove(listener)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Translation
    // ─────────────────────────────────────────────────────────────────────

    fn on_quest_becomes_visible(&self, quest: &Quest, group: QuestGroup) {
        trace!(id = %quest.id, group = %group, "Quest became visible");
        let added = std::slice::from_ref(quest);
        self.listeners
            .for_each(|l| l.on_updated_visible_quests(added, &[], group));
    }

    fn on_quest_becomes_invisible(&self, id: QuestId, group: QuestGroup) {
        trace!(id = %id, group = %group, "Quest became invisible");
        let removed = [id];
        self.listeners
            .for_each(|l| l.on_updated_visible_quests(&[], &removed, group));
    }

    fn on_batch(
        &self,
        added: &[Quest],
        updated: &[Quest],
        deleted: &[QuestId],
        group: QuestGroup,
        filter_quest_types: bool,
    ) {
        let type_enabled =
            |quest: &&Quest| !filter_quest_types || self.quest_types.is_visible(&quest.quest_type);
        let visible = |quest: &Quest| quest.is_visible() && self.team_mode.is_visible(quest);

        let added_quests: Vec<Quest> = added
            .iter()
            .chain(updated.iter())
            .filter(type_enabled)
            .filter(|quest| visible(*quest))
            .cloned()
            .collect();

        let removed_ids: Vec<QuestId> = updated
            .iter()
            .filter(type_enabled)
            .filter(|quest| !visible(*quest))
            .map(|quest| quest.id)
            .chain(deleted.iter().copied())
            .collect();

        debug!(
            group = %group,
            added = added_quests.len(),
            removed = removed_ids.len(),
            "Visible quests updated"
        );

        self.listeners
            .for_each(|l| l.on_updated_visible_quests(&added_quests, &removed_ids, group));
    }

    fn on_invalidated(&self) {
        debug!("Visible quests invalidated");
        self.listeners.for_each(|l| l.on_visible_quests_invalidated());
    }
}

impl Drop for VisibleQuestRegistry {
    fn drop(&mut self) {
        for (entry, adapter) in self.sources.iter().zip(&self.store_adapters) {
            entry.source.remove_listener(adapter);
        }
        self.team_mode.remove_listener(&self.team_mode_adapter);
        self.quest_types.remove_listener(&self.quest_types_adapter);
    }
}

impl std::fmt::Debug for VisibleQuestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibleQuestRegistry")
            .field(
                "groups",
                &self.sources.iter().map(|s| s.group()).collect::<Vec<_>>(),
            )
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapters
// ─────────────────────────────────────────────────────────────────────────────

/// Forwards one store's events, tagged with its group.
struct StoreAdapter {
    registry: Weak<VisibleQuestRegistry>,
    group: QuestGroup,
    filter_quest_types: bool,
}

impl StoreAdapter {
    fn with_registry(&self, f: impl FnOnce(&VisibleQuestRegistry)) {
        if let Some(registry) = self.registry.upgrade() {
            f(&registry);
        }
    }
}

impl QuestStatusListener for StoreAdapter {
    fn on_added(&self, quest: &Quest) {
        if quest.is_visible() {
            self.with_registry(|r| r.on_quest_becomes_visible(quest, self.group));
        }
    }

    fn on_changed(&self, quest: &Quest, previous_status: QuestStatus) {
        match (previous_status.is_visible(), quest.is_visible()) {
            (false, true) => {
                self.with_registry(|r| r.on_quest_becomes_visible(quest, self.group))
            }
            (true, false) => {
                self.with_registry(|r| r.on_quest_becomes_invisible(quest.id, self.group))
            }
            _ => {}
        }
    }

    fn on_removed(&self, id: QuestId, previous_status: QuestStatus) {
        if previous_status.is_visible() {
            self.with_registry(|r| r.on_quest_becomes_invisible(id, self.group));
        }
    }

    fn on_updated(&self, added: &[Quest], updated: &[Quest], deleted: &[QuestId]) {
        self.with_registry(|r| {
            r.on_batch(added, updated, deleted, self.group, self.filter_quest_types)
        });
    }
}

/// Turns filter changes into a blanket invalidation.
struct InvalidationAdapter {
    registry: Weak<VisibleQuestRegistry>,
}

impl InvalidationAdapter {
    fn invalidate(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.on_invalidated();
        }
    }
}

impl TeamModeListener for InvalidationAdapter {
    fn on_team_mode_changed(&self, _enabled: bool) {
        self.invalidate();
    }
}

impl QuestTypeVisibilityListener for InvalidationAdapter {
    fn on_quest_type_visibilities_changed(&self) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::memory::MemoryQuestStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Updated {
            added: Vec<u64>,
            removed: Vec<u64>,
            group: QuestGroup,
        },
        Invalidated,
    }

    #[derive(Default)]
    struct Subscriber {
        events: Mutex<Vec<Event>>,
    }

    impl Subscriber {
        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl VisibleQuestListener for Subscriber {
        fn on_updated_visible_quests(
            &self,
            added: &[Quest],
            removed: &[QuestId],
            group: QuestGroup,
        ) {
            self.events.lock().push(Event::Updated {
                added: added.iter().map(|q| q.id.0).collect(),
                removed: removed.iter().map(|id| id.0).collect(),
                group,
            });
        }

        fn on_visible_quests_invalidated(&self) {
            self.events.lock().push(Event::Invalidated);
        }
    }

    /// Store that only counts how often it is queried.
    struct CountingSource {
        queries: AtomicUsize,
    }

    impl QuestSource for CountingSource {
        fn group(&self) -> QuestGroup {
            QuestGroup::OSM
        }
        fn add_listener(&self, _listener: Arc<dyn QuestStatusListener>) {}
        fn remove_listener(&self, _listener: &Arc<dyn QuestStatusListener>) -> bool {
            false
        }
        fn visible_count_in(&self, _bbox: &BoundingBox) -> usize {
            self.queries.fetch_add(1, Ordering::SeqCst);
            0
        }
        fn visible_in(
            &self,
            _bbox: &BoundingBox,
            _quest_types: Option<&HashSet<String>>,
        ) -> Vec<Quest> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    struct Fixture {
        osm: Arc<MemoryQuestStore>,
        notes: Arc<MemoryQuestStore>,
        quest_types: Arc<VisibleQuestTypes>,
        team_mode: Arc<TeamModeQuestFilter>,
        registry: Arc<VisibleQuestRegistry>,
        subscriber: Arc<Subscriber>,
    }

    fn fixture() -> Fixture {
        let osm = Arc::new(MemoryQuestStore::new(QuestGroup::OSM));
        let notes = Arc::new(MemoryQuestStore::new(QuestGroup::OSM_NOTE));
        let quest_types = Arc::new(VisibleQuestTypes::new());
        let team_mode = Arc::new(TeamModeQuestFilter::new());
        let registry = VisibleQuestRegistry::new(
            vec![
                RegisteredSource::with_quest_type_filter(osm.clone()),
                RegisteredSource::new(notes.clone()),
            ],
            quest_types.clone(),
            team_mode.clone(),
        );
        let subscriber = Arc::new(Subscriber::default());
        registry.add_listener(subscriber.clone());
        Fixture {
            osm,
            notes,
            quest_types,
            team_mode,
            registry,
            subscriber,
        }
    }

    fn quest(id: u64) -> Quest {
        Quest::new(id, "AddRoadName", QuestGroup::OSM, 1.0, 1.0)
    }

    fn updated(added: &[u64], removed: &[u64], group: QuestGroup) -> Event {
        Event::Updated {
            added: added.to_vec(),
            removed: removed.to_vec(),
            group,
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 2.0, 2.0)
    }

    fn types(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_batch_diff() {
        let f = fixture();
        f.osm.insert(quest(2));
        f.subscriber.take();

        f.osm.update(
            vec![quest(1)],
            vec![quest(2).with_status(QuestStatus::Hidden)],
            vec![QuestId(3)],
        );

        assert_eq!(
            f.subscriber.take(),
            vec![updated(&[1], &[2, 3], QuestGroup::OSM)]
        );
    }

    #[test]
    fn test_batch_is_emitted_even_when_empty() {
        let f = fixture();
        f.notes.update(vec![], vec![], vec![]);
        assert_eq!(
            f.subscriber.take(),
            vec![updated(&[], &[], QuestGroup::OSM_NOTE)]
        );
    }

    #[test]
    fn test_single_event_transitions() {
        let f = fixture();

        f.notes.insert(quest(1));
        f.notes.insert(quest(2).with_status(QuestStatus::Answered));
        f.notes.set_status(QuestId(1), QuestStatus::Hidden);
        f.notes.set_status(QuestId(2), QuestStatus::Closed);
        f.notes.set_status(QuestId(2), QuestStatus::New);
        f.notes.remove(QuestId(1));
        f.notes.remove(QuestId(2));

        assert_eq!(
            f.subscriber.take(),
            vec![
                updated(&[1], &[], QuestGroup::OSM_NOTE),
                updated(&[], &[1], QuestGroup::OSM_NOTE),
                updated(&[2], &[], QuestGroup::OSM_NOTE),
                updated(&[], &[2], QuestGroup::OSM_NOTE),
            ]
        );
    }

    #[test]
    fn test_batch_drops_disabled_types_for_filtered_store_only() {
        let f = fixture();
        f.quest_types.set_visible("AddRoadName", false);
        f.subscriber.take();

        f.osm.update(
            vec![quest(1)],
            vec![quest(2).with_status(QuestStatus::Hidden)],
            vec![],
        );
        f.notes.update(vec![quest(5)], vec![], vec![]);

        assert_eq!(
            f.subscriber.take(),
            vec![
                updated(&[], &[], QuestGroup::OSM),
                updated(&[5], &[], QuestGroup::OSM_NOTE),
            ]
        );
    }

    #[test]
    fn test_single_events_ignore_team_mode_batches_apply_it() {
        let f = fixture();
        f.team_mode.enable(2, 0).unwrap();
        f.subscriber.take();

        f.notes.insert(quest(1));
        f.notes.update(vec![quest(3), quest(4)], vec![quest(1)], vec![]);

        assert_eq!(
            f.subscriber.take(),
            vec![
                updated(&[1], &[], QuestGroup::OSM_NOTE),
                updated(&[4], &[1], QuestGroup::OSM_NOTE),
            ]
        );
    }

    #[test]
    fn test_team_mode_toggle_invalidates_without_diff() {
        let f = fixture();
        let second = Arc::new(Subscriber::default());
        f.registry.add_listener(second.clone());

        f.team_mode.enable(3, 1).unwrap();

        assert_eq!(f.subscriber.take(), vec![Event::Invalidated]);
        assert_eq!(second.take(), vec![Event::Invalidated]);
    }

    #[test]
    fn test_quest_type_change_invalidates() {
        let f = fixture();
        f.quest_types.set_visible("AddRoadName", false);
        assert_eq!(f.subscriber.take(), vec![Event::Invalidated]);
    }

    #[test]
    fn test_visible_count_sums_stores() {
        let f = fixture();
        f.osm.insert(quest(1));
        f.osm.insert(quest(2).with_status(QuestStatus::Hidden));
        f.notes.insert(quest(3));

        assert_eq!(f.registry.visible_count(&bbox()), 2);
    }

    #[test]
    fn test_all_visible_filters_types_and_team_mode() {
        let f = fixture();
        f.osm.insert(quest(1));
        f.osm.insert(quest(2));
        let mut other = quest(3);
        other.quest_type = "AddHousenumber".into();
        f.osm.insert(other);
        f.notes.insert(quest(4));

        let all = f.registry.all_visible(&bbox(), &types(&["AddRoadName"]));
        let ids: Vec<(u64, QuestGroup)> = all.iter().map(|q| (q.quest.id.0, q.group)).collect();
        assert_eq!(
            ids,
            vec![
                (1, QuestGroup::OSM),
                (2, QuestGroup::OSM),
                (4, QuestGroup::OSM_NOTE)
            ]
        );

        f.team_mode.enable(2, 0).unwrap();
        let all = f.registry.all_visible(&bbox(), &types(&["AddRoadName"]));
        let ids: Vec<u64> = all.iter().map(|q| q.quest.id.0).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_all_visible_with_no_types_skips_stores() {
        let source = Arc::new(CountingSource {
            queries: AtomicUsize::new(0),
        });
        let registry = VisibleQuestRegistry::new(
            vec![RegisteredSource::new(source.clone())],
            Arc::new(VisibleQuestTypes::new()),
            Arc::new(TeamModeQuestFilter::new()),
        );

        assert!(registry.all_visible(&bbox(), &HashSet::new()).is_empty());
        assert_eq!(source.queries.load(Ordering::SeqCst), 0);

        registry.all_visible(&bbox(), &types(&["AddRoadName"]));
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener_during_delivery() {
        struct SelfRemoving {
            registry: Mutex<Option<Arc<VisibleQuestRegistry>>>,
            me: Mutex<Option<Arc<dyn VisibleQuestListener>>>,
            calls: AtomicUsize,
        }

        impl VisibleQuestListener for SelfRemoving {
            fn on_updated_visible_quests(&self, _: &[Quest], _: &[QuestId], _: QuestGroup) {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let registry = self.registry.lock().take();
                let me = self.me.lock().take();
                if let (Some(registry), Some(me)) = (registry, me) {
                    assert!(registry.remove_listener(&me));
                }
            }
            fn on_visible_quests_invalidated(&self) {}
        }

        let f = fixture();
        let listener = Arc::new(SelfRemoving {
            registry: Mutex::new(Some(f.registry.clone())),
            me: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn VisibleQuestListener> = listener.clone();
        *listener.me.lock() = Some(as_dyn.clone());
        f.registry.add_listener(as_dyn);

        f.notes.insert(quest(1));
        f.notes.insert(quest(2));

        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.subscriber.take().len(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let f = fixture();
        let Fixture {
            osm,
            team_mode,
            registry,
            subscriber,
            ..
        } = f;
        drop(registry);

        osm.insert(quest(1));
        team_mode.enable(2, 1).unwrap();
        assert!(subscriber.take().is_empty());
    }
}
