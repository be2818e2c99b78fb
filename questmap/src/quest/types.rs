//! Quest value types.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::coord::BoundingBox;

/// Identifier of a quest, unique within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QuestId(pub u64);

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for QuestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Open, waiting for an answer.
    New,
    /// Answered locally, answer not yet uploaded.
    Answered,
    /// Hidden by the user.
    Hidden,
    /// Answer uploaded.
    Closed,
    /// Answer reverted.
    Revert,
    /// No longer applicable.
    Invalid,
}

impl QuestStatus {
    /// Only open quests are shown.
    pub fn is_visible(self) -> bool {
        matches!(self, QuestStatus::New)
    }
}

/// Tag naming the store a quest came from.
///
/// `OSM` and `OSM_NOTE` are predefined. Further groups can be declared with
/// [`QuestGroup::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestGroup(&'static str);

impl QuestGroup {
    /// Quests derived from map data.
    pub const OSM: QuestGroup = QuestGroup("osm");

    /// Quests derived from map notes.
    pub const OSM_NOTE: QuestGroup = QuestGroup("osm_note");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for QuestGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for QuestGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Where a quest is located.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestGeometry {
    Point { lat: f64, lon: f64 },
    Extent(BoundingBox),
}

impl QuestGeometry {
    /// Position of the quest marker.
    pub fn marker(&self) -> (f64, f64) {
        match self {
            QuestGeometry::Point { lat, lon } => (*lat, *lon),
            QuestGeometry::Extent(bbox) => bbox.center(),
        }
    }

    /// Whether the quest is shown when looking at `bbox`.
    pub fn is_within(&self, bbox: &BoundingBox) -> bool {
        match self {
            QuestGeometry::Point { lat, lon } => bbox.contains(*lat, *lon),
            QuestGeometry::Extent(extent) => extent.intersects(bbox),
        }
    }
}

/// A question about a map feature awaiting an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quest {
    pub id: QuestId,
    pub quest_type: String,
    pub status: QuestStatus,
    pub group: QuestGroup,
    pub geometry: QuestGeometry,
}

impl Quest {
    /// Create an open point quest.
    pub fn new(
        id: impl Into<QuestId>,
        quest_type: impl Into<String>,
        group: QuestGroup,
        lat: f64,
        lon: f64,
    ) -> Self {
        Self {
            id: id.into(),
            quest_type: quest_type.into(),
            status: QuestStatus::New,
            group,
            geometry: QuestGeometry::Point { lat, lon },
        }
    }

    pub fn with_status(mut self, status: QuestStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_geometry(mut self, geometry: QuestGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.status.is_visible()
    }
}

/// A quest tagged with the group of the store that holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestAndGroup {
    pub quest: Quest,
    pub group: QuestGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_new_is_visible() {
        assert!(QuestStatus::New.is_visible());
        for status in [
            QuestStatus::Answered,
            QuestStatus::Hidden,
            QuestStatus::Closed,
            QuestStatus::Revert,
            QuestStatus::Invalid,
        ] {
            assert!(!status.is_visible(), "{:?} should be hidden", status);
        }
    }

    #[test]
    fn test_custom_group() {
        const SHOP: QuestGroup = QuestGroup::new("shop");
        assert_eq!(SHOP.name(), "shop");
        assert_ne!(SHOP, QuestGroup::OSM);
        assert_eq!(QuestGroup::OSM_NOTE.to_string(), "osm_note");
    }

    #[test]
    fn test_extent_geometry() {
        let extent = QuestGeometry::Extent(BoundingBox::new(53.0, 9.0, 54.0, 10.0));
        assert_eq!(extent.marker(), (53.5, 9.5));
        assert!(extent.is_within(&BoundingBox::new(53.9, 9.9, 55.0, 11.0)));
        assert!(!extent.is_within(&BoundingBox::new(55.0, 9.0, 56.0, 10.0)));
    }

    #[test]
    fn test_quest_serializes_group_as_name() {
        let quest = Quest::new(7, "AddOpeningHours", QuestGroup::OSM, 1.0, 2.0);
        let json = serde_json::to_value(&quest).unwrap();
        assert_eq!(json["group"], "osm");
        assert_eq!(json["status"], "new");
        assert_eq!(json["id"], 7);
    }
}
