//! Download task for map notes.
//!
//! Fetches the open notes in a bounding box from the OSM API and replaces the
//! note quests of that area in a [`MemoryQuestStore`] with one batch update.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::DownloadError;
use super::http::{HttpClient, ReqwestClient};
use super::task::{BoxFuture, DownloadTask};
use crate::coord::BoundingBox;
use crate::quest::{MemoryQuestStore, Quest, QuestGroup};

/// Public OSM API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openstreetmap.org/api/0.6";

/// Most notes the API returns for one request.
pub const DEFAULT_NOTES_LIMIT: u32 = 10_000;

/// Quest type given to every note quest.
pub const NOTE_QUEST_TYPE: &str = "OsmNoteQuest";

/// Settings for [`OsmNotesDownloader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesDownloaderConfig {
    pub api_url: String,
    pub limit: u32,
}

impl Default for NotesDownloaderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            limit: DEFAULT_NOTES_LIMIT,
        }
    }
}

/// Downloads open notes as quests of group [`QuestGroup::OSM_NOTE`].
pub struct OsmNotesDownloader<C: HttpClient = ReqwestClient> {
    client: C,
    config: NotesDownloaderConfig,
    store: Arc<MemoryQuestStore>,
}

impl OsmNotesDownloader<ReqwestClient> {
    /// Downloader using a reqwest client with the given timeout.
    pub fn with_timeout(
        config: NotesDownloaderConfig,
        store: Arc<MemoryQuestStore>,
        timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        Ok(Self::new(
            ReqwestClient::with_timeout(timeout_secs)?,
            config,
            store,
        ))
    }
}

impl<C: HttpClient> OsmNotesDownloader<C> {
    pub fn new(client: C, config: NotesDownloaderConfig, store: Arc<MemoryQuestStore>) -> Self {
        Self {
            client,
            config,
            store,
        }
    }

    fn notes_url(&self, bbox: &BoundingBox) -> String {
        format!(
            "{}/notes.json?bbox={}&limit={}&closed=0",
            self.config.api_url.trim_end_matches('/'),
            bbox,
            self.config.limit
        )
    }
}

impl<C: HttpClient> DownloadTask for OsmNotesDownloader<C> {
    fn name(&self) -> &str {
        "osm-notes"
    }

    fn download(
        &self,
        bbox: BoundingBox,
        cancellation: CancellationToken,
    ) -> BoxFuture<'_, Result<(), DownloadError>> {
        Box::pin(async move {
            if cancellation.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let url = self.notes_url(&bbox);
            debug!(url = %url, "Requesting notes");

            let body = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(DownloadError::Cancelled),
                result = self.client.get(&url) => result?,
            };

            let quests = parse_notes(&body)?;

            // A cancelled download must not touch the store
            if cancellation.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let summary = self.store.replace_in_bbox(&bbox, quests);
            info!(
                bbox = %bbox,
                added = summary.added,
                updated = summary.updated,
                deleted = summary.deleted,
                "Downloaded notes"
            );
            Ok(())
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GeoJSON
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NoteCollection {
    #[serde(default)]
    features: Vec<NoteFeature>,
}

#[derive(Deserialize)]
struct NoteFeature {
    geometry: NotePoint,
    properties: NoteProperties,
}

#[derive(Deserialize)]
struct NotePoint {
    /// `[lon, lat]`
    coordinates: [f64; 2],
}

#[derive(Deserialize)]
struct NoteProperties {
    id: u64,
    status: String,
}

/// Parse a notes GeoJSON feature collection into open note quests.
///
/// Closed notes are skipped.
pub fn parse_notes(body: &[u8]) -> Result<Vec<Quest>, DownloadError> {
    let collection: NoteCollection = serde_json::from_slice(body)?;

    Ok(collection
        .features
        .into_iter()
        .filter(|feature| feature.properties.status == "open")
        .map(|feature| {
            let [lon, lat] = feature.geometry.coordinates;
            Quest::new(
                feature.properties.id,
                NOTE_QUEST_TYPE,
                QuestGroup::OSM_NOTE,
                lat,
                lon,
            )
        })
        .collect())
}
