//! Tile rect downloads.
//!
//! ```text
//! DownloadHandle ──commands──► DownloadService ──► TileDownloadCoordinator
//!                                                       │
//!                          ┌────────────────────────────┼──────────────┐
//!                          ▼                            ▼              ▼
//!                   DownloadedTilesStore        DownloadTask ...  DownloadTask
//!                   (freshness record)          (e.g. notes)      (other domains)
//!                                                       │
//!                                                       ▼
//!                                                quest stores
//! ```
//!
//! The coordinator is the only component that knows about freshness and
//! supersession. Download tasks only fetch their data domain for a bounding
//! box and write it to their store.

mod config;
mod coordinator;
mod error;
mod http;
mod osm_notes;
mod progress;
mod record;
mod service;
mod task;

pub use config::{CoordinatorConfig, DEFAULT_DOWNLOAD_TILE_ZOOM, DEFAULT_REFRESH_DATA_AFTER_HOURS};
pub use coordinator::{DownloadOutcome, TileDownloadCoordinator};
pub use error::{DownloadError, DownloadResult};
pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use osm_notes::{
    parse_notes, NotesDownloaderConfig, OsmNotesDownloader, DEFAULT_API_URL, DEFAULT_NOTES_LIMIT,
    NOTE_QUEST_TYPE,
};
pub use progress::DownloadProgressListener;
pub use record::{
    DownloadKind, DownloadedTilesStore, FileDownloadedTiles, MemoryDownloadedTiles, RecordError,
};
pub use service::{DownloadCommand, DownloadHandle, DownloadService, ServiceError};
pub use task::{BoxFuture, DownloadTask};
