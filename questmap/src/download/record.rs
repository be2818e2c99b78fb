//! Record of which tiles were downloaded, and when.
//!
//! Freshness is tracked per tile (at its zoom level) and per
//! [`DownloadKind`]. A rect counts as fresh for a kind only if *every* tile in
//! it was written at or after the cutoff, so partially covered rects are
//! always stale. Tiles with the same `x`/`y` at different zooms cover
//! different areas and never share an entry.
//!
//! Two stores are provided:
//!
//! - [`MemoryDownloadedTiles`] - concurrent in-memory map
//! - [`FileDownloadedTiles`] - the same, persisted to a JSON file after every
//!   mutation so freshness survives restarts

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::coord::{TilePos, TileRect};

/// What kind of data was downloaded for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadKind {
    /// Marker written by the coordinator once every downloader succeeded.
    All,
    /// Map elements (nodes, ways, relations).
    MapData,
    /// Map notes.
    Notes,
}

impl DownloadKind {
    /// Every kind, in a stable order.
    pub const ALL_KINDS: [DownloadKind; 3] =
        [DownloadKind::All, DownloadKind::MapData, DownloadKind::Notes];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::All => "all",
            DownloadKind::MapData => "map_data",
            DownloadKind::Notes => "notes",
        }
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DownloadKind::All),
            "map_data" => Ok(DownloadKind::MapData),
            "notes" => Ok(DownloadKind::Notes),
            other => Err(RecordError::UnknownKind(other.to_string())),
        }
    }
}

/// Errors from downloaded-tiles stores.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt downloaded tiles file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize downloaded tiles: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown download kind: {0}")]
    UnknownKind(String),
}

/// Store of per-tile download timestamps.
///
/// Entries only ever move forward in time through `put`/`put_at`; a check can
/// therefore never report "fresh" for a tile that was not written, or was
/// written before the cutoff.
pub trait DownloadedTilesStore: Send + Sync {
    /// Kinds for which every tile of `rect` at `zoom` was downloaded at or
    /// after `since`.
    fn get(&self, zoom: u8, rect: &TileRect, since: DateTime<Utc>) -> HashSet<DownloadKind>;

    /// Mark every tile of `rect` at `zoom` as downloaded for `kind` at time
    /// `at`.
    ///
    /// An existing newer timestamp is kept.
    fn put_at(
        &self,
        zoom: u8,
        rect: &TileRect,
        kind: DownloadKind,
        at: DateTime<Utc>,
    ) -> Result<(), RecordError>;

    /// Mark every tile of `rect` at `zoom` as downloaded for `kind` now.
    fn put(&self, zoom: u8, rect: &TileRect, kind: DownloadKind) -> Result<(), RecordError> {
        self.put_at(zoom, rect, kind, Utc::now())
    }

    /// Drop entries written before `cutoff`. Returns how many were removed.
    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RecordError>;

    /// Forget everything, forcing the next request for any area to download.
    fn clear(&self) -> Result<(), RecordError>;
}

/// Key of one record entry.
type EntryKey = (u8, TilePos, DownloadKind);

/// In-memory downloaded-tiles store.
#[derive(Debug, Default)]
pub struct MemoryDownloadedTiles {
    entries: DashMap<EntryKey, DateTime<Utc>>,
}

impl MemoryDownloadedTiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (zoom, tile, kind) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_entries(&self) -> Vec<StoredEntry> {
        let mut entries: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|e| {
                let ((zoom, tile, kind), at) = (e.key(), e.value());
                StoredEntry {
                    zoom: *zoom,
                    x: tile.x,
                    y: tile.y,
                    kind: *kind,
                    timestamp_ms: at.timestamp_millis(),
                }
            })
            .collect();
        entries.sort_by_key(|e| (e.zoom, e.y, e.x, e.kind.as_str()));
        entries
    }
}

impl DownloadedTilesStore for MemoryDownloadedTiles {
    fn get(&self, zoom: u8, rect: &TileRect, since: DateTime<Utc>) -> HashSet<DownloadKind> {
        DownloadKind::ALL_KINDS
            .into_iter()
            .filter(|kind| {
                rect.tiles().all(|tile| {
                    self.entries
                        .get(&(zoom, tile, *kind))
                        .is_some_and(|at| *at >= since)
                })
            })
            .collect()
    }

    fn put_at(
        &self,
        zoom: u8,
        rect: &TileRect,
        kind: DownloadKind,
        at: DateTime<Utc>,
    ) -> Result<(), RecordError> {
        for tile in rect.tiles() {
            self.entries
                .entry((zoom, tile, kind))
                .and_modify(|existing| {
                    if at > *existing {
                        *existing = at;
                    }
                })
                .or_insert(at);
        }
        debug!(zoom, rect = %rect, kind = %kind, "Recorded downloaded tiles");
        Ok(())
    }

    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RecordError> {
        let before = self.entries.len();
        self.entries.retain(|_, at| *at >= cutoff);
        Ok(before - self.entries.len())
    }

    fn clear(&self) -> Result<(), RecordError> {
        self.entries.clear();
        Ok(())
    }
}

/// On-disk representation of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    zoom: u8,
    x: u32,
    y: u32,
    kind: DownloadKind,
    timestamp_ms: i64,
}

/// Downloaded-tiles store persisted as a JSON file.
///
/// The whole record is rewritten after each mutation (via a temporary file
/// and rename). Reads are served from memory.
#[derive(Debug)]
pub struct FileDownloadedTiles {
    path: PathBuf,
    memory: MemoryDownloadedTiles,
    write_lock: Mutex<()>,
}

impl FileDownloadedTiles {
    /// Open the record at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let memory = MemoryDownloadedTiles::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| RecordError::Io {
                path: path.clone(),
                source,
            })?;
            let entries: Vec<StoredEntry> =
                serde_json::from_str(&content).map_err(|source| RecordError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            for entry in entries {
                let Some(at) = DateTime::<Utc>::from_timestamp_millis(entry.timestamp_ms) else {
                    warn!(
                        timestamp_ms = entry.timestamp_ms,
                        "Skipping downloaded tile entry with invalid timestamp"
                    );
                    continue;
                };
                memory
                    .entries
                    .insert((entry.zoom, TilePos::new(entry.x, entry.y), entry.kind), at);
            }
            debug!(path = %path.display(), entries = memory.len(), "Loaded downloaded tiles");
        }

        Ok(Self {
            path,
            memory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), RecordError> {
        let _guard = self.write_lock.lock();
        let content = serde_json::to_string(&self.memory.to_entries())?;

        let io_err = |source| RecordError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl DownloadedTilesStore for FileDownloadedTiles {
    fn get(&self, zoom: u8, rect: &TileRect, since: DateTime<Utc>) -> HashSet<DownloadKind> {
        self.memory.get(zoom, rect, since)
    }

    fn put_at(
        &self,
        zoom: u8,
        rect: &TileRect,
        kind: DownloadKind,
        at: DateTime<Utc>,
    ) -> Result<(), RecordError> {
        self.memory.put_at(zoom, rect, kind, at)?;
        self.save()
    }

    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RecordError> {
        let removed = self.memory.remove_older_than(cutoff)?;
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<(), RecordError> {
        self.memory.clear()?;
        self.save()
    }
}
