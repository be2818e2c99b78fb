//! Settings structs and defaults for `config.ini`.
//!
//! Each struct is one `[section]` of the file.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::{
    CoordinatorConfig, NotesDownloaderConfig, DEFAULT_API_URL, DEFAULT_DOWNLOAD_TILE_ZOOM,
    DEFAULT_NOTES_LIMIT, DEFAULT_REFRESH_DATA_AFTER_HOURS, DEFAULT_TIMEOUT_SECS,
};
use crate::quest::TeamMode;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "questmap.log";

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub team_mode: TeamModeSettings,
    pub logging: LoggingSettings,
}

/// `[download]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Zoom level of the download tile grid
    pub tile_zoom: u8,
    /// Hours before downloaded data is fetched again
    pub refresh_after_hours: u64,
    /// OSM API base URL
    pub api_url: String,
    /// Maximum notes per request
    pub notes_limit: u32,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

/// `[team_mode]`
///
/// A `team_size` of 0 means team mode is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeamModeSettings {
    pub team_size: u32,
    pub index_in_team: u32,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            tile_zoom: DEFAULT_DOWNLOAD_TILE_ZOOM,
            refresh_after_hours: DEFAULT_REFRESH_DATA_AFTER_HOURS,
            api_url: DEFAULT_API_URL.to_string(),
            notes_limit: DEFAULT_NOTES_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: super::file::config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl ConfigFile {
    /// Coordinator settings from `[download]`.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new()
            .with_tile_zoom(self.download.tile_zoom)
            .with_refresh_data_after(Duration::from_secs(
                self.download.refresh_after_hours * 60 * 60,
            ))
    }

    /// Notes downloader settings from `[download]`.
    pub fn notes_config(&self) -> NotesDownloaderConfig {
        NotesDownloaderConfig {
            api_url: self.download.api_url.clone(),
            limit: self.download.notes_limit,
        }
    }
}

impl TeamModeSettings {
    /// The configured team assignment, or `None` when team mode is off.
    pub fn mode(&self) -> Option<TeamMode> {
        if self.team_size == 0 {
            return None;
        }
        TeamMode::new(self.team_size, self.index_in_team).ok()
    }
}
