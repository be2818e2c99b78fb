//! INI serialization logic for converting `ConfigFile` → INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[download]
; Zoom level of the tile grid downloads are requested in (default: 16)
tile_zoom = {}
; Hours before an already downloaded area is downloaded again (default: 12)
refresh_after_hours = {}
; OSM API base URL
api_url = {}
; Maximum number of notes fetched per request
notes_limit = {}
; HTTP request timeout in seconds
timeout_secs = {}

[team_mode]
; Number of mappers splitting the quests between them (0 = team mode off)
team_size = {}
; Your slot in the team, from 0 to team_size - 1
index_in_team = {}

[logging]
; Directory for log files
directory = {}
; Log file name (cleared on every start)
file = {}
"#,
        config.download.tile_zoom,
        config.download.refresh_after_hours,
        config.download.api_url,
        config.download.notes_limit,
        config.download.timeout_secs,
        config.team_mode.team_size,
        config.team_mode.index_in_team,
        config.logging.directory.display(),
        config.logging.file,
    )
}
