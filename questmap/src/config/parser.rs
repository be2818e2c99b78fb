//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_ZOOM;
use crate::quest::TeamMode;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("tile_zoom") {
            let zoom: u8 = parse_number("download", "tile_zoom", v)?;
            if zoom > MAX_ZOOM {
                return Err(invalid(
                    "download",
                    "tile_zoom",
                    v,
                    &format!("must be at most {}", MAX_ZOOM),
                ));
            }
            config.download.tile_zoom = zoom;
        }
        if let Some(v) = section.get("refresh_after_hours") {
            config.download.refresh_after_hours =
                parse_number("download", "refresh_after_hours", v)?;
        }
        if let Some(v) = section.get("api_url") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid(
                    "download",
                    "api_url",
                    v,
                    "must be an http:// or https:// URL",
                ));
            }
            config.download.api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = section.get("notes_limit") {
            config.download.notes_limit = parse_positive("download", "notes_limit", v)?;
        }
        if let Some(v) = section.get("timeout_secs") {
            config.download.timeout_secs = parse_positive("download", "timeout_secs", v)?;
        }
    }

    // [team_mode] section
    if let Some(section) = ini.section(Some("team_mode")) {
        if let Some(v) = section.get("team_size") {
            config.team_mode.team_size = parse_number("team_mode", "team_size", v)?;
        }
        if let Some(v) = section.get("index_in_team") {
            config.team_mode.index_in_team = parse_number("team_mode", "index_in_team", v)?;
        }
        if config.team_mode.team_size != 0 {
            TeamMode::new(config.team_mode.team_size, config.team_mode.index_in_team).map_err(
                |e| {
                    invalid(
                        "team_mode",
                        "team_size",
                        &config.team_mode.team_size.to_string(),
                        &e.to_string(),
                    )
                },
            )?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + Default + PartialEq,
{
    let parsed: T = parse_number(section, key, value)?;
    if parsed == T::default() {
        return Err(invalid(section, key, value, "must be a positive integer"));
    }
    Ok(parsed)
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_download_section() {
        let config = parse(
            "[download]\n\
             tile_zoom = 14\n\
             refresh_after_hours = 1\n\
             api_url = https://api.example.org/api/0.6/\n\
             notes_limit = 100\n\
             timeout_secs = 5\n",
        )
        .unwrap();

        assert_eq!(config.download.tile_zoom, 14);
        assert_eq!(config.download.refresh_after_hours, 1);
        assert_eq!(config.download.api_url, "https://api.example.org/api/0.6");
        assert_eq!(config.download.notes_limit, 100);
        assert_eq!(config.download.timeout_secs, 5);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(parse("[download]\ntile_zoom = 23\n").is_err());
        assert!(parse("[download]\nnotes_limit = 0\n").is_err());
        assert!(parse("[download]\napi_url = ftp://example.org\n").is_err());
        assert!(parse("[download]\ntimeout_secs = -1\n").is_err());
    }

    #[test]
    fn test_team_mode_section() {
        let config = parse("[team_mode]\nteam_size = 3\nindex_in_team = 2\n").unwrap();
        assert_eq!(config.team_mode.mode(), Some(TeamMode::new(3, 2).unwrap()));

        let off = parse("[team_mode]\nteam_size = 0\n").unwrap();
        assert_eq!(off.team_mode.mode(), None);

        let err = parse("[team_mode]\nteam_size = 3\nindex_in_team = 3\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref section, .. } if section == "team_mode"
        ));
    }

    #[test]
    fn test_logging_section_expands_tilde() {
        let config = parse("[logging]\ndirectory = ~/ql\nfile = q.log\n").unwrap();
        assert_eq!(config.logging.file, "q.log");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.logging.directory, home.join("ql"));
        }
    }
}
