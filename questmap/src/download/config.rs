//! Configuration for the tile download coordinator.

use std::time::Duration;

/// Zoom level of the tile grid that downloads are requested and recorded in.
pub const DEFAULT_DOWNLOAD_TILE_ZOOM: u8 = 16;

/// Default freshness window (in hours).
///
/// Data downloaded more recently than this is not downloaded again.
pub const DEFAULT_REFRESH_DATA_AFTER_HOURS: u64 = 12;

/// Coordinator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Zoom level of the tile rects handed to `request_download`.
    pub tile_zoom: u8,

    /// How long downloaded data stays fresh.
    pub refresh_data_after: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tile_zoom: DEFAULT_DOWNLOAD_TILE_ZOOM,
            refresh_data_after: Duration::from_secs(DEFAULT_REFRESH_DATA_AFTER_HOURS * 60 * 60),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tile zoom level.
    pub fn with_tile_zoom(mut self, zoom: u8) -> Self {
        self.tile_zoom = zoom;
        self
    }

    /// Set the freshness window.
    pub fn with_refresh_data_after(mut self, window: Duration) -> Self {
        self.refresh_data_after = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.tile_zoom, 16);
        assert_eq!(config.refresh_data_after, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_builders() {
        let config = CoordinatorConfig::new()
            .with_tile_zoom(14)
            .with_refresh_data_after(Duration::from_secs(60));
        assert_eq!(config.tile_zoom, 14);
        assert_eq!(config.refresh_data_after.as_secs(), 60);
    }
}
