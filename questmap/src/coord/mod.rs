//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and the Web Mercator tile grid that downloads and freshness tracking are
//! keyed by.

mod types;

pub use types::{
    grid_size, BoundingBox, CoordError, TilePos, TileRect, TileRectIterator, MAX_LAT, MAX_LON,
    MAX_ZOOM, MIN_LAT, MIN_LON,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
#[inline]
pub fn to_tile_pos(lat: f64, lon: f64, zoom: u8) -> Result<TilePos, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let x = ((lon + 180.0) / 360.0 * n) as u32;

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    Ok(TilePos { x, y })
}

/// Converts a tile grid corner back to geographic coordinates.
///
/// Returns the latitude/longitude of the northwest corner of tile `(x, y)`.
/// `x == 2^zoom` / `y == 2^zoom` are accepted and yield the east / south edge
/// of the world. Takes `u64` so the corner past the last `u32` tile is
/// representable.
#[inline]
pub fn tile_to_lat_lon(x: u64, y: u64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = x as f64 / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * (y as f64 / n))).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}
