//! Coordinate types: tile positions, tile rectangles and bounding boxes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{tile_to_lat_lon, to_tile_pos};

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;
/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;
/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;
/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;
/// Highest supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Errors from coordinate conversions and tile rect construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("invalid zoom level: {0} (max 22)")]
    InvalidZoom(u8),

    /// Rect edges are inverted.
    #[error("invalid tile rect: left={left} top={top} right={right} bottom={bottom}")]
    InvalidRect {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },

    /// Rect reaches past the tile grid of its zoom level.
    #[error("tile rect [{left},{top} - {right},{bottom}] is outside the {grid}x{grid} grid at zoom {zoom}")]
    OutsideGrid {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        zoom: u8,
        grid: u64,
    },
}

/// Number of tiles along each axis of the grid at `zoom`.
pub fn grid_size(zoom: u8) -> u64 {
    1u64 << zoom.min(MAX_ZOOM)
}

/// A single tile in the slippy-map tile grid.
///
/// `x` grows eastward, `y` grows southward. The zoom level is not part of the
/// position; callers carry it alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: u32,
    pub y: u32,
}

impl TilePos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Geographic area covered by this tile at the given zoom.
    pub fn as_bounding_box(&self, zoom: u8) -> BoundingBox {
        TileRect::single(*self).as_bounding_box(zoom)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.x, self.y)
    }
}

/// Immutable rectangle of tiles, edges inclusive.
///
/// Equality is by value: two rects with the same edges are the same rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl TileRect {
    /// Create a rect from its inclusive edges.
    ///
    /// # Errors
    ///
    /// Returns `CoordError::InvalidRect` if `left > right` or `top > bottom`.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, CoordError> {
        if left > right || top > bottom {
            return Err(CoordError::InvalidRect {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Create a rect whose tiles all exist in the grid at `zoom`.
    ///
    /// # Errors
    ///
    /// Returns `CoordError::InvalidZoom` above [`MAX_ZOOM`],
    /// `CoordError::InvalidRect` for inverted edges and
    /// `CoordError::OutsideGrid` if an edge is `>= 2^zoom`.
    pub fn new_at(
        zoom: u8,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    ) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let rect = Self::new(left, top, right, bottom)?;
        if !rect.is_within_grid(zoom) {
            return Err(CoordError::OutsideGrid {
                left,
                top,
                right,
                bottom,
                zoom,
                grid: grid_size(zoom),
            });
        }
        Ok(rect)
    }

    /// A rect containing exactly one tile.
    pub fn single(tile: TilePos) -> Self {
        Self {
            left: tile.x,
            top: tile.y,
            right: tile.x,
            bottom: tile.y,
        }
    }

    /// Smallest rect at `zoom` that covers the given bounding box.
    pub fn enclosing(bbox: &BoundingBox, zoom: u8) -> Result<Self, CoordError> {
        let max_index = (1u64 << zoom).saturating_sub(1) as u32;
        let top_left = to_tile_pos(bbox.max_lat, bbox.min_lon, zoom)?;
        let bottom_right = to_tile_pos(bbox.min_lat, bbox.max_lon, zoom)?;
        Self::new(
            top_left.x.min(max_index),
            top_left.y.min(max_index),
            bottom_right.x.min(max_index),
            bottom_right.y.min(max_index),
        )
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    pub fn width(&self) -> u64 {
        u64::from(self.right) - u64::from(self.left) + 1
    }

    pub fn height(&self) -> u64 {
        u64::from(self.bottom) - u64::from(self.top) + 1
    }

    /// Number of tiles in the rect.
    pub fn size(&self) -> u64 {
        self.width().saturating_mul(self.height())
    }

    /// Whether every tile of the rect exists at `zoom`.
    pub fn is_within_grid(&self, zoom: u8) -> bool {
        zoom <= MAX_ZOOM
            && u64::from(self.right) < grid_size(zoom)
            && u64::from(self.bottom) < grid_size(zoom)
    }

    pub fn contains(&self, tile: TilePos) -> bool {
        (self.left..=self.right).contains(&tile.x) && (self.top..=self.bottom).contains(&tile.y)
    }

    /// Iterate over every tile in row-major order.
    pub fn tiles(&self) -> TileRectIterator {
        TileRectIterator {
            rect: *self,
            next: Some(TilePos::new(self.left, self.top)),
        }
    }

    /// Geographic area covered by the rect at the given zoom.
    ///
    /// The northwest corner comes from the top-left tile, the southeast corner
    /// from the northwest corner of the tile diagonally past the bottom-right.
    pub fn as_bounding_box(&self, zoom: u8) -> BoundingBox {
        let (max_lat, min_lon) = tile_to_lat_lon(self.left.into(), self.top.into(), zoom);
        let (min_lat, max_lon) = tile_to_lat_lon(
            u64::from(self.right) + 1,
            u64::from(self.bottom) + 1,
            zoom,
        );
        BoundingBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} - {},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Row-major iterator over the tiles of a [`TileRect`].
#[derive(Debug, Clone)]
pub struct TileRectIterator {
    rect: TileRect,
    next: Option<TilePos>,
}

impl Iterator for TileRectIterator {
    type Item = TilePos;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current.x < self.rect.right {
            Some(TilePos::new(current.x + 1, current.y))
        } else if current.y < self.rect.bottom {
            Some(TilePos::new(self.rect.left, current.y + 1))
        } else {
            None
        };
        Some(current)
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southernmost latitude
    pub min_lat: f64,
    /// Westernmost longitude
    pub min_lon: f64,
    /// Northernmost latitude
    pub max_lat: f64,
    /// Easternmost longitude
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Formats as `left,bottom,right,top`, the order the OSM API expects.
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
