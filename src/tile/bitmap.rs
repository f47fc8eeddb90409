//! Tile identity and cached tile values.

use std::fmt;
use std::sync::Arc;

use crate::geometry::WorldRectangle;
use crate::grid::TileMatrixCell;

use super::buffer::PixelBuffer;

// =============================================================================
// Keys
// =============================================================================

/// A scale used as part of a cache key.
///
/// The text form is the shortest decimal string that round-trips the value,
/// without exponent notation; it doubles as the scale directory name on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaleKey {
    text: Arc<str>,
    bits: u64,
}

impl ScaleKey {
    pub fn new(scale: f64) -> Self {
        Self {
            text: format_scale(scale).into(),
            bits: scale.to_bits(),
        }
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ScaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Decimal text for a scale, e.g. `4374754` or `0.5`.
pub fn format_scale(scale: f64) -> String {
    format!("{}", scale)
}

/// Cache key for one tile: `(scale, row, column)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub scale: ScaleKey,
    pub row: i64,
    pub column: i64,
}

impl TileKey {
    pub fn new(scale: f64, row: i64, column: i64) -> Self {
        Self {
            scale: ScaleKey::new(scale),
            row,
            column,
        }
    }

    /// The `row:column` part of the key.
    pub fn row_column(&self) -> String {
        format!("{}:{}", self.row, self.column)
    }
}

// =============================================================================
// Bitmap Tile
// =============================================================================

/// A tile as handed out by or given to a cache.
///
/// `pixels` is `None` on a cache miss, so hits and misses flow through the
/// same type.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapTile {
    pub bounding_box: WorldRectangle,
    pub scale: f64,
    pub row: i64,
    pub column: i64,
    pub pixels: Option<PixelBuffer>,
}

impl BitmapTile {
    /// An empty tile for `cell` at `scale`.
    pub fn empty(cell: &TileMatrixCell, scale: f64) -> Self {
        Self {
            bounding_box: cell.bounding_box,
            scale,
            row: cell.row,
            column: cell.column,
            pixels: None,
        }
    }

    /// A tile for `cell` carrying `pixels`.
    pub fn with_pixels(cell: &TileMatrixCell, scale: f64, pixels: PixelBuffer) -> Self {
        Self {
            pixels: Some(pixels),
            ..Self::empty(cell, scale)
        }
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.scale, self.row, self.column)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_scale() {
        assert_eq!(format_scale(4_374_754.0), "4374754");
        assert_eq!(format_scale(0.5), "0.5");
        assert_eq!(format_scale(1e-7), "0.0000001");
    }

    #[test]
    fn test_scale_key_round_trips_value() {
        let key = ScaleKey::new(295_828_763.795_777_5);
        assert_eq!(key.value(), 295_828_763.795_777_5);
        assert_eq!(key.as_str().parse::<f64>().unwrap(), key.value());
    }

    #[test]
    fn test_tile_key_equality() {
        assert_eq!(TileKey::new(1000.0, 1, 2), TileKey::new(1000.0, 1, 2));
        assert_ne!(TileKey::new(1000.0, 1, 2), TileKey::new(1000.0, 2, 1));
        assert_ne!(TileKey::new(1000.0, 1, 2), TileKey::new(1000.5, 1, 2));
        assert_eq!(TileKey::new(5.0, 3, 4).row_column(), "3:4");
    }

    #[test]
    fn test_bitmap_tile_empty() {
        let cell = TileMatrixCell::new(1, 2, WorldRectangle::new(0.0, 1.0, 1.0, 0.0));
        let tile = BitmapTile::empty(&cell, 10.0);
        assert!(tile.is_empty());
        assert_eq!(tile.key(), TileKey::new(10.0, 1, 2));

        let filled = BitmapTile::with_pixels(&cell, 10.0, PixelBuffer::new(1, 1));
        assert!(!filled.is_empty());
    }
}
