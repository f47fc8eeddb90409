//! Tile values and the image codec boundary.
//!
//! # Components
//!
//! - [`PixelBuffer`]: Owned RGBA8 image every cache backend and the compositor share
//! - [`BitmapTile`]: A tile at `(scale, row, column)` with optional pixels (absent = miss)
//! - [`TileKey`] / [`ScaleKey`]: Hashable cache keys
//! - [`TileEncoder`]: PNG/JPEG encode and decode, used only by the disk backends
//!
//! # Example
//!
//! ```
//! use geotile_cache::tile::{PixelBuffer, TileKey};
//!
//! let key = TileKey::new(4_374_754.0, 3, 7);
//! assert_eq!(key.scale.as_str(), "4374754");
//!
//! let tile = PixelBuffer::filled(256, 256, [255, 255, 255, 255]);
//! assert_eq!(tile.stride(), 256 * 4);
//! ```

mod bitmap;
mod buffer;
mod encoder;

pub use bitmap::{format_scale, BitmapTile, ScaleKey, TileKey};
pub use buffer::{PixelBuffer, BYTES_PER_PIXEL};
pub use encoder::{
    clamp_quality, is_valid_quality, ImageFormat, TileEncoder, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
