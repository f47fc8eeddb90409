//! # geotile-cache
//!
//! Tile grid decomposition, tile caching and world/screen coordinate
//! transforms for interactive map renderers.
//!
//! A map frame is drawn by choosing a scale for the requested extent, cutting
//! the world into a grid of fixed-size tiles at that scale, serving every
//! tile that is already cached and rendering only the missing ones.
//!
//! ## Features
//!
//! - **Exact grid math**: epsilon-tolerant row/column selection so
//!   boundary-aligned extents never pick up a neighbouring tile
//! - **Three cache backends**: bounded in-memory FIFO, persistent file tree,
//!   and a session-scoped disk cache with instant clears and background cleanup
//! - **Access modes**: read-only, read/add and read/add/delete gating
//! - **Full-frame compositing**: one renderer call per frame for the union of
//!   missing tiles
//!
//! ## Architecture
//!
//! - [`geometry`] - Points, rectangles, units and grid corners
//! - [`transform`] - Scale, extent, zoom and pan math
//! - [`grid`] - [`TileMatrix`] cell lookup and range queries
//! - [`tile`] - Pixel buffers, tile keys and the PNG/JPEG codec boundary
//! - [`cache`] - [`TileCache`] policy layer and the storage backends
//! - [`compositor`] - [`FrameCompositor`] drawing frames through a cache
//! - [`view`] - [`MapView`] with extent change observers
//! - [`config`] - CLI configuration for the `geotile` binary
//!
//! ## Example
//!
//! ```rust
//! use geotile_cache::{
//!     CacheSettings, FrameCompositor, MemoryTileStore, PixelBuffer, RenderError, TileCache,
//!     WorldRectangle,
//! };
//!
//! let cache = TileCache::new(MemoryTileStore::new(), CacheSettings::default()).unwrap();
//! let compositor = FrameCompositor::new(cache);
//!
//! let mut renderer = |_: &WorldRectangle, w: u32, h: u32| -> Result<PixelBuffer, RenderError> {
//!     Ok(PixelBuffer::filled(w, h, [255, 255, 255, 255]))
//! };
//!
//! let frame = compositor
//!     .draw(&WorldRectangle::new(-20.0, 20.0, 20.0, -20.0), 800, 600, &mut renderer)
//!     .unwrap();
//! assert_eq!((frame.image.width(), frame.image.height()), (800, 600));
//! ```

pub mod cache;
pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod tile;
pub mod transform;
pub mod view;

// Re-export commonly used types
pub use cache::{
    CacheAccessMode, CacheSettings, FileStoreConfig, FileTileStore, MemoryTileStore,
    SessionFileTileStore, TileCache, TileStore,
};
pub use compositor::{FrameCompositor, FrameReport, SeedReport, TileRenderer};
pub use config::{Cli, Command};
pub use error::{CacheError, CodecError, FrameError, GridError, RenderError, ValidationError};
pub use geometry::{GeographyUnit, ReferenceCorner, ScreenPoint, WorldPoint, WorldRectangle};
pub use grid::{RowColumnRange, TileMatrix, TileMatrixCell};
pub use tile::{BitmapTile, ImageFormat, PixelBuffer, TileEncoder, TileKey};
pub use transform::{PanDirection, ZoomLevelSet};
pub use view::{MapObserver, MapView};
