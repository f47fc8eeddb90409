//! Tile caches.
//!
//! A [`TileCache`] applies the access policy, knows the grid geometry for
//! every scale, and delegates storage to a [`TileStore`] backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   TileCache                     │
//! │  access mode gate · grid per scale · slicing    │
//! │  placeholders · higher-scale fallback           │
//! └────────────────────────┬────────────────────────┘
//!                          │ TileStore
//!        ┌─────────────────┼─────────────────────┐
//!        ▼                 ▼                     ▼
//! ┌──────────────┐  ┌──────────────┐  ┌─────────────────────┐
//! │ MemoryTile-  │  │ FileTile-    │  │ SessionFileTile-    │
//! │ Store (FIFO) │  │ Store (disk) │  │ Store (generations) │
//! └──────────────┘  └──────────────┘  └─────────────────────┘
//! ```
//!
//! # Access Modes
//!
//! | Mode | get | save | delete / clear |
//! |---|---|---|---|
//! | `Default` | yes | yes | yes |
//! | `ReadOnly` | yes | no | no |
//! | `ReadAdd` | yes | yes | no |
//! | `ReadAddDelete` | yes | yes | yes |
//!
//! Calls the mode forbids are silent no-ops.

mod file;
mod memory;
mod session;

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, ValidationError};
use crate::geometry::{ensure_positive, GeographyUnit, ReferenceCorner, WorldRectangle};
use crate::grid::{TileMatrix, TileMatrixCell, EPSILON};
use crate::tile::{format_scale, BitmapTile, PixelBuffer, TileKey};
use crate::transform::{resolution_from_scale, DEFAULT_DPI};

pub use file::{default_cache_directory, FileStoreConfig, FileTileStore, SCALE_MATCH_TOLERANCE};
pub use memory::{MemoryTileStore, DEFAULT_MAXIMUM_TILES_COUNT};
pub use session::{SessionFileTileStore, DEFAULT_CLEANUP_INTERVAL};

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Cached scales at most this many times the requested scale may stand in
/// for a missing tile. Tunable; the bound has no derivation behind it.
pub const HIGHER_SCALE_RATIO_LIMIT: f64 = 33.0;

// =============================================================================
// Tile Store Trait
// =============================================================================

/// Storage backend for a [`TileCache`].
///
/// Implementations own their synchronization; every method takes `&self`.
pub trait TileStore: Send + Sync {
    /// Fetch the pixels for `key`, `None` on a miss.
    ///
    /// Backends treat unreadable entries as misses.
    fn get(&self, key: &TileKey) -> Option<PixelBuffer>;

    /// Store `pixels` under `key`.
    fn put(&self, key: &TileKey, pixels: PixelBuffer) -> Result<(), CacheError>;

    /// Remove the entry for `key` if present.
    fn remove(&self, key: &TileKey) -> Result<(), CacheError>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), CacheError>;

    /// Scales with at least one stored tile.
    fn cached_scales(&self) -> Vec<f64> {
        Vec::new()
    }
}

// =============================================================================
// Access Mode and Settings
// =============================================================================

/// Which operations a cache instance permits besides reads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum CacheAccessMode {
    #[default]
    Default,
    ReadOnly,
    ReadAdd,
    ReadAddDelete,
}

impl CacheAccessMode {
    pub fn allows_add(self) -> bool {
        matches!(
            self,
            CacheAccessMode::Default | CacheAccessMode::ReadAdd | CacheAccessMode::ReadAddDelete
        )
    }

    pub fn allows_delete(self) -> bool {
        matches!(
            self,
            CacheAccessMode::Default | CacheAccessMode::ReadAddDelete
        )
    }
}

/// Grid and pixel geometry shared by every scale of a cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Units of the world coordinate system
    pub unit: GeographyUnit,

    /// Screen resolution used to convert scales to cell sizes
    pub dpi: f64,

    /// Extent the grid is anchored on
    pub grid_extent: WorldRectangle,

    /// Corner of `grid_extent` the grid is anchored at
    pub reference_corner: ReferenceCorner,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::for_unit(GeographyUnit::DecimalDegree)
    }
}

impl CacheSettings {
    /// 256x256 tiles at 96 DPI anchored on the world extent of `unit`.
    pub fn for_unit(unit: GeographyUnit) -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            unit,
            dpi: DEFAULT_DPI,
            grid_extent: unit.world_extent(),
            reference_corner: ReferenceCorner::UpperLeft,
        }
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_grid_extent(mut self, extent: WorldRectangle, corner: ReferenceCorner) -> Self {
        self.grid_extent = extent;
        self.reference_corner = corner;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_positive("tile_width", f64::from(self.tile_width))?;
        ensure_positive("tile_height", f64::from(self.tile_height))?;
        ensure_positive("dpi", self.dpi)?;
        self.grid_extent.validate("grid_extent")
    }

    /// Grid geometry at `scale`: one cell covers one tile's worth of pixels.
    pub fn matrix_for_scale(&self, scale: f64) -> Result<TileMatrix, ValidationError> {
        let resolution = resolution_from_scale(scale, self.unit, self.dpi)?;
        TileMatrix::with_bounding_box(
            format_scale(scale),
            resolution * f64::from(self.tile_width),
            resolution * f64::from(self.tile_height),
            self.grid_extent,
            self.reference_corner,
        )
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Policy layer over a [`TileStore`].
///
/// # Example
///
/// ```
/// use geotile_cache::cache::{CacheSettings, MemoryTileStore, TileCache};
/// use geotile_cache::tile::PixelBuffer;
///
/// let cache = TileCache::new(MemoryTileStore::new(), CacheSettings::default()).unwrap();
///
/// let scale = 1_000_000.0;
/// let mut tile = cache.get_tile(scale, 0, 0).unwrap();
/// assert!(tile.is_empty());
///
/// tile.pixels = Some(PixelBuffer::filled(256, 256, [0, 128, 0, 255]));
/// assert!(cache.save_tile(tile).unwrap());
/// assert!(!cache.get_tile(scale, 0, 0).unwrap().is_empty());
/// ```
pub struct TileCache<S> {
    store: S,
    access_mode: CacheAccessMode,
    settings: CacheSettings,
    no_data_image: OnceLock<PixelBuffer>,
    loading_image: OnceLock<PixelBuffer>,
}

impl<S: TileStore> TileCache<S> {
    /// Create a cache in `Default` access mode.
    pub fn new(store: S, settings: CacheSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self {
            store,
            access_mode: CacheAccessMode::Default,
            settings,
            no_data_image: OnceLock::new(),
            loading_image: OnceLock::new(),
        })
    }

    pub fn with_access_mode(mut self, access_mode: CacheAccessMode) -> Self {
        self.access_mode = access_mode;
        self
    }

    pub fn access_mode(&self) -> CacheAccessMode {
        self.access_mode
    }

    pub fn set_access_mode(&mut self, access_mode: CacheAccessMode) {
        self.access_mode = access_mode;
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Grid geometry at `scale`.
    pub fn matrix_for_scale(&self, scale: f64) -> Result<TileMatrix, ValidationError> {
        self.settings.matrix_for_scale(scale)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The tile at `(scale, row, column)`; empty on a miss.
    pub fn get_tile(&self, scale: f64, row: i64, column: i64) -> Result<BitmapTile, CacheError> {
        let cell = self.matrix_for_scale(scale)?.cell_at(row, column);
        Ok(self.get_tile_for_cell(&cell, scale))
    }

    /// The tile for an already computed `cell`; empty on a miss.
    pub fn get_tile_for_cell(&self, cell: &TileMatrixCell, scale: f64) -> BitmapTile {
        let mut tile = BitmapTile::empty(cell, scale);
        tile.pixels = self.store.get(&tile.key());
        tile
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `tile`. Returns whether it reached the backend.
    ///
    /// Empty tiles and modes without add permission are no-ops.
    pub fn save_tile(&self, tile: BitmapTile) -> Result<bool, CacheError> {
        if !self.access_mode.allows_add() {
            return Ok(false);
        }
        let key = tile.key();
        match tile.pixels {
            Some(pixels) => {
                self.store.put(&key, pixels)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Slice `bitmap`, which covers `bitmap_extent`, into one tile per
    /// intersecting grid cell at `scale` and save each.
    ///
    /// Per-tile storage failures are logged and skipped. `bitmap` is consumed
    /// whether or not saving succeeds. Returns the number of tiles stored.
    pub fn save_tiles(
        &self,
        bitmap: PixelBuffer,
        bitmap_extent: &WorldRectangle,
        scale: f64,
    ) -> Result<usize, CacheError> {
        if !self.access_mode.allows_add() {
            return Ok(0);
        }
        bitmap_extent.validate("bitmap_extent")?;
        let matrix = self.matrix_for_scale(scale)?;
        let cells = matrix.intersecting_cells(bitmap_extent)?;

        let x_factor = f64::from(bitmap.width()) / bitmap_extent.width();
        let y_factor = f64::from(bitmap.height()) / bitmap_extent.height();

        let mut saved = 0;
        for cell in &cells {
            let x = ((cell.bounding_box.min_x() - bitmap_extent.min_x()) * x_factor).round() as i64;
            let y = ((bitmap_extent.max_y() - cell.bounding_box.max_y()) * y_factor).round() as i64;
            let slice = bitmap.crop(x, y, self.settings.tile_width, self.settings.tile_height);

            match self.store.put(&TileKey::new(scale, cell.row, cell.column), slice) {
                Ok(()) => saved += 1,
                Err(e) => warn!(
                    "Failed to save tile {}:{} at scale {}: {}",
                    cell.row, cell.column, scale, e
                ),
            }
        }

        debug!("Saved {} of {} tiles at scale {}", saved, cells.len(), scale);
        Ok(saved)
    }

    /// Remove `tile` from the backend. Returns whether the mode permitted it.
    pub fn delete_tile(&self, tile: &BitmapTile) -> Result<bool, CacheError> {
        if !self.access_mode.allows_delete() {
            return Ok(false);
        }
        self.store.remove(&tile.key())?;
        Ok(true)
    }

    /// Remove every tile at `scale` intersecting `extent`.
    ///
    /// Returns the number of cells visited.
    pub fn delete_tiles(&self, extent: &WorldRectangle, scale: f64) -> Result<usize, CacheError> {
        if !self.access_mode.allows_delete() {
            return Ok(0);
        }
        let matrix = self.matrix_for_scale(scale)?;
        let cells = matrix.intersecting_cells(extent)?;
        for cell in &cells {
            self.store.remove(&TileKey::new(scale, cell.row, cell.column))?;
        }
        Ok(cells.len())
    }

    /// Remove every tile. Returns whether the mode permitted it.
    pub fn clear_cache(&self) -> Result<bool, CacheError> {
        if !self.access_mode.allows_delete() {
            return Ok(false);
        }
        self.store.clear()?;
        Ok(true)
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    /// Placeholder for cells with nothing to show, built once and cloned out.
    pub fn no_data_tile_image(&self) -> PixelBuffer {
        self.no_data_image
            .get_or_init(|| {
                PixelBuffer::filled(
                    self.settings.tile_width,
                    self.settings.tile_height,
                    [240, 240, 240, 255],
                )
            })
            .clone()
    }

    /// Placeholder for cells still being rendered, built once and cloned out.
    pub fn loading_tile_image(&self) -> PixelBuffer {
        self.loading_image
            .get_or_init(|| {
                let (width, height) = (self.settings.tile_width, self.settings.tile_height);
                let mut image = PixelBuffer::filled(width, height, [250, 250, 250, 255]);
                let border = [200, 200, 200, 255];
                for x in 0..width {
                    image.set_pixel(x, 0, border);
                    image.set_pixel(x, height - 1, border);
                }
                for y in 0..height {
                    image.set_pixel(0, y, border);
                    image.set_pixel(width - 1, y, border);
                }
                image
            })
            .clone()
    }

    // =========================================================================
    // Higher-Scale Fallback
    // =========================================================================

    /// Build a stand-in for a missing tile from a coarser cached scale.
    ///
    /// Looks for the smallest cached scale strictly between 1x and
    /// [`HIGHER_SCALE_RATIO_LIMIT`]x the requested one, merges its tiles
    /// covering the requested cell and resamples the result to tile size.
    pub fn get_higher_scale_tile(
        &self,
        scale: f64,
        row: i64,
        column: i64,
    ) -> Result<Option<BitmapTile>, CacheError> {
        let matrix = self.matrix_for_scale(scale)?;
        let cell = matrix.cell_at(row, column);

        let mut candidates: Vec<f64> = self
            .store
            .cached_scales()
            .into_iter()
            .filter(|&cached| {
                let ratio = cached / scale;
                ratio > 1.0 && ratio < HIGHER_SCALE_RATIO_LIMIT
            })
            .collect();
        candidates.sort_by(|a, b| a.total_cmp(b));

        for candidate in candidates {
            if let Some(pixels) = self.merge_from_scale(&cell.bounding_box, candidate)? {
                debug!(
                    "Using scale {} as stand-in for tile {}:{} at scale {}",
                    candidate, row, column, scale
                );
                return Ok(Some(BitmapTile::with_pixels(&cell, scale, pixels)));
            }
        }
        Ok(None)
    }

    fn merge_from_scale(
        &self,
        target: &WorldRectangle,
        source_scale: f64,
    ) -> Result<Option<PixelBuffer>, CacheError> {
        let (tile_width, tile_height) = (self.settings.tile_width, self.settings.tile_height);
        let matrix = self.matrix_for_scale(source_scale)?;
        let range = matrix.intersecting_row_column_range(target)?;
        let mosaic_box = match matrix.range_bounding_box(&range) {
            Some(bbox) => bbox,
            None => return Ok(None),
        };

        let (mosaic_width, mosaic_height) = range.pixel_size(tile_width, tile_height)?;
        let mut mosaic = PixelBuffer::new(mosaic_width, mosaic_height);
        let mut found = false;
        for cell in matrix.cells_in_range(&range)? {
            if let Some(pixels) = self.store.get(&TileKey::new(source_scale, cell.row, cell.column)) {
                let x = (cell.column - range.min_column) * i64::from(tile_width);
                let y = (cell.row - range.min_row) * i64::from(tile_height);
                mosaic.draw(&pixels, x, y);
                found = true;
            }
        }
        if !found {
            return Ok(None);
        }

        let x_factor = f64::from(tile_width) / matrix.cell_width();
        let y_factor = f64::from(tile_height) / matrix.cell_height();
        let x = ((target.min_x() - mosaic_box.min_x()) * x_factor + EPSILON).floor() as i64;
        let y = ((mosaic_box.max_y() - target.max_y()) * y_factor + EPSILON).floor() as i64;
        let width = ((target.width() * x_factor - EPSILON).ceil() as u32).max(1);
        let height = ((target.height() * y_factor - EPSILON).ceil() as u32).max(1);

        let window = mosaic.crop(x, y, width, height);
        Ok(Some(window.resize(tile_width, tile_height)))
    }
}

// =============================================================================
// Tests
// =============================================================================
