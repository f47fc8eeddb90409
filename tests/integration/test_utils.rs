//! Test utilities for integration tests.
//!
//! This module provides renderers that record their calls and helpers for
//! building small, exactly representable tile grids.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geotile_cache::cache::{CacheSettings, TileCache, TileStore};
use geotile_cache::compositor::TileRenderer;
use geotile_cache::error::RenderError;
use geotile_cache::geometry::{GeographyUnit, ReferenceCorner, WorldRectangle};
use geotile_cache::tile::PixelBuffer;

/// Tile size used by every integration test grid.
pub const TILE_SIZE: u32 = 4;

/// Cell size, in degrees, of the grid at [`cell_scale`].
pub const CELL_SIZE: f64 = 10.0;

// =============================================================================
// Grid Helpers
// =============================================================================

/// 4x4 pixel tiles on an 80x80 degree grid anchored at (0, 80).
pub fn test_settings() -> CacheSettings {
    CacheSettings::for_unit(GeographyUnit::DecimalDegree)
        .with_tile_size(TILE_SIZE, TILE_SIZE)
        .with_grid_extent(
            WorldRectangle::new(0.0, 80.0, 80.0, 0.0),
            ReferenceCorner::UpperLeft,
        )
}

/// Scale at which one tile covers `cell_size` world units.
pub fn scale_for_cell_size(settings: &CacheSettings, cell_size: f64) -> f64 {
    cell_size / f64::from(settings.tile_width) * settings.unit.inches_per_unit() * settings.dpi
}

/// Scale at which one tile covers [`CELL_SIZE`] degrees.
pub fn cell_scale() -> f64 {
    scale_for_cell_size(&test_settings(), CELL_SIZE)
}

/// A cache over `store` using [`test_settings`].
pub fn test_cache<S: TileStore>(store: S) -> TileCache<S> {
    TileCache::new(store, test_settings()).unwrap()
}

pub fn solid(color: [u8; 4]) -> PixelBuffer {
    PixelBuffer::filled(TILE_SIZE, TILE_SIZE, color)
}

/// Distinct opaque color for a cell.
pub fn cell_color(row: i64, column: i64) -> [u8; 4] {
    [
        (column.rem_euclid(8) * 32) as u8,
        (row.rem_euclid(8) * 32) as u8,
        128,
        255,
    ]
}

// =============================================================================
// Renderers
// =============================================================================

/// Paints every pixel with the color of the grid cell under its center, and
/// records each call.
///
/// Output depends only on world position, so a frame drawn from cached tiles
/// must match one drawn fresh.
#[derive(Clone, Default)]
pub struct CellColorRenderer {
    calls: Arc<AtomicUsize>,
    extents: Arc<Mutex<Vec<(WorldRectangle, u32, u32)>>>,
}

impl CellColorRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(WorldRectangle, u32, u32)> {
        self.extents.lock().unwrap().clone()
    }
}

impl TileRenderer for CellColorRenderer {
    fn render(
        &mut self,
        extent: &WorldRectangle,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.extents.lock().unwrap().push((*extent, width, height));

        let x_step = extent.width() / f64::from(width);
        let y_step = extent.height() / f64::from(height);
        let mut image = PixelBuffer::new(width, height);
        for py in 0..height {
            let y = extent.max_y() - (f64::from(py) + 0.5) * y_step;
            let row = ((80.0 - y) / CELL_SIZE).floor() as i64;
            for px in 0..width {
                let x = extent.min_x() + (f64::from(px) + 0.5) * x_step;
                let column = (x / CELL_SIZE).floor() as i64;
                image.set_pixel(px, py, cell_color(row, column));
            }
        }
        Ok(image)
    }
}

/// Renderer that always fails.
pub fn failing_renderer(
    _: &WorldRectangle,
    _: u32,
    _: u32,
) -> Result<PixelBuffer, RenderError> {
    Err(RenderError::failed("renderer unavailable"))
}

/// Approximate rectangle equality.
pub fn assert_extent_close(actual: &WorldRectangle, expected: &WorldRectangle) {
    let pairs = [
        (actual.min_x(), expected.min_x()),
        (actual.max_x(), expected.max_x()),
        (actual.min_y(), expected.min_y()),
        (actual.max_y(), expected.max_y()),
    ];
    for (a, e) in pairs {
        assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
    }
}
