//! Full-frame drawing through a tile cache.
//!
//! A frame is assembled from cached tiles wherever possible; the cells that
//! are missing are rendered in a single call covering their union, sliced
//! back into tiles and stored for the next frame.
//!
//! # Frame Flow
//!
//! ```text
//! extent ──▶ drawing extent ──▶ scale ──▶ grid at scale ──▶ intersecting cells
//!                                                               │
//!                        ┌──────────── cached? ─────────────────┤
//!                        ▼ yes                                  ▼ no
//!                   cached tiles                       union of missing cells
//!                        │                                      │ render once
//!                        │  drop tiles inside the union ◀───────┤
//!                        ▼                                      ▼
//!                 draw cached tiles ──▶ draw rendered image ──▶ slice + save
//! ```
//!
//! Renderer errors are returned to the caller unchanged. Nothing is
//! substituted for a failed render.

use tracing::debug;

use crate::cache::{TileCache, TileStore};
use crate::error::{FrameError, RenderError};
use crate::geometry::{ensure_positive, WorldPoint, WorldRectangle};
use crate::grid::{RowColumnRange, TileMatrix, EPSILON};
use crate::tile::PixelBuffer;
use crate::transform::{drawing_extent, scale_of, to_screen_coordinate};

/// Side length, in tiles, of the blocks rendered while seeding.
pub const SEED_BLOCK_TILES: i64 = 8;

// =============================================================================
// Renderer
// =============================================================================

/// External renderer producing the pixels for a world extent.
///
/// The returned buffer must be exactly `width` x `height` pixels.
pub trait TileRenderer {
    fn render(
        &mut self,
        extent: &WorldRectangle,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, RenderError>;
}

impl<F> TileRenderer for F
where
    F: FnMut(&WorldRectangle, u32, u32) -> Result<PixelBuffer, RenderError>,
{
    fn render(
        &mut self,
        extent: &WorldRectangle,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, RenderError> {
        self(extent, width, height)
    }
}

// =============================================================================
// Reports
// =============================================================================

/// A composited frame and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Screen-sized output image
    pub image: PixelBuffer,

    /// Requested extent expanded to the screen aspect ratio
    pub drawing_extent: WorldRectangle,

    /// Scale the frame was drawn at
    pub scale: f64,

    /// Cached tiles drawn into the frame
    pub cached_tiles: usize,

    /// Cells covered by the freshly rendered image
    pub rendered_tiles: usize,

    /// Stand-ins and placeholders drawn for missing cells (previews only)
    pub placeholder_tiles: usize,

    /// Extent passed to the renderer, if it was called
    pub rendered_extent: Option<WorldRectangle>,
}

/// Outcome of pre-rendering an extent at one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Renderer calls made
    pub blocks_rendered: usize,

    /// Tiles stored by the cache
    pub tiles_saved: usize,

    /// Tiles skipped because every tile in their block was cached
    pub tiles_skipped: usize,
}

// =============================================================================
// Frame Compositor
// =============================================================================

/// Draws frames through a [`TileCache`].
///
/// # Example
///
/// ```
/// use geotile_cache::cache::{CacheSettings, MemoryTileStore, TileCache};
/// use geotile_cache::compositor::FrameCompositor;
/// use geotile_cache::error::RenderError;
/// use geotile_cache::geometry::WorldRectangle;
/// use geotile_cache::tile::PixelBuffer;
///
/// let cache = TileCache::new(MemoryTileStore::new(), CacheSettings::default()).unwrap();
/// let compositor = FrameCompositor::new(cache);
///
/// let mut renderer = |_: &WorldRectangle, width: u32, height: u32| -> Result<PixelBuffer, RenderError> {
///     Ok(PixelBuffer::filled(width, height, [0, 0, 255, 255]))
/// };
///
/// let extent = WorldRectangle::new(-10.0, 10.0, 10.0, -10.0);
/// let frame = compositor.draw(&extent, 512, 512, &mut renderer).unwrap();
/// assert_eq!(frame.image.width(), 512);
///
/// // Everything is cached now.
/// let again = compositor.draw(&extent, 512, 512, &mut renderer).unwrap();
/// assert_eq!(again.rendered_tiles, 0);
/// ```
pub struct FrameCompositor<S> {
    cache: TileCache<S>,
}

impl<S: TileStore> FrameCompositor<S> {
    pub fn new(cache: TileCache<S>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &TileCache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TileCache<S> {
        &mut self.cache
    }

    pub fn into_cache(self) -> TileCache<S> {
        self.cache
    }

    /// Draw `extent` on a `screen_width` x `screen_height` frame.
    ///
    /// Missing cells are rendered with one call to `renderer` covering their
    /// union, then stored through the cache.
    ///
    /// # Errors
    ///
    /// Invalid input, grid overflow, renderer failure and cache write
    /// failures are returned as-is.
    pub fn draw<R: TileRenderer + ?Sized>(
        &self,
        extent: &WorldRectangle,
        screen_width: u32,
        screen_height: u32,
        renderer: &mut R,
    ) -> Result<FrameReport, FrameError> {
        let (drawing, scale, matrix) = self.prepare(extent, screen_width, screen_height)?;
        let cells = matrix.intersecting_cells(&drawing)?;

        let mut cached = Vec::new();
        let mut missing: Option<RowColumnRange> = None;
        for cell in &cells {
            match self.cache.get_tile_for_cell(cell, scale).pixels {
                Some(pixels) => cached.push((cell.bounding_box, pixels)),
                None => missing = Some(extend_range(missing, cell.row, cell.column)),
            }
        }

        let mut frame = PixelBuffer::new(screen_width, screen_height);
        let rendered = match missing.and_then(|range| {
            matrix.range_bounding_box(&range).map(|bbox| (range, bbox))
        }) {
            Some((range, union)) => {
                let tolerance = EPSILON * matrix.cell_width().max(matrix.cell_height());
                cached.retain(|(bbox, _)| !union.contains_within(bbox, tolerance));

                let image = self.render_range(&range, &union, renderer)?;
                Some((range, union, image))
            }
            None => None,
        };

        for (bbox, pixels) in &cached {
            let (x, y) = screen_position(&drawing, bbox.upper_left, screen_width, screen_height)?;
            frame.draw(pixels, x, y);
        }

        let mut report = FrameReport {
            image: PixelBuffer::new(0, 0),
            drawing_extent: drawing,
            scale,
            cached_tiles: cached.len(),
            rendered_tiles: 0,
            placeholder_tiles: 0,
            rendered_extent: None,
        };

        if let Some((range, union, image)) = rendered {
            let (x, y) = screen_position(&drawing, union.upper_left, screen_width, screen_height)?;
            frame.draw(&image, x, y);
            self.cache.save_tiles(image, &union, scale)?;

            report.rendered_tiles = range.cell_count() as usize;
            report.rendered_extent = Some(union);
        }

        debug!(
            "Drew frame at scale {}: {} cached, {} rendered",
            scale, report.cached_tiles, report.rendered_tiles
        );
        report.image = frame;
        Ok(report)
    }

    /// Draw `extent` from the cache alone.
    ///
    /// Missing cells show a stand-in from a coarser cached scale, or the
    /// loading placeholder when there is none. The renderer is never called.
    pub fn draw_preview(
        &self,
        extent: &WorldRectangle,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<FrameReport, FrameError> {
        let (drawing, scale, matrix) = self.prepare(extent, screen_width, screen_height)?;
        let cells = matrix.intersecting_cells(&drawing)?;

        let mut frame = PixelBuffer::new(screen_width, screen_height);
        let mut cached_tiles = 0;
        let mut placeholder_tiles = 0;
        for cell in &cells {
            let pixels = match self.cache.get_tile_for_cell(cell, scale).pixels {
                Some(pixels) => {
                    cached_tiles += 1;
                    pixels
                }
                None => {
                    placeholder_tiles += 1;
                    self.cache
                        .get_higher_scale_tile(scale, cell.row, cell.column)?
                        .and_then(|tile| tile.pixels)
                        .unwrap_or_else(|| self.cache.loading_tile_image())
                }
            };
            let (x, y) = screen_position(
                &drawing,
                cell.bounding_box.upper_left,
                screen_width,
                screen_height,
            )?;
            frame.draw(&pixels, x, y);
        }

        Ok(FrameReport {
            image: frame,
            drawing_extent: drawing,
            scale,
            cached_tiles,
            rendered_tiles: 0,
            placeholder_tiles,
            rendered_extent: None,
        })
    }

    /// Pre-render every cell intersecting `extent` at `scale` into the cache.
    ///
    /// Cells are rendered in blocks of up to [`SEED_BLOCK_TILES`] squared;
    /// blocks already fully cached are skipped. Works on row/column ranges,
    /// so extents above the cell cap are fine.
    pub fn seed<R: TileRenderer + ?Sized>(
        &self,
        extent: &WorldRectangle,
        scale: f64,
        renderer: &mut R,
    ) -> Result<SeedReport, FrameError> {
        let matrix = self.cache.matrix_for_scale(scale)?;
        let range = matrix.intersecting_row_column_range(extent)?;
        let mut report = SeedReport::default();
        if range.is_empty() {
            return Ok(report);
        }

        let mut block_row = range.min_row;
        while block_row <= range.max_row {
            let mut block_column = range.min_column;
            while block_column <= range.max_column {
                let block = RowColumnRange::new(
                    block_row,
                    (block_row + SEED_BLOCK_TILES - 1).min(range.max_row),
                    block_column,
                    (block_column + SEED_BLOCK_TILES - 1).min(range.max_column),
                );
                self.seed_block(&matrix, &block, scale, renderer, &mut report)?;
                block_column += SEED_BLOCK_TILES;
            }
            block_row += SEED_BLOCK_TILES;
        }

        debug!(
            "Seeded scale {}: {} tiles saved, {} skipped",
            scale, report.tiles_saved, report.tiles_skipped
        );
        Ok(report)
    }

    fn seed_block<R: TileRenderer + ?Sized>(
        &self,
        matrix: &TileMatrix,
        block: &RowColumnRange,
        scale: f64,
        renderer: &mut R,
        report: &mut SeedReport,
    ) -> Result<(), FrameError> {
        let Some(bbox) = matrix.range_bounding_box(block) else {
            return Ok(());
        };
        let cells = matrix.cells_in_range(block)?;
        let complete = cells
            .iter()
            .all(|cell| !self.cache.get_tile_for_cell(cell, scale).is_empty());
        if complete {
            report.tiles_skipped += cells.len();
            return Ok(());
        }

        let image = self.render_range(block, &bbox, renderer)?;
        report.blocks_rendered += 1;
        report.tiles_saved += self.cache.save_tiles(image, &bbox, scale)?;
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn prepare(
        &self,
        extent: &WorldRectangle,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<(WorldRectangle, f64, TileMatrix), FrameError> {
        ensure_positive("screen_width", f64::from(screen_width))?;
        ensure_positive("screen_height", f64::from(screen_height))?;

        let settings = self.cache.settings();
        let drawing = drawing_extent(extent, f64::from(screen_width), f64::from(screen_height))?;
        let scale = scale_of(&drawing, f64::from(screen_width), settings.unit, settings.dpi)?;
        let matrix = self.cache.matrix_for_scale(scale)?;
        Ok((drawing, scale, matrix))
    }

    /// Render the block of cells `range` covering `bbox`, checking the size.
    fn render_range<R: TileRenderer + ?Sized>(
        &self,
        range: &RowColumnRange,
        bbox: &WorldRectangle,
        renderer: &mut R,
    ) -> Result<PixelBuffer, FrameError> {
        let settings = self.cache.settings();
        let (width, height) = range.pixel_size(settings.tile_width, settings.tile_height)?;

        let image = renderer.render(bbox, width, height)?;
        if image.width() != width || image.height() != height {
            return Err(RenderError::SizeMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: image.width(),
                actual_height: image.height(),
            }
            .into());
        }
        Ok(image)
    }
}

fn extend_range(range: Option<RowColumnRange>, row: i64, column: i64) -> RowColumnRange {
    match range {
        Some(range) => RowColumnRange::new(
            range.min_row.min(row),
            range.max_row.max(row),
            range.min_column.min(column),
            range.max_column.max(column),
        ),
        None => RowColumnRange::new(row, row, column, column),
    }
}

/// Pixel position of `point` on the frame, rounded to the nearest pixel.
fn screen_position(
    drawing: &WorldRectangle,
    point: WorldPoint,
    screen_width: u32,
    screen_height: u32,
) -> Result<(i64, i64), FrameError> {
    let screen = to_screen_coordinate(
        drawing,
        point,
        f64::from(screen_width),
        f64::from(screen_height),
    )?;
    Ok((screen.x.round() as i64, screen.y.round() as i64))
}

// =============================================================================
// Tests
// =============================================================================
