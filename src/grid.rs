//! Tile grid decomposition.
//!
//! A [`TileMatrix`] divides a bounding box into `row_count x column_count`
//! cells of `cell_width x cell_height` world units. Rows count downward from
//! the top edge and columns rightward from the left edge, regardless of which
//! corner anchors the grid.
//!
//! # Boundary Semantics
//!
//! Every floor/ceiling applies [`EPSILON`] to absorb floating-point drift at
//! cell edges. The sign differs between the low and high edge of a query:
//! `intersecting_*` uses `floor(d + ε)` for the low edge and `floor(d - ε)`
//! for the high edge, so an extent whose edge sits exactly on a cell boundary
//! does not pick up the neighbouring cell. `contained_*` uses
//! `ceil(d - ε)` and `floor(d + ε) - 1`, yielding interior cells only.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, ValidationError};
use crate::geometry::{ensure_positive, ReferenceCorner, WorldPoint, WorldRectangle};

/// Tolerance applied to every floor/ceiling in the grid math.
pub const EPSILON: f64 = 1e-6;

/// Largest cell list a query may materialize.
pub const MAX_CELL_COUNT: u64 = 1_000_000;

/// Upper bound on row and column counts, so every index fits in `i64`.
pub const MAX_AXIS_COUNT: u64 = i64::MAX as u64;

// =============================================================================
// Cells and Ranges
// =============================================================================

/// One cell of a tile matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileMatrixCell {
    pub row: i64,
    pub column: i64,
    pub bounding_box: WorldRectangle,
}

impl TileMatrixCell {
    pub fn new(row: i64, column: i64, bounding_box: WorldRectangle) -> Self {
        Self {
            row,
            column,
            bounding_box,
        }
    }
}

/// Inclusive row and column bounds of a block of cells.
///
/// An empty range has `min > max` on at least one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowColumnRange {
    pub min_row: i64,
    pub max_row: i64,
    pub min_column: i64,
    pub max_column: i64,
}

impl RowColumnRange {
    pub fn new(min_row: i64, max_row: i64, min_column: i64, max_column: i64) -> Self {
        Self {
            min_row,
            max_row,
            min_column,
            max_column,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, -1, 0, -1)
    }

    pub fn is_empty(&self) -> bool {
        self.min_row > self.max_row || self.min_column > self.max_column
    }

    pub fn row_count(&self) -> u64 {
        span(self.min_row, self.max_row)
    }

    pub fn column_count(&self) -> u64 {
        span(self.min_column, self.max_column)
    }

    /// Number of cells covered, saturating instead of overflowing.
    pub fn cell_count(&self) -> u64 {
        self.row_count().saturating_mul(self.column_count())
    }

    /// Pixel size of this block with `tile_width x tile_height` tiles.
    pub fn pixel_size(&self, tile_width: u32, tile_height: u32) -> Result<(u32, u32), ValidationError> {
        Ok((
            pixel_span("width", self.column_count(), tile_width)?,
            pixel_span("height", self.row_count(), tile_height)?,
        ))
    }

    pub fn contains(&self, row: i64, column: i64) -> bool {
        row >= self.min_row && row <= self.max_row && column >= self.min_column && column <= self.max_column
    }
}

/// Inclusive length of `min..=max`, saturating at `u64::MAX`.
fn span(min: i64, max: i64) -> u64 {
    if min > max {
        return 0;
    }
    let length = i128::from(max) - i128::from(min) + 1;
    u64::try_from(length).unwrap_or(u64::MAX)
}

fn pixel_span(parameter: &'static str, cells: u64, tile_size: u32) -> Result<u32, ValidationError> {
    u32::try_from(cells)
        .ok()
        .and_then(|cells| cells.checked_mul(tile_size))
        .ok_or(ValidationError::PixelSizeOverflow {
            parameter,
            cells,
            tile_size,
        })
}

// =============================================================================
// Tile Matrix
// =============================================================================

/// Grid geometry for one scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrix {
    id: String,
    cell_width: f64,
    cell_height: f64,
    row_count: u64,
    column_count: u64,
    reference_corner: ReferenceCorner,
    reference_point: WorldPoint,
    bounding_box: WorldRectangle,
}

impl TileMatrix {
    /// Build from an explicit bounding box; counts are derived.
    ///
    /// `rows = ceil(height / cell_height - ε)` and
    /// `columns = ceil(width / cell_width - ε)`, both clamped to
    /// `1..=MAX_AXIS_COUNT`. The stored bounding box is then recomputed from
    /// the reference point and counts so the two representations agree.
    pub fn with_bounding_box(
        id: impl Into<String>,
        cell_width: f64,
        cell_height: f64,
        bounding_box: WorldRectangle,
        reference_corner: ReferenceCorner,
    ) -> Result<Self, ValidationError> {
        ensure_positive("cell_width", cell_width)?;
        ensure_positive("cell_height", cell_height)?;
        bounding_box.validate("bounding_box")?;

        let row_count = axis_count(bounding_box.height() / cell_height);
        let column_count = axis_count(bounding_box.width() / cell_width);
        let reference_point = reference_corner.point_of(&bounding_box);

        Ok(Self::assemble(
            id.into(),
            cell_width,
            cell_height,
            reference_point,
            reference_corner,
            row_count,
            column_count,
        ))
    }

    /// Build from a reference point and explicit counts; the bounding box is derived.
    pub fn with_reference_point(
        id: impl Into<String>,
        cell_width: f64,
        cell_height: f64,
        reference_point: WorldPoint,
        reference_corner: ReferenceCorner,
        row_count: u64,
        column_count: u64,
    ) -> Result<Self, ValidationError> {
        ensure_positive("cell_width", cell_width)?;
        ensure_positive("cell_height", cell_height)?;
        reference_point.validate("reference_point")?;

        Ok(Self::assemble(
            id.into(),
            cell_width,
            cell_height,
            reference_point,
            reference_corner,
            row_count.clamp(1, MAX_AXIS_COUNT),
            column_count.clamp(1, MAX_AXIS_COUNT),
        ))
    }

    fn assemble(
        id: String,
        cell_width: f64,
        cell_height: f64,
        reference_point: WorldPoint,
        reference_corner: ReferenceCorner,
        row_count: u64,
        column_count: u64,
    ) -> Self {
        let bounding_box = reference_corner.rectangle_from(
            reference_point,
            cell_width * column_count as f64,
            cell_height * row_count as f64,
        );
        Self {
            id,
            cell_width,
            cell_height,
            row_count,
            column_count,
            reference_corner,
            reference_point,
            bounding_box,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn column_count(&self) -> u64 {
        self.column_count
    }

    pub fn reference_corner(&self) -> ReferenceCorner {
        self.reference_corner
    }

    pub fn reference_point(&self) -> WorldPoint {
        self.reference_point
    }

    pub fn bounding_box(&self) -> WorldRectangle {
        self.bounding_box
    }

    /// Replace the bounding box, recomputing reference point and counts.
    pub fn set_bounding_box(&mut self, bounding_box: WorldRectangle) -> Result<(), ValidationError> {
        *self = Self::with_bounding_box(
            self.id.clone(),
            self.cell_width,
            self.cell_height,
            bounding_box,
            self.reference_corner,
        )?;
        Ok(())
    }

    /// Replace the reference point, recomputing the bounding box.
    pub fn set_reference_point(&mut self, reference_point: WorldPoint) -> Result<(), ValidationError> {
        reference_point.validate("reference_point")?;
        *self = Self::assemble(
            std::mem::take(&mut self.id),
            self.cell_width,
            self.cell_height,
            reference_point,
            self.reference_corner,
            self.row_count,
            self.column_count,
        );
        Ok(())
    }

    // =========================================================================
    // Cell Lookup
    // =========================================================================

    /// The cell at `(row, column)`.
    ///
    /// Indices outside the grid are not rejected; the box is extrapolated.
    pub fn cell_at(&self, row: i64, column: i64) -> TileMatrixCell {
        let min_x = self.bounding_box.upper_left.x + self.cell_width * column as f64;
        let max_y = self.bounding_box.upper_left.y - self.cell_height * row as f64;
        TileMatrixCell::new(
            row,
            column,
            WorldRectangle::new(min_x, max_y, min_x + self.cell_width, max_y - self.cell_height),
        )
    }

    /// The cell containing `point`.
    pub fn cell_containing(&self, point: WorldPoint) -> Result<TileMatrixCell, ValidationError> {
        point.validate("point")?;
        let origin = self.bounding_box.upper_left;
        let row = ((origin.y - point.y) / self.cell_height + EPSILON).floor() as i64;
        let column = ((point.x - origin.x) / self.cell_width + EPSILON).floor() as i64;
        Ok(self.cell_at(row, column))
    }

    // =========================================================================
    // Range Queries
    // =========================================================================

    fn clamp_range(&self, min_row: f64, max_row: f64, min_column: f64, max_column: f64) -> RowColumnRange {
        let last_row = self.row_count as f64 - 1.0;
        let last_column = self.column_count as f64 - 1.0;

        if max_row < 0.0 || max_column < 0.0 || min_row > last_row || min_column > last_column {
            return RowColumnRange::empty();
        }

        let range = RowColumnRange::new(
            min_row.max(0.0) as i64,
            max_row.min(last_row) as i64,
            min_column.max(0.0) as i64,
            max_column.min(last_column) as i64,
        );
        if range.is_empty() {
            RowColumnRange::empty()
        } else {
            range
        }
    }

    /// Row/column bounds of every cell that intersects `extent`.
    pub fn intersecting_row_column_range(
        &self,
        extent: &WorldRectangle,
    ) -> Result<RowColumnRange, ValidationError> {
        extent.validate("extent")?;
        let origin = self.bounding_box.upper_left;

        let min_column = ((extent.min_x() - origin.x) / self.cell_width + EPSILON).floor();
        let max_column = ((extent.max_x() - origin.x) / self.cell_width - EPSILON).floor();
        let min_row = ((origin.y - extent.max_y()) / self.cell_height + EPSILON).floor();
        let max_row = ((origin.y - extent.min_y()) / self.cell_height - EPSILON).floor();

        Ok(self.clamp_range(min_row, max_row, min_column, max_column))
    }

    /// Row/column bounds of every cell lying entirely inside `extent`.
    pub fn contained_row_column_range(
        &self,
        extent: &WorldRectangle,
    ) -> Result<RowColumnRange, ValidationError> {
        extent.validate("extent")?;
        let origin = self.bounding_box.upper_left;

        let min_column = ((extent.min_x() - origin.x) / self.cell_width - EPSILON).ceil();
        let max_column = ((extent.max_x() - origin.x) / self.cell_width + EPSILON).floor() - 1.0;
        let min_row = ((origin.y - extent.max_y()) / self.cell_height - EPSILON).ceil();
        let max_row = ((origin.y - extent.min_y()) / self.cell_height + EPSILON).floor() - 1.0;

        Ok(self.clamp_range(min_row, max_row, min_column, max_column))
    }

    /// Every cell intersecting `extent`, row-major.
    ///
    /// Fails with [`GridError::TooManyCells`] above [`MAX_CELL_COUNT`].
    pub fn intersecting_cells(&self, extent: &WorldRectangle) -> Result<Vec<TileMatrixCell>, GridError> {
        let range = self.intersecting_row_column_range(extent)?;
        self.materialize(&range)
    }

    /// Every cell lying entirely inside `extent`, row-major.
    pub fn contained_cells(&self, extent: &WorldRectangle) -> Result<Vec<TileMatrixCell>, GridError> {
        let range = self.contained_row_column_range(extent)?;
        self.materialize(&range)
    }

    /// Expand a range into its cells, refusing ranges above the cap.
    pub fn cells_in_range(&self, range: &RowColumnRange) -> Result<Vec<TileMatrixCell>, GridError> {
        self.materialize(range)
    }

    fn materialize(&self, range: &RowColumnRange) -> Result<Vec<TileMatrixCell>, GridError> {
        let count = range.cell_count();
        if count > MAX_CELL_COUNT {
            return Err(GridError::TooManyCells {
                count,
                limit: MAX_CELL_COUNT,
            });
        }

        let mut cells = Vec::with_capacity(count as usize);
        if range.is_empty() {
            return Ok(cells);
        }
        for row in range.min_row..=range.max_row {
            for column in range.min_column..=range.max_column {
                cells.push(self.cell_at(row, column));
            }
        }
        Ok(cells)
    }

    /// World extent covered by a block of cells.
    pub fn range_bounding_box(&self, range: &RowColumnRange) -> Option<WorldRectangle> {
        if range.is_empty() {
            return None;
        }
        let upper_left = self.cell_at(range.min_row, range.min_column).bounding_box;
        let lower_right = self.cell_at(range.max_row, range.max_column).bounding_box;
        Some(WorldRectangle::from_corners(
            upper_left.upper_left,
            lower_right.lower_right,
        ))
    }
}

/// `ceil(cells - ε)` clamped to `1..=MAX_AXIS_COUNT`.
fn axis_count(cells: f64) -> u64 {
    let count = (cells - EPSILON).ceil().max(1.0);
    if count >= MAX_AXIS_COUNT as f64 {
        MAX_AXIS_COUNT
    } else {
        count as u64
    }
}

// =============================================================================
// Tests
// =============================================================================
