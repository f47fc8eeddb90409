//! Extent, scale and coordinate transforms.
//!
//! Everything in this module is a pure function. Inputs are validated up front
//! and rejected with a [`ValidationError`] naming the offending parameter;
//! nothing is silently clamped except the documented scale bounds applied by
//! [`snap_to_zoom_level`].
//!
//! # Conventions
//!
//! - Screen coordinates have their origin at the upper-left corner and grow
//!   downward. World Y grows upward, so the Y axis is inverted between the two.
//! - Scale is the ratio of world distance to on-screen distance at a given DPI:
//!   `scale = extent.width * inches_per_unit * dpi / screen_width`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geometry::{
    ensure_finite, ensure_positive, GeographyUnit, ScreenPoint, WorldPoint, WorldRectangle,
    METERS_PER_INCH,
};

/// Default screen resolution in dots per inch.
pub const DEFAULT_DPI: f64 = 96.0;

/// Scale of zoom level 0 in the classic spherical-mercator level set.
pub const WEB_MERCATOR_LEVEL_ZERO_SCALE: f64 = 591_657_527.591_555;

/// Number of levels in the default spherical-mercator level set.
pub const WEB_MERCATOR_LEVEL_COUNT: usize = 20;

// =============================================================================
// Scale and Resolution
// =============================================================================

/// Scale of `extent` drawn across `screen_width` pixels.
///
/// Angular units use `width * inches_per_degree * dpi / screen_width`. Linear
/// units convert the extent width and the screen width to meters and divide.
pub fn scale_of(
    extent: &WorldRectangle,
    screen_width: f64,
    unit: GeographyUnit,
    dpi: f64,
) -> Result<f64, ValidationError> {
    extent.validate("extent")?;
    ensure_positive("screen_width", screen_width)?;
    ensure_positive("dpi", dpi)?;

    if unit.is_angular() {
        Ok(extent.width() * unit.inches_per_unit() * dpi / screen_width)
    } else {
        let extent_meters = unit.to_meters(extent.width());
        let screen_meters = screen_width / dpi * METERS_PER_INCH;
        Ok(extent_meters / screen_meters)
    }
}

/// World units covered by one pixel at `scale`.
pub fn resolution_from_scale(
    scale: f64,
    unit: GeographyUnit,
    dpi: f64,
) -> Result<f64, ValidationError> {
    ensure_positive("scale", scale)?;
    ensure_positive("dpi", dpi)?;
    Ok(scale / (unit.inches_per_unit() * dpi))
}

/// Inverse of [`resolution_from_scale`].
pub fn scale_from_resolution(
    resolution: f64,
    unit: GeographyUnit,
    dpi: f64,
) -> Result<f64, ValidationError> {
    ensure_positive("resolution", resolution)?;
    ensure_positive("dpi", dpi)?;
    Ok(resolution * unit.inches_per_unit() * dpi)
}

/// The extent a `screen_width` x `screen_height` screen shows at `scale`,
/// centered on `center`.
pub fn extent_from_scale(
    center: WorldPoint,
    scale: f64,
    unit: GeographyUnit,
    screen_width: f64,
    screen_height: f64,
    dpi: f64,
) -> Result<WorldRectangle, ValidationError> {
    center.validate("center")?;
    ensure_positive("screen_width", screen_width)?;
    ensure_positive("screen_height", screen_height)?;
    let resolution = resolution_from_scale(scale, unit, dpi)?;

    Ok(WorldRectangle::from_center(
        center,
        resolution * screen_width,
        resolution * screen_height,
    ))
}

// =============================================================================
// Drawing Extent and Coordinate Conversion
// =============================================================================

/// Expand `extent` to the screen aspect ratio, keeping its center.
///
/// Whichever dimension is relatively too small grows; the other is untouched.
pub fn drawing_extent(
    extent: &WorldRectangle,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldRectangle, ValidationError> {
    extent.validate("extent")?;
    ensure_positive("screen_width", screen_width)?;
    ensure_positive("screen_height", screen_height)?;

    let (width, height) = (extent.width(), extent.height());
    let extent_ratio = height / width;
    let screen_ratio = screen_height / screen_width;
    let center = extent.center();

    if extent_ratio > screen_ratio {
        // Too tall for the screen: widen.
        let new_width = height / screen_ratio;
        Ok(WorldRectangle::from_center(center, new_width, height))
    } else {
        let new_height = width * screen_ratio;
        Ok(WorldRectangle::from_center(center, width, new_height))
    }
}

/// Map a world point to screen pixels for `extent` drawn on the given screen.
pub fn to_screen_coordinate(
    extent: &WorldRectangle,
    world: WorldPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<ScreenPoint, ValidationError> {
    extent.validate("extent")?;
    world.validate("world_point")?;
    ensure_positive("screen_width", screen_width)?;
    ensure_positive("screen_height", screen_height)?;

    let width_factor = screen_width / extent.width();
    let height_factor = screen_height / extent.height();

    Ok(ScreenPoint::new(
        (world.x - extent.upper_left.x) * width_factor,
        (extent.upper_left.y - world.y) * height_factor,
    ))
}

/// Inverse of [`to_screen_coordinate`].
pub fn to_world_coordinate(
    extent: &WorldRectangle,
    screen: ScreenPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldPoint, ValidationError> {
    extent.validate("extent")?;
    screen.validate("screen_point")?;
    ensure_positive("screen_width", screen_width)?;
    ensure_positive("screen_height", screen_height)?;

    let width_factor = screen_width / extent.width();
    let height_factor = screen_height / extent.height();

    Ok(WorldPoint::new(
        extent.upper_left.x + screen.x / width_factor,
        extent.upper_left.y - screen.y / height_factor,
    ))
}

// =============================================================================
// Centering and Zooming
// =============================================================================

/// Move `extent` so its center lands on `center`, keeping its size.
pub fn center_at(
    extent: &WorldRectangle,
    center: WorldPoint,
) -> Result<WorldRectangle, ValidationError> {
    extent.validate("extent")?;
    center.validate("center")?;
    Ok(WorldRectangle::from_center(
        center,
        extent.width(),
        extent.height(),
    ))
}

/// Center the drawing extent on the world point under `screen`.
pub fn center_at_screen_point(
    extent: &WorldRectangle,
    screen: ScreenPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldRectangle, ValidationError> {
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let target = to_world_coordinate(&drawing, screen, screen_width, screen_height)?;
    center_at(&drawing, target)
}

fn ensure_zoom_in_percentage(percentage: f64) -> Result<(), ValidationError> {
    ensure_finite("percentage", percentage)?;
    if percentage <= 0.0 || percentage >= 100.0 {
        return Err(ValidationError::OutOfRange {
            parameter: "percentage",
            value: percentage,
            range: "(0, 100)",
        });
    }
    Ok(())
}

fn resize_about_center(extent: &WorldRectangle, factor: f64) -> WorldRectangle {
    WorldRectangle::from_center(
        extent.center(),
        extent.width() * factor,
        extent.height() * factor,
    )
}

/// Zoom in by `percentage` around `center`.
///
/// The screen aspect ratio is applied first, then the extent is centered on
/// `center` and shrunk to `(100 - percentage)%` of its size.
pub fn zoom_into_center(
    extent: &WorldRectangle,
    percentage: f64,
    center: WorldPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldRectangle, ValidationError> {
    ensure_zoom_in_percentage(percentage)?;
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let centered = center_at(&drawing, center)?;
    Ok(resize_about_center(&centered, (100.0 - percentage) / 100.0))
}

/// Zoom out by `percentage` around `center`, growing to `(100 + percentage)%`.
pub fn zoom_out_to_center(
    extent: &WorldRectangle,
    percentage: f64,
    center: WorldPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldRectangle, ValidationError> {
    ensure_positive("percentage", percentage)?;
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let centered = center_at(&drawing, center)?;
    Ok(resize_about_center(&centered, (100.0 + percentage) / 100.0))
}

/// Re-translate `rescaled` so the world point that was under `offset` in
/// `original` is under `offset` again.
fn pin_to_offset(
    original: &WorldRectangle,
    rescaled: WorldRectangle,
    offset: ScreenPoint,
    screen_width: f64,
    screen_height: f64,
) -> Result<WorldRectangle, ValidationError> {
    let before = to_world_coordinate(original, offset, screen_width, screen_height)?;
    let after = to_world_coordinate(&rescaled, offset, screen_width, screen_height)?;
    Ok(rescaled.translate(before.x - after.x, before.y - after.y))
}

/// Zoom in by `percentage` keeping the world point under `offset` fixed on screen.
pub fn zoom_in_to_offset(
    extent: &WorldRectangle,
    percentage: f64,
    screen_width: f64,
    screen_height: f64,
    offset: ScreenPoint,
) -> Result<WorldRectangle, ValidationError> {
    ensure_zoom_in_percentage(percentage)?;
    offset.validate("offset")?;
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let zoomed = resize_about_center(&drawing, (100.0 - percentage) / 100.0);
    pin_to_offset(&drawing, zoomed, offset, screen_width, screen_height)
}

/// Zoom out by `percentage` keeping the world point under `offset` fixed on screen.
pub fn zoom_out_to_offset(
    extent: &WorldRectangle,
    percentage: f64,
    screen_width: f64,
    screen_height: f64,
    offset: ScreenPoint,
) -> Result<WorldRectangle, ValidationError> {
    ensure_positive("percentage", percentage)?;
    offset.validate("offset")?;
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let zoomed = resize_about_center(&drawing, (100.0 + percentage) / 100.0);
    pin_to_offset(&drawing, zoomed, offset, screen_width, screen_height)
}

/// Rescale to `target_scale`, keeping the world point under `offset` pinned.
#[allow(clippy::too_many_arguments)]
pub fn zoom_to_scale(
    target_scale: f64,
    extent: &WorldRectangle,
    unit: GeographyUnit,
    screen_width: f64,
    screen_height: f64,
    dpi: f64,
    offset: ScreenPoint,
) -> Result<WorldRectangle, ValidationError> {
    ensure_positive("target_scale", target_scale)?;
    offset.validate("offset")?;
    let drawing = drawing_extent(extent, screen_width, screen_height)?;
    let rescaled = extent_from_scale(
        drawing.center(),
        target_scale,
        unit,
        screen_width,
        screen_height,
        dpi,
    )?;
    pin_to_offset(&drawing, rescaled, offset, screen_width, screen_height)
}

// =============================================================================
// Zoom Levels
// =============================================================================

/// An ordered, strictly monotonic list of scales the map may snap to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevelSet {
    scales: Vec<f64>,
    minimum_scale: f64,
    maximum_scale: f64,
}

impl ZoomLevelSet {
    /// Validate and wrap a caller-supplied list of scales.
    pub fn new(scales: Vec<f64>) -> Result<Self, ValidationError> {
        if scales.is_empty() {
            return Err(ValidationError::EmptyZoomLevels {
                parameter: "zoom_levels",
            });
        }
        for &scale in &scales {
            ensure_positive("zoom_levels", scale)?;
        }
        if scales.len() > 1 {
            let increasing = scales[1] > scales[0];
            for (index, pair) in scales.windows(2).enumerate() {
                let ordered = if increasing {
                    pair[1] > pair[0]
                } else {
                    pair[1] < pair[0]
                };
                if !ordered {
                    return Err(ValidationError::UnorderedZoomLevels {
                        parameter: "zoom_levels",
                        index: index + 1,
                    });
                }
            }
        }

        Ok(Self {
            scales,
            minimum_scale: f64::MIN_POSITIVE,
            maximum_scale: f64::MAX,
        })
    }

    /// The classic 20 spherical-mercator levels, each half the previous scale.
    pub fn default_web_mercator() -> Self {
        let scales = (0..WEB_MERCATOR_LEVEL_COUNT)
            .map(|level| WEB_MERCATOR_LEVEL_ZERO_SCALE / f64::from(1u32 << level))
            .collect();
        Self {
            scales,
            minimum_scale: f64::MIN_POSITIVE,
            maximum_scale: f64::MAX,
        }
    }

    /// Clamp scales to `[minimum_scale, maximum_scale]` before snapping.
    pub fn with_scale_bounds(
        mut self,
        minimum_scale: f64,
        maximum_scale: f64,
    ) -> Result<Self, ValidationError> {
        ensure_positive("minimum_scale", minimum_scale)?;
        ensure_positive("maximum_scale", maximum_scale)?;
        if minimum_scale > maximum_scale {
            return Err(ValidationError::OutOfRange {
                parameter: "minimum_scale",
                value: minimum_scale,
                range: "[0, maximum_scale]",
            });
        }
        self.minimum_scale = minimum_scale;
        self.maximum_scale = maximum_scale;
        Ok(self)
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn minimum_scale(&self) -> f64 {
        self.minimum_scale
    }

    pub fn maximum_scale(&self) -> f64 {
        self.maximum_scale
    }

    /// Index of the level nearest to `scale` after clamping to the bounds.
    ///
    /// Distance is measured as a ratio; on a tie the level with the smaller
    /// absolute difference wins.
    pub fn nearest_index(&self, scale: f64) -> Result<usize, ValidationError> {
        ensure_positive("scale", scale)?;
        let scale = scale.clamp(self.minimum_scale, self.maximum_scale);

        let mut best = 0;
        let mut best_ratio = f64::INFINITY;
        let mut best_absolute = f64::INFINITY;
        for (index, &level) in self.scales.iter().enumerate() {
            let ratio = (scale / level).ln().abs();
            let absolute = (scale - level).abs();
            let closer = ratio < best_ratio - f64::EPSILON
                || ((ratio - best_ratio).abs() <= f64::EPSILON && absolute < best_absolute);
            if closer {
                best = index;
                best_ratio = ratio;
                best_absolute = absolute;
            }
        }
        Ok(best)
    }

    /// The level nearest to `scale`.
    pub fn nearest(&self, scale: f64) -> Result<f64, ValidationError> {
        Ok(self.scales[self.nearest_index(scale)?])
    }
}

/// Rescale `extent` to the zoom level nearest its current scale.
///
/// The center and aspect ratio of `extent` are preserved.
pub fn snap_to_zoom_level(
    extent: &WorldRectangle,
    unit: GeographyUnit,
    screen_width: f64,
    screen_height: f64,
    dpi: f64,
    zoom_levels: &ZoomLevelSet,
) -> Result<WorldRectangle, ValidationError> {
    ensure_positive("screen_height", screen_height)?;
    let current = scale_of(extent, screen_width, unit, dpi)?;
    let target = zoom_levels.nearest(current)?;
    Ok(resize_about_center(extent, target / current))
}

// =============================================================================
// Panning
// =============================================================================

/// Compass directions for [`pan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanDirection {
    Up,
    UpperRight,
    Right,
    LowerRight,
    Down,
    LowerLeft,
    Left,
    UpperLeft,
}

/// Translate `extent` by `percentage` of its width and/or height.
pub fn pan(
    extent: &WorldRectangle,
    direction: PanDirection,
    percentage: f64,
) -> Result<WorldRectangle, ValidationError> {
    extent.validate("extent")?;
    ensure_positive("percentage", percentage)?;

    let dx = extent.width() * percentage / 100.0;
    let dy = extent.height() * percentage / 100.0;

    let (x, y) = match direction {
        PanDirection::Up => (0.0, dy),
        PanDirection::UpperRight => (dx, dy),
        PanDirection::Right => (dx, 0.0),
        PanDirection::LowerRight => (dx, -dy),
        PanDirection::Down => (0.0, -dy),
        PanDirection::LowerLeft => (-dx, -dy),
        PanDirection::Left => (-dx, 0.0),
        PanDirection::UpperLeft => (-dx, dy),
    };
    Ok(extent.translate(x, y))
}

/// Translate `extent` along a compass bearing (degrees clockwise from north).
///
/// The distance is `percentage` of the width for bearings within 45 degrees of
/// north or south, and of the height otherwise.
pub fn pan_by_degree(
    extent: &WorldRectangle,
    degree: f64,
    percentage: f64,
) -> Result<WorldRectangle, ValidationError> {
    extent.validate("extent")?;
    ensure_positive("percentage", percentage)?;
    ensure_finite("degree", degree)?;
    if !(0.0..=360.0).contains(&degree) {
        return Err(ValidationError::OutOfRange {
            parameter: "degree",
            value: degree,
            range: "[0, 360]",
        });
    }

    let near_horizontal =
        (degree > 45.0 && degree < 135.0) || (degree > 225.0 && degree < 315.0);
    let distance = if near_horizontal {
        extent.height() * percentage / 100.0
    } else {
        extent.width() * percentage / 100.0
    };

    let radians = degree.to_radians();
    Ok(extent.translate(distance * radians.sin(), distance * radians.cos()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tolerance: f64) {
        assert!(
            (a - b).abs() <= tolerance * b.abs().max(1.0),
            "{} != {} (tolerance {})",
            a,
            b,
            tolerance
        );
    }

    fn assert_rect_close(a: &WorldRectangle, b: &WorldRectangle) {
        assert_close(a.min_x(), b.min_x(), 1e-9);
        assert_close(a.max_x(), b.max_x(), 1e-9);
        assert_close(a.min_y(), b.min_y(), 1e-9);
        assert_close(a.max_y(), b.max_y(), 1e-9);
    }

    // =========================================================================
    // Scale
    // =========================================================================

    #[test]
    fn test_scale_of_one_degree_one_inch() {
        let extent = WorldRectangle::new(0.0, 1.0, 1.0, 0.0);
        let scale = scale_of(&extent, 96.0, GeographyUnit::DecimalDegree, 96.0).unwrap();
        assert_close(scale, 4_374_754.0, 1e-12);
    }

    #[test]
    fn test_scale_of_meters() {
        // 1000m across 96px at 96dpi is 1000m over one inch.
        let extent = WorldRectangle::new(0.0, 1000.0, 1000.0, 0.0);
        let scale = scale_of(&extent, 96.0, GeographyUnit::Meter, 96.0).unwrap();
        assert_close(scale, 39_370.1, 1e-9);
    }

    #[test]
    fn test_scale_of_rejects_bad_input() {
        let extent = WorldRectangle::new(0.0, 1.0, 1.0, 0.0);
        assert!(matches!(
            scale_of(&extent, 0.0, GeographyUnit::Meter, 96.0),
            Err(ValidationError::NonPositive {
                parameter: "screen_width",
                ..
            })
        ));

        let flat = WorldRectangle::new(0.0, 1.0, 1.0, 1.0);
        assert!(scale_of(&flat, 100.0, GeographyUnit::Meter, 96.0).is_err());
    }

    #[test]
    fn test_resolution_scale_inverse() {
        let resolution = resolution_from_scale(50_000.0, GeographyUnit::Meter, 96.0).unwrap();
        let scale = scale_from_resolution(resolution, GeographyUnit::Meter, 96.0).unwrap();
        assert_close(scale, 50_000.0, 1e-12);
    }

    #[test]
    fn test_extent_from_scale_matches_scale_of() {
        let extent = extent_from_scale(
            WorldPoint::new(10.0, 20.0),
            1_000_000.0,
            GeographyUnit::DecimalDegree,
            800.0,
            600.0,
            96.0,
        )
        .unwrap();
        let scale = scale_of(&extent, 800.0, GeographyUnit::DecimalDegree, 96.0).unwrap();
        assert_close(scale, 1_000_000.0, 1e-9);
        assert_close(extent.center().x, 10.0, 1e-12);
        assert_close(extent.height() / extent.width(), 0.75, 1e-12);
    }

    // =========================================================================
    // Drawing Extent and Coordinates
    // =========================================================================

    #[test]
    fn test_drawing_extent_widens_tall_extent() {
        let extent = WorldRectangle::new(0.0, 10.0, 5.0, 0.0);
        let drawing = drawing_extent(&extent, 200.0, 200.0).unwrap();
        assert_rect_close(&drawing, &WorldRectangle::new(-2.5, 10.0, 7.5, 0.0));
    }

    #[test]
    fn test_drawing_extent_heightens_wide_extent() {
        let extent = WorldRectangle::new(0.0, 10.0, 40.0, 0.0);
        let drawing = drawing_extent(&extent, 400.0, 200.0).unwrap();
        assert_rect_close(&drawing, &WorldRectangle::new(0.0, 15.0, 40.0, -5.0));
    }

    #[test]
    fn test_screen_coordinate_axes() {
        let extent = WorldRectangle::new(0.0, 100.0, 100.0, 0.0);
        let upper_left =
            to_screen_coordinate(&extent, WorldPoint::new(0.0, 100.0), 200.0, 200.0).unwrap();
        assert_eq!(upper_left, ScreenPoint::new(0.0, 0.0));

        let lower_right =
            to_screen_coordinate(&extent, WorldPoint::new(100.0, 0.0), 200.0, 200.0).unwrap();
        assert_eq!(lower_right, ScreenPoint::new(200.0, 200.0));
    }

    #[test]
    fn test_coordinate_inverse() {
        let extent = WorldRectangle::new(-123.4, 49.1, -122.8, 48.7);
        let (w, h) = (1024.0, 768.0);
        for i in 0..=10 {
            for j in 0..=10 {
                let p = WorldPoint::new(
                    extent.min_x() + extent.width() * f64::from(i) / 10.0,
                    extent.min_y() + extent.height() * f64::from(j) / 10.0,
                );
                let screen = to_screen_coordinate(&extent, p, w, h).unwrap();
                let back = to_world_coordinate(&extent, screen, w, h).unwrap();
                assert_close(back.x, p.x, 1e-9);
                assert_close(back.y, p.y, 1e-9);
            }
        }
    }

    // =========================================================================
    // Zooming
    // =========================================================================

    #[test]
    fn test_zoom_into_center_halves() {
        let extent = WorldRectangle::new(0.0, 10.0, 10.0, 0.0);
        let zoomed =
            zoom_into_center(&extent, 50.0, WorldPoint::new(2.0, 2.0), 100.0, 100.0).unwrap();
        assert_rect_close(&zoomed, &WorldRectangle::new(-0.5, 4.5, 4.5, -0.5));
    }

    #[test]
    fn test_zoom_into_center_rejects_percentage() {
        let extent = WorldRectangle::new(0.0, 10.0, 10.0, 0.0);
        let center = extent.center();
        for bad in [0.0, 100.0, -5.0, 150.0] {
            assert!(matches!(
                zoom_into_center(&extent, bad, center, 100.0, 100.0),
                Err(ValidationError::OutOfRange {
                    parameter: "percentage",
                    ..
                }) | Err(ValidationError::NonPositive { .. })
            ));
        }
    }

    #[test]
    fn test_zoom_out_to_center_doubles() {
        let extent = WorldRectangle::new(0.0, 10.0, 10.0, 0.0);
        let zoomed =
            zoom_out_to_center(&extent, 100.0, extent.center(), 100.0, 100.0).unwrap();
        assert_rect_close(&zoomed, &WorldRectangle::new(-5.0, 15.0, 15.0, -5.0));
    }

    #[test]
    fn test_zoom_in_to_offset_pins_point() {
        let extent = WorldRectangle::new(0.0, 100.0, 100.0, 0.0);
        let offset = ScreenPoint::new(30.0, 170.0);
        let before = to_world_coordinate(&extent, offset, 200.0, 200.0).unwrap();

        let zoomed = zoom_in_to_offset(&extent, 40.0, 200.0, 200.0, offset).unwrap();
        let after = to_world_coordinate(&zoomed, offset, 200.0, 200.0).unwrap();

        assert_close(zoomed.width(), 60.0, 1e-12);
        assert_close(after.x, before.x, 1e-9);
        assert_close(after.y, before.y, 1e-9);
    }

    #[test]
    fn test_zoom_out_to_offset_pins_point() {
        let extent = WorldRectangle::new(0.0, 100.0, 100.0, 0.0);
        let offset = ScreenPoint::new(150.0, 20.0);
        let before = to_world_coordinate(&extent, offset, 200.0, 200.0).unwrap();

        let zoomed = zoom_out_to_offset(&extent, 25.0, 200.0, 200.0, offset).unwrap();
        let after = to_world_coordinate(&zoomed, offset, 200.0, 200.0).unwrap();

        assert_close(zoomed.width(), 125.0, 1e-12);
        assert_close(after.x, before.x, 1e-9);
        assert_close(after.y, before.y, 1e-9);
    }

    #[test]
    fn test_zoom_to_scale_pins_point() {
        let extent = WorldRectangle::new(-10.0, 10.0, 10.0, -10.0);
        let offset = ScreenPoint::new(100.0, 300.0);
        let (w, h) = (400.0, 400.0);
        let before = to_world_coordinate(&extent, offset, w, h).unwrap();

        let zoomed = zoom_to_scale(
            2_000_000.0,
            &extent,
            GeographyUnit::DecimalDegree,
            w,
            h,
            DEFAULT_DPI,
            offset,
        )
        .unwrap();

        let scale = scale_of(&zoomed, w, GeographyUnit::DecimalDegree, DEFAULT_DPI).unwrap();
        assert_close(scale, 2_000_000.0, 1e-9);
        let after = to_world_coordinate(&zoomed, offset, w, h).unwrap();
        assert_close(after.x, before.x, 1e-9);
        assert_close(after.y, before.y, 1e-9);
    }

    // =========================================================================
    // Zoom Levels
    // =========================================================================

    #[test]
    fn test_zoom_level_set_validation() {
        assert!(matches!(
            ZoomLevelSet::new(vec![]),
            Err(ValidationError::EmptyZoomLevels { .. })
        ));
        assert!(matches!(
            ZoomLevelSet::new(vec![100.0, 50.0, 60.0]),
            Err(ValidationError::UnorderedZoomLevels { index: 2, .. })
        ));
        assert!(ZoomLevelSet::new(vec![10.0, 20.0, 40.0]).is_ok());
        assert!(ZoomLevelSet::new(vec![40.0, 20.0, 10.0]).is_ok());
    }

    #[test]
    fn test_default_web_mercator_levels() {
        let levels = ZoomLevelSet::default_web_mercator();
        assert_eq!(levels.len(), WEB_MERCATOR_LEVEL_COUNT);
        assert_eq!(levels.scales()[0], WEB_MERCATOR_LEVEL_ZERO_SCALE);
        assert_close(levels.scales()[1], WEB_MERCATOR_LEVEL_ZERO_SCALE / 2.0, 1e-15);
    }

    #[test]
    fn test_nearest_level() {
        let levels = ZoomLevelSet::new(vec![8000.0, 4000.0, 2000.0, 1000.0]).unwrap();
        assert_eq!(levels.nearest(7000.0).unwrap(), 8000.0);
        assert_eq!(levels.nearest(2500.0).unwrap(), 2000.0);
        assert_eq!(levels.nearest(10.0).unwrap(), 1000.0);
    }

    #[test]
    fn test_nearest_level_tie_prefers_closer_value() {
        let levels = ZoomLevelSet::new(vec![4000.0, 1000.0]).unwrap();
        // 2000 is equidistant by ratio; absolute distance is smaller to 1000.
        assert_eq!(levels.nearest(2000.0).unwrap(), 1000.0);
    }

    #[test]
    fn test_nearest_level_respects_bounds() {
        let levels = ZoomLevelSet::new(vec![8000.0, 4000.0, 2000.0, 1000.0])
            .unwrap()
            .with_scale_bounds(3000.0, 9000.0)
            .unwrap();
        assert_eq!(levels.nearest(1000.0).unwrap(), 4000.0);
    }

    #[test]
    fn test_snap_to_zoom_level() {
        let levels = ZoomLevelSet::default_web_mercator();
        let extent = WorldRectangle::new(-1.0, 1.5, 2.0, -0.5);
        let (w, h) = (600.0, 400.0);

        let snapped = snap_to_zoom_level(
            &extent,
            GeographyUnit::DecimalDegree,
            w,
            h,
            DEFAULT_DPI,
            &levels,
        )
        .unwrap();

        let scale = scale_of(&snapped, w, GeographyUnit::DecimalDegree, DEFAULT_DPI).unwrap();
        assert!(levels.scales().iter().any(|&s| (s - scale).abs() < 1e-6 * s));
        assert_close(snapped.center().x, extent.center().x, 1e-12);
        assert_close(snapped.center().y, extent.center().y, 1e-12);
        assert_close(
            snapped.height() / snapped.width(),
            extent.height() / extent.width(),
            1e-12,
        );
    }

    // =========================================================================
    // Panning
    // =========================================================================

    #[test]
    fn test_pan_directions() {
        let extent = WorldRectangle::new(0.0, 10.0, 20.0, 0.0);
        assert_eq!(
            pan(&extent, PanDirection::Right, 50.0).unwrap(),
            WorldRectangle::new(10.0, 10.0, 30.0, 0.0)
        );
        assert_eq!(
            pan(&extent, PanDirection::Up, 50.0).unwrap(),
            WorldRectangle::new(0.0, 15.0, 20.0, 5.0)
        );
        assert_eq!(
            pan(&extent, PanDirection::LowerLeft, 10.0).unwrap(),
            WorldRectangle::new(-2.0, 9.0, 18.0, -1.0)
        );
    }

    #[test]
    fn test_pan_by_degree_uses_width_near_vertical() {
        let extent = WorldRectangle::new(0.0, 10.0, 20.0, 0.0);
        let north = pan_by_degree(&extent, 0.0, 50.0).unwrap();
        assert_rect_close(&north, &WorldRectangle::new(0.0, 20.0, 20.0, 10.0));
    }

    #[test]
    fn test_pan_by_degree_uses_height_near_horizontal() {
        let extent = WorldRectangle::new(0.0, 10.0, 20.0, 0.0);
        let east = pan_by_degree(&extent, 90.0, 50.0).unwrap();
        assert_rect_close(&east, &WorldRectangle::new(5.0, 10.0, 25.0, 0.0));
    }

    #[test]
    fn test_pan_by_degree_rejects_out_of_range() {
        let extent = WorldRectangle::new(0.0, 10.0, 20.0, 0.0);
        assert!(pan_by_degree(&extent, 361.0, 10.0).is_err());
        assert!(pan_by_degree(&extent, -1.0, 10.0).is_err());
    }
}
