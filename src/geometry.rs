//! Geometry primitives shared by the transform, grid and cache layers.
//!
//! World coordinates grow upward on the Y axis; screen coordinates grow
//! downward. A [`WorldRectangle`] is stored as its upper-left and lower-right
//! corners, so `upper_left.y >= lower_right.y` for any well-formed extent.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Points
// =============================================================================

/// A point in world (geographic or projected) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Reject NaN and infinite coordinates.
    pub fn validate(&self, parameter: &'static str) -> Result<(), ValidationError> {
        ensure_finite(parameter, self.x)?;
        ensure_finite(parameter, self.y)
    }
}

/// A point in screen pixels, origin at the upper-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn validate(&self, parameter: &'static str) -> Result<(), ValidationError> {
        ensure_finite(parameter, self.x)?;
        ensure_finite(parameter, self.y)
    }
}

// =============================================================================
// World Rectangle
// =============================================================================

/// An axis-aligned rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRectangle {
    pub upper_left: WorldPoint,
    pub lower_right: WorldPoint,
}

impl WorldRectangle {
    /// Build from the upper-left and lower-right coordinates.
    pub const fn new(min_x: f64, max_y: f64, max_x: f64, min_y: f64) -> Self {
        Self {
            upper_left: WorldPoint::new(min_x, max_y),
            lower_right: WorldPoint::new(max_x, min_y),
        }
    }

    pub const fn from_corners(upper_left: WorldPoint, lower_right: WorldPoint) -> Self {
        Self {
            upper_left,
            lower_right,
        }
    }

    /// Build a rectangle of the given size centered on `center`.
    pub fn from_center(center: WorldPoint, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y + height / 2.0,
            center.x + width / 2.0,
            center.y - height / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.lower_right.x - self.upper_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_left.y - self.lower_right.y
    }

    pub fn min_x(&self) -> f64 {
        self.upper_left.x
    }

    pub fn max_x(&self) -> f64 {
        self.lower_right.x
    }

    pub fn min_y(&self) -> f64 {
        self.lower_right.y
    }

    pub fn max_y(&self) -> f64 {
        self.upper_left.y
    }

    pub fn upper_right(&self) -> WorldPoint {
        WorldPoint::new(self.lower_right.x, self.upper_left.y)
    }

    pub fn lower_left(&self) -> WorldPoint {
        WorldPoint::new(self.upper_left.x, self.lower_right.y)
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.upper_left.x + self.lower_right.x) / 2.0,
            (self.upper_left.y + self.lower_right.y) / 2.0,
        )
    }

    /// Shift by the given world offsets.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.upper_left.x + dx,
            self.upper_left.y + dy,
            self.lower_right.x + dx,
            self.lower_right.y + dy,
        )
    }

    /// Whether `other` lies entirely inside this rectangle (edges inclusive).
    pub fn contains(&self, other: &WorldRectangle) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }

    /// Same as [`contains`](Self::contains) but tolerant of `tolerance` drift at the edges.
    pub fn contains_within(&self, other: &WorldRectangle, tolerance: f64) -> bool {
        other.min_x() >= self.min_x() - tolerance
            && other.max_x() <= self.max_x() + tolerance
            && other.min_y() >= self.min_y() - tolerance
            && other.max_y() <= self.max_y() + tolerance
    }

    pub fn contains_point(&self, point: &WorldPoint) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }

    /// Whether the two rectangles overlap with positive area.
    pub fn intersects(&self, other: &WorldRectangle) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &WorldRectangle) -> Self {
        Self::new(
            self.min_x().min(other.min_x()),
            self.max_y().max(other.max_y()),
            self.max_x().max(other.max_x()),
            self.min_y().min(other.min_y()),
        )
    }

    /// Reject non-finite coordinates and rectangles without positive area.
    pub fn validate(&self, parameter: &'static str) -> Result<(), ValidationError> {
        self.upper_left.validate(parameter)?;
        self.lower_right.validate(parameter)?;

        let (width, height) = (self.width(), self.height());
        if width <= 0.0 || height <= 0.0 {
            return Err(ValidationError::DegenerateExtent {
                parameter,
                width,
                height,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Units and Corners
// =============================================================================

/// Units of the world coordinate system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
pub enum GeographyUnit {
    #[default]
    DecimalDegree,
    Meter,
    Feet,
}

/// Inches spanned by one degree at the equator.
pub const INCHES_PER_DEGREE: f64 = 4_374_754.0;

/// Inches per meter.
pub const INCHES_PER_METER: f64 = 39.3701;

/// Inches per international foot.
pub const INCHES_PER_FOOT: f64 = 12.0;

/// Meters per inch, used to convert screen sizes.
pub const METERS_PER_INCH: f64 = 0.0254;

impl GeographyUnit {
    /// How many inches one world unit spans.
    pub fn inches_per_unit(self) -> f64 {
        match self {
            GeographyUnit::DecimalDegree => INCHES_PER_DEGREE,
            GeographyUnit::Meter => INCHES_PER_METER,
            GeographyUnit::Feet => INCHES_PER_FOOT,
        }
    }

    pub fn is_angular(self) -> bool {
        matches!(self, GeographyUnit::DecimalDegree)
    }

    /// Convert a linear distance in this unit to meters.
    ///
    /// Only meaningful for linear units; degrees are converted through
    /// [`INCHES_PER_DEGREE`].
    pub fn to_meters(self, distance: f64) -> f64 {
        distance * self.inches_per_unit() * METERS_PER_INCH
    }

    /// Full-world extent commonly used to anchor a tile grid in this unit.
    pub fn world_extent(self) -> WorldRectangle {
        match self {
            GeographyUnit::DecimalDegree => WorldRectangle::new(-180.0, 90.0, 180.0, -90.0),
            GeographyUnit::Meter => WorldRectangle::new(
                -WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
                -WEB_MERCATOR_HALF_WORLD,
            ),
            GeographyUnit::Feet => {
                let half = WEB_MERCATOR_HALF_WORLD * INCHES_PER_METER / INCHES_PER_FOOT;
                WorldRectangle::new(-half, half, half, -half)
            }
        }
    }
}

/// Half the side of the spherical-mercator square, in meters.
pub const WEB_MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789_2;

/// Which corner of a grid's bounding box anchors its reference point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
pub enum ReferenceCorner {
    #[default]
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl ReferenceCorner {
    /// The corner of `rect` this variant names.
    pub fn point_of(self, rect: &WorldRectangle) -> WorldPoint {
        match self {
            ReferenceCorner::UpperLeft => rect.upper_left,
            ReferenceCorner::UpperRight => rect.upper_right(),
            ReferenceCorner::LowerLeft => rect.lower_left(),
            ReferenceCorner::LowerRight => rect.lower_right,
        }
    }

    /// Rectangle of the given size anchored at `point` on this corner.
    pub fn rectangle_from(self, point: WorldPoint, width: f64, height: f64) -> WorldRectangle {
        match self {
            ReferenceCorner::UpperLeft => {
                WorldRectangle::new(point.x, point.y, point.x + width, point.y - height)
            }
            ReferenceCorner::UpperRight => {
                WorldRectangle::new(point.x - width, point.y, point.x, point.y - height)
            }
            ReferenceCorner::LowerLeft => {
                WorldRectangle::new(point.x, point.y + height, point.x + width, point.y)
            }
            ReferenceCorner::LowerRight => {
                WorldRectangle::new(point.x - width, point.y + height, point.x, point.y)
            }
        }
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

pub(crate) fn ensure_finite(parameter: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { parameter, value })
    }
}

pub(crate) fn ensure_positive(parameter: &'static str, value: f64) -> Result<(), ValidationError> {
    ensure_finite(parameter, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive { parameter, value })
    }
}

// =============================================================================
// Tests
// =============================================================================
