//! Stateful map view.
//!
//! [`MapView`] keeps the current extent for one screen and applies the pure
//! functions in [`crate::transform`] to it. Registered [`MapObserver`]s hear
//! about every extent change, before and after it is applied.

use crate::cache::TileStore;
use crate::compositor::{FrameCompositor, FrameReport, TileRenderer};
use crate::error::{FrameError, ValidationError};
use crate::geometry::{ensure_positive, GeographyUnit, ScreenPoint, WorldPoint, WorldRectangle};
use crate::transform::{
    center_at, drawing_extent, pan, pan_by_degree, scale_of, snap_to_zoom_level,
    to_screen_coordinate, to_world_coordinate, zoom_in_to_offset, zoom_into_center,
    zoom_out_to_center, zoom_out_to_offset, zoom_to_scale, PanDirection, ZoomLevelSet,
    DEFAULT_DPI,
};

/// Listener for extent changes on a [`MapView`].
pub trait MapObserver {
    /// Called before the view moves from `old` to `proposed`. Cannot veto.
    fn on_extent_changing(&mut self, _old: &WorldRectangle, _proposed: &WorldRectangle) {}

    /// Called after the view moved from `old` to `new`.
    fn on_extent_changed(&mut self, old: &WorldRectangle, new: &WorldRectangle);
}

/// Current extent, screen and zoom levels of one map.
///
/// The stored extent always has the screen aspect ratio.
///
/// # Example
///
/// ```
/// use geotile_cache::geometry::{GeographyUnit, WorldRectangle};
/// use geotile_cache::view::MapView;
///
/// let mut view = MapView::new(
///     WorldRectangle::new(-180.0, 90.0, 180.0, -90.0),
///     1024.0,
///     512.0,
///     GeographyUnit::DecimalDegree,
/// )
/// .unwrap();
///
/// view.zoom_in(50.0).unwrap();
/// assert!((view.current_extent().width() - 180.0).abs() < 1e-9);
/// ```
pub struct MapView {
    extent: WorldRectangle,
    screen_width: f64,
    screen_height: f64,
    unit: GeographyUnit,
    dpi: f64,
    zoom_levels: ZoomLevelSet,
    observers: Vec<Box<dyn MapObserver>>,
}

impl MapView {
    /// Create a view of `extent`, expanded to the screen aspect ratio.
    pub fn new(
        extent: WorldRectangle,
        screen_width: f64,
        screen_height: f64,
        unit: GeographyUnit,
    ) -> Result<Self, ValidationError> {
        let extent = drawing_extent(&extent, screen_width, screen_height)?;
        Ok(Self {
            extent,
            screen_width,
            screen_height,
            unit,
            dpi: DEFAULT_DPI,
            zoom_levels: ZoomLevelSet::default_web_mercator(),
            observers: Vec::new(),
        })
    }

    pub fn with_dpi(mut self, dpi: f64) -> Result<Self, ValidationError> {
        ensure_positive("dpi", dpi)?;
        self.dpi = dpi;
        Ok(self)
    }

    pub fn with_zoom_levels(mut self, zoom_levels: ZoomLevelSet) -> Self {
        self.zoom_levels = zoom_levels;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn MapObserver>) {
        self.observers.push(observer);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn current_extent(&self) -> WorldRectangle {
        self.extent
    }

    pub fn screen_size(&self) -> (f64, f64) {
        (self.screen_width, self.screen_height)
    }

    pub fn unit(&self) -> GeographyUnit {
        self.unit
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    pub fn zoom_levels(&self) -> &ZoomLevelSet {
        &self.zoom_levels
    }

    pub fn current_scale(&self) -> Result<f64, ValidationError> {
        scale_of(&self.extent, self.screen_width, self.unit, self.dpi)
    }

    pub fn to_screen(&self, world: WorldPoint) -> Result<ScreenPoint, ValidationError> {
        to_screen_coordinate(&self.extent, world, self.screen_width, self.screen_height)
    }

    pub fn to_world(&self, screen: ScreenPoint) -> Result<WorldPoint, ValidationError> {
        to_world_coordinate(&self.extent, screen, self.screen_width, self.screen_height)
    }

    // =========================================================================
    // Extent Changes
    // =========================================================================

    /// Show `extent`, expanded to the screen aspect ratio.
    pub fn set_extent(&mut self, extent: WorldRectangle) -> Result<(), ValidationError> {
        let next = drawing_extent(&extent, self.screen_width, self.screen_height)?;
        self.apply(next);
        Ok(())
    }

    /// Change the screen size, keeping the extent center.
    pub fn resize(&mut self, screen_width: f64, screen_height: f64) -> Result<(), ValidationError> {
        let next = drawing_extent(&self.extent, screen_width, screen_height)?;
        self.screen_width = screen_width;
        self.screen_height = screen_height;
        self.apply(next);
        Ok(())
    }

    pub fn zoom_in(&mut self, percentage: f64) -> Result<(), ValidationError> {
        let next = zoom_into_center(
            &self.extent,
            percentage,
            self.extent.center(),
            self.screen_width,
            self.screen_height,
        )?;
        self.apply(next);
        Ok(())
    }

    pub fn zoom_out(&mut self, percentage: f64) -> Result<(), ValidationError> {
        let next = zoom_out_to_center(
            &self.extent,
            percentage,
            self.extent.center(),
            self.screen_width,
            self.screen_height,
        )?;
        self.apply(next);
        Ok(())
    }

    /// Zoom in keeping the world point under `offset` in place.
    pub fn zoom_in_at(&mut self, percentage: f64, offset: ScreenPoint) -> Result<(), ValidationError> {
        let next = zoom_in_to_offset(
            &self.extent,
            percentage,
            self.screen_width,
            self.screen_height,
            offset,
        )?;
        self.apply(next);
        Ok(())
    }

    /// Zoom out keeping the world point under `offset` in place.
    pub fn zoom_out_at(&mut self, percentage: f64, offset: ScreenPoint) -> Result<(), ValidationError> {
        let next = zoom_out_to_offset(
            &self.extent,
            percentage,
            self.screen_width,
            self.screen_height,
            offset,
        )?;
        self.apply(next);
        Ok(())
    }

    /// Rescale to `scale` around the screen center.
    pub fn zoom_to_scale(&mut self, scale: f64) -> Result<(), ValidationError> {
        let center = ScreenPoint::new(self.screen_width / 2.0, self.screen_height / 2.0);
        self.zoom_to_scale_at(scale, center)
    }

    /// Rescale to `scale` keeping the world point under `offset` in place.
    pub fn zoom_to_scale_at(&mut self, scale: f64, offset: ScreenPoint) -> Result<(), ValidationError> {
        let next = zoom_to_scale(
            scale,
            &self.extent,
            self.unit,
            self.screen_width,
            self.screen_height,
            self.dpi,
            offset,
        )?;
        self.apply(next);
        Ok(())
    }

    /// Rescale to the nearest zoom level.
    pub fn snap(&mut self) -> Result<(), ValidationError> {
        let next = snap_to_zoom_level(
            &self.extent,
            self.unit,
            self.screen_width,
            self.screen_height,
            self.dpi,
            &self.zoom_levels,
        )?;
        self.apply(next);
        Ok(())
    }

    pub fn pan(&mut self, direction: PanDirection, percentage: f64) -> Result<(), ValidationError> {
        let next = pan(&self.extent, direction, percentage)?;
        self.apply(next);
        Ok(())
    }

    /// Pan along a bearing in degrees clockwise from north.
    pub fn pan_by_degree(&mut self, degree: f64, percentage: f64) -> Result<(), ValidationError> {
        let next = pan_by_degree(&self.extent, degree, percentage)?;
        self.apply(next);
        Ok(())
    }

    pub fn center_at(&mut self, center: WorldPoint) -> Result<(), ValidationError> {
        let next = center_at(&self.extent, center)?;
        self.apply(next);
        Ok(())
    }

    /// Draw the current extent through `compositor`.
    pub fn draw<S: TileStore, R: TileRenderer + ?Sized>(
        &self,
        compositor: &FrameCompositor<S>,
        renderer: &mut R,
    ) -> Result<FrameReport, FrameError> {
        compositor.draw(
            &self.extent,
            self.screen_width.round() as u32,
            self.screen_height.round() as u32,
            renderer,
        )
    }

    fn apply(&mut self, next: WorldRectangle) {
        let old = self.extent;
        for observer in &mut self.observers {
            observer.on_extent_changing(&old, &next);
        }
        self.extent = next;
        for observer in &mut self.observers {
            observer.on_extent_changed(&old, &next);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
