//! Frame compositing integration tests.
//!
//! Tests verify:
//! - A frame assembled from cached and fresh tiles matches a fully fresh one
//! - Panning by one cell renders only the newly exposed cells
//! - Renderer failures surface and leave the cache untouched
//! - The map view draws its current extent and redraws after navigation

use geotile_cache::cache::{MemoryTileStore, TileStore};
use geotile_cache::compositor::FrameCompositor;
use geotile_cache::error::FrameError;
use geotile_cache::geometry::{GeographyUnit, WorldRectangle};
use geotile_cache::transform::PanDirection;
use geotile_cache::view::MapView;

use super::test_utils::{
    assert_extent_close, cell_color, failing_renderer, test_cache, CellColorRenderer,
};

fn memory_compositor() -> FrameCompositor<MemoryTileStore> {
    FrameCompositor::new(test_cache(MemoryTileStore::new()))
}

// =============================================================================
// Partial Cache Hits
// =============================================================================

#[test]
fn test_pan_renders_only_new_column() {
    let compositor = memory_compositor();
    let renderer = CellColorRenderer::new();

    compositor
        .draw(&WorldRectangle::new(0.0, 80.0, 20.0, 60.0), 8, 8, &mut renderer.clone())
        .unwrap();
    let frame = compositor
        .draw(&WorldRectangle::new(10.0, 80.0, 30.0, 60.0), 8, 8, &mut renderer.clone())
        .unwrap();

    assert_eq!(renderer.call_count(), 2);
    assert_eq!(frame.cached_tiles, 2);
    assert_eq!(frame.rendered_tiles, 2);

    let (extent, width, height) = renderer.calls()[1];
    assert_extent_close(&extent, &WorldRectangle::new(20.0, 80.0, 30.0, 60.0));
    assert_eq!((width, height), (4, 8));
    assert_extent_close(&frame.rendered_extent.unwrap(), &extent);
}

#[test]
fn test_partially_cached_frame_matches_fresh_frame() {
    let warm = memory_compositor();
    let renderer = CellColorRenderer::new();
    warm.draw(&WorldRectangle::new(0.0, 80.0, 20.0, 60.0), 8, 8, &mut renderer.clone())
        .unwrap();

    let target = WorldRectangle::new(10.0, 80.0, 30.0, 60.0);
    let mixed = warm.draw(&target, 8, 8, &mut renderer.clone()).unwrap();
    let fresh = memory_compositor()
        .draw(&target, 8, 8, &mut CellColorRenderer::new())
        .unwrap();

    assert_eq!(fresh.cached_tiles, 0);
    assert_eq!(mixed.image, fresh.image);
    // Top-left pixel lies in cell (0, 1), bottom-right in (1, 2).
    assert_eq!(mixed.image.pixel(0, 0), Some(cell_color(0, 1)));
    assert_eq!(mixed.image.pixel(7, 7), Some(cell_color(1, 2)));
}

#[test]
fn test_scattered_gaps_render_their_union() {
    let compositor = memory_compositor();
    let renderer = CellColorRenderer::new();

    // Cache the two diagonal cells (0,0) and (1,1).
    compositor
        .draw(&WorldRectangle::new(0.0, 80.0, 10.0, 70.0), 4, 4, &mut renderer.clone())
        .unwrap();
    compositor
        .draw(&WorldRectangle::new(10.0, 70.0, 20.0, 60.0), 4, 4, &mut renderer.clone())
        .unwrap();

    let frame = compositor
        .draw(&WorldRectangle::new(0.0, 80.0, 20.0, 60.0), 8, 8, &mut renderer.clone())
        .unwrap();

    // Missing (0,1) and (1,0) span the whole 2x2 block, which supersedes
    // both cached tiles.
    assert_eq!(frame.rendered_tiles, 4);
    assert_eq!(frame.cached_tiles, 0);
    let (extent, _, _) = renderer.calls()[2];
    assert_extent_close(&extent, &WorldRectangle::new(0.0, 80.0, 20.0, 60.0));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_renderer_failure_leaves_cache_empty() {
    let compositor = memory_compositor();
    let mut renderer = failing_renderer;

    let result = compositor.draw(&WorldRectangle::new(0.0, 80.0, 20.0, 60.0), 8, 8, &mut renderer);

    assert!(matches!(result, Err(FrameError::Render(_))));
    assert!(compositor.cache().store().is_empty());
    assert!(compositor.cache().store().cached_scales().is_empty());
}

// =============================================================================
// Map View
// =============================================================================

#[test]
fn test_map_view_draws_and_follows_pans() {
    let compositor = memory_compositor();
    let renderer = CellColorRenderer::new();
    let mut view = MapView::new(
        WorldRectangle::new(0.0, 80.0, 20.0, 60.0),
        8.0,
        8.0,
        GeographyUnit::DecimalDegree,
    )
    .unwrap();

    let first = view.draw(&compositor, &mut renderer.clone()).unwrap();
    assert_eq!(first.rendered_tiles, 4);

    // Half a screen right is one cell.
    view.pan(PanDirection::Right, 50.0).unwrap();
    assert_extent_close(
        &view.current_extent(),
        &WorldRectangle::new(10.0, 80.0, 30.0, 60.0),
    );

    let second = view.draw(&compositor, &mut renderer.clone()).unwrap();
    assert_eq!(second.cached_tiles, 2);
    assert_eq!(second.rendered_tiles, 2);
    assert_eq!(renderer.call_count(), 2);
}
