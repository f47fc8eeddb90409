//! Session cache integration tests.
//!
//! Tests verify:
//! - Clearing switches to an empty generation immediately
//! - Retired generations are deleted by the cleanup worker
//! - Nothing is left on disk once a session is dropped
//! - Separate sessions over one directory never share tiles

use std::time::Duration;

use tempfile::TempDir;

use geotile_cache::cache::{FileStoreConfig, SessionFileTileStore, TileStore};
use geotile_cache::compositor::FrameCompositor;
use geotile_cache::geometry::WorldRectangle;

use super::test_utils::{cell_color, cell_scale, solid, test_cache, CellColorRenderer};

fn session_store(dir: &TempDir) -> SessionFileTileStore {
    SessionFileTileStore::with_cleanup_interval(
        FileStoreConfig::new(dir.path(), "ignored"),
        Duration::from_secs(3600),
    )
    .unwrap()
}

#[test]
fn test_clear_then_sweep_removes_old_generation() {
    let dir = TempDir::new().unwrap();
    let cache = test_cache(session_store(&dir));
    let scale = cell_scale();

    let mut tile = cache.get_tile(scale, 0, 0).unwrap();
    tile.pixels = Some(solid(cell_color(0, 0)));
    cache.save_tile(tile).unwrap();
    let old_root = cache.store().cache_root();
    assert!(old_root.exists());

    assert!(cache.clear_cache().unwrap());
    assert!(cache.get_tile(scale, 0, 0).unwrap().is_empty());
    assert_ne!(cache.store().cache_root(), old_root);
    assert_eq!(cache.store().pending_generations(), 1);

    assert_eq!(cache.store().sweep_now(), 1);
    assert!(!old_root.exists());
    assert_eq!(cache.store().pending_generations(), 0);
}

#[test]
fn test_sessions_do_not_share_tiles() {
    let dir = TempDir::new().unwrap();
    let first = test_cache(session_store(&dir));
    let second = test_cache(session_store(&dir));
    let scale = cell_scale();

    let mut tile = first.get_tile(scale, 1, 1).unwrap();
    tile.pixels = Some(solid(cell_color(1, 1)));
    first.save_tile(tile).unwrap();

    assert!(!first.get_tile(scale, 1, 1).unwrap().is_empty());
    assert!(second.get_tile(scale, 1, 1).unwrap().is_empty());
}

#[test]
fn test_dropping_session_removes_every_generation() {
    let dir = TempDir::new().unwrap();
    let old_root = {
        let cache = test_cache(session_store(&dir));
        let mut tile = cache.get_tile(cell_scale(), 0, 0).unwrap();
        tile.pixels = Some(solid(cell_color(0, 0)));
        cache.save_tile(tile).unwrap();

        let root = cache.store().cache_root();
        cache.clear_cache().unwrap();
        root
    };

    assert!(!old_root.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_compositor_redraws_after_session_clear() {
    let dir = TempDir::new().unwrap();
    let compositor = FrameCompositor::new(test_cache(session_store(&dir)));
    let extent = WorldRectangle::new(0.0, 80.0, 20.0, 60.0);
    let renderer = CellColorRenderer::new();

    compositor.draw(&extent, 8, 8, &mut renderer.clone()).unwrap();
    compositor.draw(&extent, 8, 8, &mut renderer.clone()).unwrap();
    assert_eq!(renderer.call_count(), 1);

    compositor.cache().clear_cache().unwrap();
    let frame = compositor.draw(&extent, 8, 8, &mut renderer.clone()).unwrap();
    assert_eq!(renderer.call_count(), 2);
    assert_eq!(frame.rendered_tiles, 4);
}
