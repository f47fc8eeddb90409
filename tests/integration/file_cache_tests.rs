//! File cache integration tests.
//!
//! Tests verify:
//! - Tiles written by one store are read back by a fresh store on the same tree
//! - A tile file is never overwritten once it exists
//! - Frames drawn through a file-backed compositor persist across instances
//! - Clearing refuses trees that hold foreign entries

use std::fs;

use tempfile::TempDir;

use geotile_cache::cache::{CacheAccessMode, FileStoreConfig, FileTileStore, TileStore};
use geotile_cache::compositor::FrameCompositor;
use geotile_cache::geometry::WorldRectangle;
use geotile_cache::tile::{ImageFormat, TileKey};

use super::test_utils::{cell_color, cell_scale, solid, test_cache, CellColorRenderer};

fn file_store(dir: &TempDir) -> FileTileStore {
    FileTileStore::new(FileStoreConfig::new(dir.path(), "integration"))
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_tiles_survive_store_restart() {
    let dir = TempDir::new().unwrap();
    let scale = cell_scale();

    {
        let cache = test_cache(file_store(&dir));
        let mut tile = cache.get_tile(scale, 2, 3).unwrap();
        tile.pixels = Some(solid(cell_color(2, 3)));
        assert!(cache.save_tile(tile).unwrap());
    }

    let cache = test_cache(file_store(&dir));
    let tile = cache.get_tile(scale, 2, 3).unwrap();
    assert_eq!(tile.pixels, Some(solid(cell_color(2, 3))));
    assert_eq!(cache.store().cached_scales().len(), 1);
}

#[test]
fn test_existing_tile_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let cache = test_cache(file_store(&dir));
    let scale = cell_scale();

    let mut first = cache.get_tile(scale, 0, 0).unwrap();
    first.pixels = Some(solid([255, 0, 0, 255]));
    cache.save_tile(first).unwrap();

    let path = cache.store().tile_path(&TileKey::new(scale, 0, 0));
    let before = fs::read(&path).unwrap();

    let mut second = cache.get_tile(scale, 0, 0).unwrap();
    second.pixels = Some(solid([0, 0, 255, 255]));
    cache.save_tile(second).unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
    let tile = cache.get_tile(scale, 0, 0).unwrap();
    assert_eq!(tile.pixels, Some(solid([255, 0, 0, 255])));
}

#[test]
fn test_jpeg_tiles_keep_their_size() {
    let dir = TempDir::new().unwrap();
    let store = FileTileStore::new(
        FileStoreConfig::new(dir.path(), "jpeg").with_image_format(ImageFormat::Jpeg),
    );
    let cache = test_cache(store);
    let scale = cell_scale();

    let mut tile = cache.get_tile(scale, 1, 1).unwrap();
    tile.pixels = Some(solid([120, 60, 30, 255]));
    cache.save_tile(tile).unwrap();

    let path = cache.store().tile_path(&TileKey::new(scale, 1, 1));
    assert_eq!(path.extension().unwrap(), "jpg");

    let pixels = cache.get_tile(scale, 1, 1).unwrap().pixels.unwrap();
    assert_eq!((pixels.width(), pixels.height()), (4, 4));
}

#[test]
fn test_compositor_reuses_tiles_from_previous_instance() {
    let dir = TempDir::new().unwrap();
    let extent = WorldRectangle::new(0.0, 80.0, 20.0, 60.0);

    let first_renderer = CellColorRenderer::new();
    let first = {
        let compositor = FrameCompositor::new(test_cache(file_store(&dir)));
        compositor.draw(&extent, 8, 8, &mut first_renderer.clone()).unwrap()
    };
    assert_eq!(first_renderer.call_count(), 1);
    assert_eq!(first.rendered_tiles, 4);

    let second_renderer = CellColorRenderer::new();
    let compositor = FrameCompositor::new(test_cache(file_store(&dir)));
    let second = compositor.draw(&extent, 8, 8, &mut second_renderer.clone()).unwrap();

    assert_eq!(second_renderer.call_count(), 0);
    assert_eq!(second.cached_tiles, 4);
    assert_eq!(second.image, first.image);
}

// =============================================================================
// Clearing
// =============================================================================

#[test]
fn test_clear_through_cache_removes_tree() {
    let dir = TempDir::new().unwrap();
    let cache = test_cache(file_store(&dir));
    let scale = cell_scale();

    let mut tile = cache.get_tile(scale, 0, 0).unwrap();
    tile.pixels = Some(solid([1, 1, 1, 255]));
    cache.save_tile(tile).unwrap();
    let root = cache.store().cache_root();
    assert!(root.exists());

    assert!(cache.clear_cache().unwrap());
    assert!(!root.exists());
    assert!(cache.get_tile(scale, 0, 0).unwrap().is_empty());
}

#[test]
fn test_clear_leaves_foreign_tree_alone() {
    let dir = TempDir::new().unwrap();
    let cache = test_cache(file_store(&dir));
    let scale = cell_scale();

    let mut tile = cache.get_tile(scale, 0, 0).unwrap();
    tile.pixels = Some(solid([1, 1, 1, 255]));
    cache.save_tile(tile).unwrap();
    let notes = cache.store().cache_root().join("notes.txt");
    fs::write(&notes, b"keep me").unwrap();

    cache.clear_cache().unwrap();

    assert!(notes.exists());
    assert!(!cache.get_tile(scale, 0, 0).unwrap().is_empty());
}

#[test]
fn test_read_add_mode_cannot_clear() {
    let dir = TempDir::new().unwrap();
    let cache = test_cache(file_store(&dir)).with_access_mode(CacheAccessMode::ReadAdd);
    let scale = cell_scale();

    let mut tile = cache.get_tile(scale, 0, 0).unwrap();
    tile.pixels = Some(solid([1, 1, 1, 255]));
    assert!(cache.save_tile(tile.clone()).unwrap());

    assert!(!cache.delete_tile(&tile).unwrap());
    assert!(!cache.clear_cache().unwrap());
    assert!(cache.store().cache_root().exists());
}
