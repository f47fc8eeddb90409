//! In-memory cache integration tests.
//!
//! Tests verify:
//! - The tile count never exceeds the configured capacity
//! - Saving capacity + 1 tiles evicts exactly the first one
//! - Concurrent writers keep the capacity bound
//! - Coarser cached scales stand in for missing tiles

use std::sync::Arc;
use std::thread;

use geotile_cache::cache::{CacheAccessMode, MemoryTileStore, TileStore};
use geotile_cache::geometry::WorldRectangle;
use geotile_cache::tile::PixelBuffer;

use super::test_utils::{cell_color, cell_scale, solid, test_cache};

// =============================================================================
// Capacity and Eviction
// =============================================================================

#[test]
fn test_capacity_invariant_over_mixed_operations() {
    let cache = test_cache(MemoryTileStore::with_capacity(16));
    let scale = cell_scale();

    for i in 0..100i64 {
        let mut tile = cache.get_tile(scale * (1 + i % 3) as f64, i % 8, i / 8 % 8).unwrap();
        tile.pixels = Some(solid(cell_color(i, i)));
        cache.save_tile(tile.clone()).unwrap();
        if i % 7 == 0 {
            cache.delete_tile(&tile).unwrap();
        }
        assert!(cache.store().len() <= 16);
    }
}

#[test]
fn test_capacity_plus_one_evicts_first_only() {
    let capacity = 10;
    let cache = test_cache(MemoryTileStore::with_capacity(capacity));
    let scale = cell_scale();

    for column in 0..=capacity as i64 {
        let mut tile = cache.get_tile(scale, 0, column).unwrap();
        tile.pixels = Some(solid(cell_color(0, column)));
        cache.save_tile(tile).unwrap();
    }

    assert!(cache.get_tile(scale, 0, 0).unwrap().is_empty());
    for column in 1..=capacity as i64 {
        let tile = cache.get_tile(scale, 0, column).unwrap();
        assert_eq!(tile.pixels, Some(solid(cell_color(0, column))));
    }
}

#[test]
fn test_save_tiles_respects_capacity() {
    let cache = test_cache(MemoryTileStore::with_capacity(5));
    let bitmap = PixelBuffer::filled(32, 32, [1, 2, 3, 255]);

    // 8x8 cells, only the last 5 survive.
    let saved = cache
        .save_tiles(bitmap, &WorldRectangle::new(0.0, 80.0, 80.0, 0.0), cell_scale())
        .unwrap();
    assert_eq!(saved, 64);
    assert_eq!(cache.store().len(), 5);
    assert!(!cache.get_tile(cell_scale(), 7, 7).unwrap().is_empty());
    assert!(cache.get_tile(cell_scale(), 0, 0).unwrap().is_empty());
}

#[test]
fn test_concurrent_writers_respect_capacity() {
    let cache = Arc::new(test_cache(MemoryTileStore::with_capacity(32)));
    let scale = cell_scale();

    let handles: Vec<_> = (0..4i64)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50i64 {
                    let mut tile = cache.get_tile(scale, worker, i).unwrap();
                    tile.pixels = Some(solid(cell_color(worker, i)));
                    cache.save_tile(tile).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.store().len(), 32);
}

// =============================================================================
// Access Modes and Fallback
// =============================================================================

#[test]
fn test_read_only_memory_cache_stays_empty() {
    let cache = test_cache(MemoryTileStore::new()).with_access_mode(CacheAccessMode::ReadOnly);
    let bitmap = PixelBuffer::filled(8, 8, [9, 9, 9, 255]);

    let saved = cache
        .save_tiles(bitmap, &WorldRectangle::new(0.0, 80.0, 20.0, 60.0), cell_scale())
        .unwrap();
    assert_eq!(saved, 0);
    assert!(cache.store().is_empty());
    assert!(cache.store().cached_scales().is_empty());
}

#[test]
fn test_higher_scale_tile_merges_coarse_tiles() {
    let cache = test_cache(MemoryTileStore::new());
    let fine = cell_scale();
    let coarse = fine * 4.0;

    // One coarse tile spans 4x4 fine cells.
    let mut tile = cache.get_tile(coarse, 0, 0).unwrap();
    tile.pixels = Some(solid([10, 20, 30, 255]));
    cache.save_tile(tile).unwrap();

    let stand_in = cache.get_higher_scale_tile(fine, 3, 3).unwrap().unwrap();
    let pixels = stand_in.pixels.unwrap();
    assert_eq!((pixels.width(), pixels.height()), (4, 4));
    assert_eq!(pixels.pixel(0, 0), Some([10, 20, 30, 255]));

    // Outside the coarse tile nothing is cached.
    assert!(cache.get_higher_scale_tile(fine, 5, 5).unwrap().is_none());
}
