//! Bounded in-memory tile store.
//!
//! Tiles are kept in insertion order across all scales and the oldest entry
//! is evicted once `maximum_tiles_count` is reached.
//!
//! # Replacement Policy
//!
//! The store is backed by an [`LruCache`] whose recency is only touched by
//! writes: reads go through `peek`, so the eviction order is first-in,
//! first-out. Re-saving an existing key replaces the entry and moves it to
//! the back of the queue, so a key never occupies two queue slots.

use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;
use tracing::debug;

use super::TileStore;
use crate::error::CacheError;
use crate::tile::{PixelBuffer, TileKey};

/// Default maximum number of tiles held in memory.
pub const DEFAULT_MAXIMUM_TILES_COUNT: usize = 1000;

/// FIFO-bounded in-memory tile store.
///
/// # Thread Safety
///
/// The map and its queue live behind one lock, so eviction and insertion are
/// atomic with respect to other writers.
///
/// # Example
///
/// ```
/// use geotile_cache::cache::{MemoryTileStore, TileStore};
/// use geotile_cache::tile::{PixelBuffer, TileKey};
///
/// let store = MemoryTileStore::with_capacity(2);
/// store.put(&TileKey::new(500.0, 0, 0), PixelBuffer::new(1, 1)).unwrap();
/// store.put(&TileKey::new(500.0, 0, 1), PixelBuffer::new(1, 1)).unwrap();
/// store.put(&TileKey::new(500.0, 0, 2), PixelBuffer::new(1, 1)).unwrap();
///
/// assert_eq!(store.len(), 2);
/// assert!(store.get(&TileKey::new(500.0, 0, 0)).is_none());
/// ```
pub struct MemoryTileStore {
    tiles: RwLock<LruCache<TileKey, PixelBuffer>>,
    capacity: usize,
}

impl MemoryTileStore {
    /// Create a store holding up to [`DEFAULT_MAXIMUM_TILES_COUNT`] tiles.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAXIMUM_TILES_COUNT)
    }

    /// Create a store holding up to `maximum_tiles_count` tiles (at least 1).
    pub fn with_capacity(maximum_tiles_count: usize) -> Self {
        let capacity = NonZeroUsize::new(maximum_tiles_count).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiles: RwLock::new(LruCache::new(capacity)),
            capacity: capacity.get(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LruCache<TileKey, PixelBuffer>> {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LruCache<TileKey, PixelBuffer>> {
        self.tiles.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check for a tile without copying it out.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.read().contains(key)
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Maximum number of stored tiles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MemoryTileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TileStore for MemoryTileStore {
    fn get(&self, key: &TileKey) -> Option<PixelBuffer> {
        self.read().peek(key).cloned()
    }

    fn put(&self, key: &TileKey, pixels: PixelBuffer) -> Result<(), CacheError> {
        let mut tiles = self.write();
        if let Some((evicted, _)) = tiles.push(key.clone(), pixels) {
            if &evicted != key {
                debug!(
                    "Evicted tile {} at scale {}",
                    evicted.row_column(),
                    evicted.scale
                );
            }
        }
        Ok(())
    }

    fn remove(&self, key: &TileKey) -> Result<(), CacheError> {
        self.write().pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.write().clear();
        Ok(())
    }

    fn cached_scales(&self) -> Vec<f64> {
        let tiles = self.read();
        let mut scales: Vec<f64> = Vec::new();
        for (key, _) in tiles.iter() {
            let scale = key.scale.value();
            if !scales.contains(&scale) {
                scales.push(scale);
            }
        }
        scales
    }
}

// =============================================================================
// Tests
// =============================================================================
