//! File-system tile store.
//!
//! # On-Disk Layout
//!
//! ```text
//! {cache_directory}/
//! └── {cache_id}/
//!     └── {scale}/          decimal text of the scale, e.g. 4374754 or 0.5
//!         └── {row}/
//!             └── {column}.{png|jpg}
//! ```
//!
//! The layout is shared with any other process reading the same directory.
//! When looking up a scale, existing scale directories within
//! [`SCALE_MATCH_TOLERANCE`] of the requested value are reused, so caches
//! written with slightly drifted scales stay reachable.
//!
//! # Write Semantics
//!
//! Tiles are write-once: a tile file is created atomically if absent and an
//! existing file is never overwritten.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::TileStore;
use crate::error::CacheError;
use crate::tile::{
    ImageFormat, PixelBuffer, ScaleKey, TileEncoder, TileKey, DEFAULT_JPEG_QUALITY,
};

/// Absolute tolerance when matching a scale to an existing scale directory.
pub const SCALE_MATCH_TOLERANCE: f64 = 1e-4;

/// Subdirectory of the system temp directory used when none is configured.
const DEFAULT_CACHE_SUBDIRECTORY: &str = "GeoTileCache";

/// Cache id used when none is configured.
const DEFAULT_CACHE_ID: &str = "default";

/// Default root for disk caches: `{temp_dir}/GeoTileCache`.
pub fn default_cache_directory() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CACHE_SUBDIRECTORY)
}

// =============================================================================
// Configuration
// =============================================================================

/// Location and encoding of a disk cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    /// Root directory shared by all cache ids
    pub cache_directory: PathBuf,

    /// Namespace directory under the root
    pub cache_id: String,

    /// Encoding for newly written tiles
    pub image_format: ImageFormat,

    /// JPEG quality (1-100), ignored for PNG
    pub jpeg_quality: u8,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            cache_id: DEFAULT_CACHE_ID.to_string(),
            image_format: ImageFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl FileStoreConfig {
    pub fn new(cache_directory: impl Into<PathBuf>, cache_id: impl Into<String>) -> Self {
        Self {
            cache_directory: cache_directory.into(),
            cache_id: cache_id.into(),
            ..Self::default()
        }
    }

    pub fn with_image_format(mut self, image_format: ImageFormat) -> Self {
        self.image_format = image_format;
        self
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }
}

// =============================================================================
// File Tile Store
// =============================================================================

/// Persistent tile store rooted at `{cache_directory}/{cache_id}`.
///
/// # Example
///
/// ```no_run
/// use geotile_cache::cache::{FileStoreConfig, FileTileStore, TileStore};
/// use geotile_cache::tile::{PixelBuffer, TileKey};
///
/// let store = FileTileStore::new(FileStoreConfig::new("/tmp/tiles", "roads"));
/// let key = TileKey::new(9027.977411, 12, 40);
/// store.put(&key, PixelBuffer::filled(256, 256, [255, 255, 255, 255])).unwrap();
///
/// // /tmp/tiles/roads/9027.977411/12/40.png
/// assert!(store.tile_path(&key).exists());
/// ```
#[derive(Debug, Clone)]
pub struct FileTileStore {
    cache_directory: PathBuf,
    cache_id: String,
    encoder: TileEncoder,
}

impl FileTileStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            cache_directory: config.cache_directory,
            cache_id: config.cache_id,
            encoder: TileEncoder::with_quality(config.image_format, config.jpeg_quality),
        }
    }

    pub fn cache_directory(&self) -> &Path {
        &self.cache_directory
    }

    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    pub(crate) fn set_cache_id(&mut self, cache_id: String) {
        self.cache_id = cache_id;
    }

    pub fn image_format(&self) -> ImageFormat {
        self.encoder.format()
    }

    /// Directory holding every scale of this cache id.
    pub fn cache_root(&self) -> PathBuf {
        self.cache_directory.join(&self.cache_id)
    }

    /// Directory for `scale`.
    ///
    /// The exactly named directory wins. Otherwise the existing directory
    /// closest to `scale` within [`SCALE_MATCH_TOLERANCE`] is reused, ties
    /// going to the smaller name.
    pub fn scale_directory(&self, scale: &ScaleKey) -> PathBuf {
        let root = self.cache_root();
        let exact = root.join(scale.as_str());
        if exact.is_dir() {
            return exact;
        }

        let Ok(entries) = fs::read_dir(&root) else {
            return exact;
        };
        let mut best: Option<(f64, String, PathBuf)> = None;
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(existing) = parse_scale_name(&name) else {
                continue;
            };
            let distance = (existing - scale.value()).abs();
            if distance > SCALE_MATCH_TOLERANCE || !entry.path().is_dir() {
                continue;
            }
            let closer = best.as_ref().map_or(true, |(best_distance, best_name, _)| {
                distance < *best_distance || (distance == *best_distance && name < *best_name)
            });
            if closer {
                best = Some((distance, name, entry.path()));
            }
        }
        best.map_or(exact, |(_, _, path)| path)
    }

    /// Full path of the file for `key`.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.scale_directory(&key.scale)
            .join(key.row.to_string())
            .join(format!("{}.{}", key.column, self.encoder.format().extension()))
    }

    /// Delete the whole cache id tree after checking it only holds scale
    /// directories.
    ///
    /// Returns `false` when the tree is absent or the check refused it.
    pub fn delete_cache_tree(&self) -> Result<bool, CacheError> {
        let root = self.cache_root();
        if !root.exists() {
            return Ok(false);
        }
        if !is_cache_tree(&root).map_err(|e| CacheError::io(&root, e))? {
            warn!(
                "Refusing to clear {}: it contains entries that are not scale directories",
                root.display()
            );
            return Ok(false);
        }
        fs::remove_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        debug!("Cleared cache tree {}", root.display());
        Ok(true)
    }
}

impl TileStore for FileTileStore {
    fn get(&self, key: &TileKey) -> Option<PixelBuffer> {
        let path = self.tile_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read tile {}: {}", path.display(), e);
                return None;
            }
        };

        match self.encoder.decode(&data) {
            Ok(pixels) => Some(pixels),
            Err(e) => {
                warn!("Treating unreadable tile {} as a miss: {}", path.display(), e);
                None
            }
        }
    }

    fn put(&self, key: &TileKey, pixels: PixelBuffer) -> Result<(), CacheError> {
        let path = self.tile_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let encoded = match self.encoder.encode(&pixels) {
            Ok(encoded) => encoded,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };

        if let Err(e) = file.write_all(&encoded) {
            drop(file);
            // A truncated file would shadow every later write of this tile.
            let _ = fs::remove_file(&path);
            return Err(CacheError::io(&path, e));
        }
        Ok(())
    }

    fn remove(&self, key: &TileKey) -> Result<(), CacheError> {
        let path = self.tile_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.delete_cache_tree().map(|_| ())
    }

    fn cached_scales(&self) -> Vec<f64> {
        let Ok(entries) = fs::read_dir(self.cache_root()) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().and_then(parse_scale_name))
            .collect()
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Parse a scale directory name; `None` for anything but a finite number.
fn parse_scale_name(name: &str) -> Option<f64> {
    name.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Whether every entry directly under `root` is a directory named by a scale.
pub(crate) fn is_cache_tree(root: &Path) -> io::Result<bool> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let numeric = entry.file_name().to_str().and_then(parse_scale_name).is_some();
        if !numeric || !entry.file_type()?.is_dir() {
            return Ok(false);
        }
    }
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================
