//! Command-line configuration for the `geotile` binary.
//!
//! Every option can also be set through an environment variable with the
//! `GEOTILE_` prefix. Defaults match the library defaults.
//!
//! # Environment Variables
//!
//! - `GEOTILE_CACHE_DIR` - Root directory for disk caches (default: `{temp}/GeoTileCache`)
//! - `GEOTILE_CACHE_ID` - Cache namespace under the root (default: `default`)
//! - `GEOTILE_IMAGE_FORMAT` - `png` or `jpeg` (default: png)
//! - `GEOTILE_JPEG_QUALITY` - JPEG quality 1-100 (default: 80)
//! - `GEOTILE_TILE_WIDTH` / `GEOTILE_TILE_HEIGHT` - Tile size in pixels (default: 256)
//! - `GEOTILE_UNIT` - `decimal-degree`, `meter` or `feet` (default: decimal-degree)
//! - `GEOTILE_DPI` - Screen resolution (default: 96)
//! - `GEOTILE_GRID_EXTENT` - Grid anchor extent (default: world extent of the unit)
//! - `GEOTILE_MEMORY_TILES` - In-memory cache capacity (default: 1000)
//! - `GEOTILE_CLEANUP_INTERVAL_MS` - Session cache sweep interval (default: 600000)
//!
//! Extents are written `min_x,max_y,max_x,min_y`, the upper-left corner
//! followed by the lower-right one.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{
    default_cache_directory, CacheSettings, FileStoreConfig, DEFAULT_MAXIMUM_TILES_COUNT,
    DEFAULT_TILE_SIZE,
};
use crate::geometry::{GeographyUnit, ReferenceCorner, WorldRectangle};
use crate::tile::{is_valid_quality, ImageFormat, DEFAULT_JPEG_QUALITY};
use crate::transform::DEFAULT_DPI;

// =============================================================================
// Default Values
// =============================================================================

/// Default cache namespace.
pub const DEFAULT_CACHE_ID: &str = "default";

/// Default session cache sweep interval in milliseconds (10 minutes).
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 600_000;

/// Default output frame size for `render`.
pub const DEFAULT_SCREEN_SIZE: u32 = 1024;

/// Default checker square size, in world units, of the debug renderer.
pub const DEFAULT_CHECKER_SIZE: f64 = 10.0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// geotile - Tile grid and tile cache tools for map renderers.
#[derive(Parser, Debug, Clone)]
#[command(name = "geotile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the grid cells covering an extent at a scale as JSON.
    Cells(CellsConfig),

    /// Pre-render an extent into a disk cache at one or more scales.
    Seed(SeedConfig),

    /// Draw one frame through a cache backend and write it as an image.
    Render(RenderConfig),

    /// Delete a disk cache namespace.
    Clear(ClearConfig),
}

// =============================================================================
// Shared Argument Groups
// =============================================================================

/// Where and how tiles are stored on disk.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Root directory for disk caches.
    #[arg(long, env = "GEOTILE_CACHE_DIR", default_value_os_t = default_cache_directory())]
    pub cache_dir: PathBuf,

    /// Cache namespace under the root directory.
    #[arg(long, default_value = DEFAULT_CACHE_ID, env = "GEOTILE_CACHE_ID")]
    pub cache_id: String,

    /// Encoding for stored tiles.
    #[arg(long, value_enum, default_value_t = ImageFormat::Png, env = "GEOTILE_IMAGE_FORMAT")]
    pub image_format: ImageFormat,

    /// JPEG quality for stored tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "GEOTILE_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl StoreArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_id.is_empty() {
            return Err("cache_id must not be empty".to_string());
        }
        if self.cache_id.contains(|c| c == '/' || c == '\\') || self.cache_id == "." || self.cache_id == ".." {
            return Err(format!(
                "cache_id must be a single directory name, got '{}'",
                self.cache_id
            ));
        }
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    pub fn file_store_config(&self) -> FileStoreConfig {
        FileStoreConfig::new(self.cache_dir.clone(), self.cache_id.clone())
            .with_image_format(self.image_format)
            .with_jpeg_quality(self.jpeg_quality)
    }
}

/// Tile grid geometry.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "GEOTILE_TILE_WIDTH")]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "GEOTILE_TILE_HEIGHT")]
    pub tile_height: u32,

    /// Units of world coordinates.
    #[arg(long, value_enum, default_value_t = GeographyUnit::DecimalDegree, env = "GEOTILE_UNIT")]
    pub unit: GeographyUnit,

    /// Screen resolution in dots per inch.
    #[arg(long, default_value_t = DEFAULT_DPI, env = "GEOTILE_DPI")]
    pub dpi: f64,

    /// Extent the grid is anchored on (`min_x,max_y,max_x,min_y`).
    ///
    /// Defaults to the world extent of the unit.
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true, env = "GEOTILE_GRID_EXTENT")]
    pub grid_extent: Option<WorldRectangle>,

    /// Corner of the grid extent that anchors row 0 / column 0.
    #[arg(long, value_enum, default_value_t = ReferenceCorner::UpperLeft)]
    pub reference_corner: ReferenceCorner,
}

impl GridArgs {
    pub fn validate(&self) -> Result<(), String> {
        self.cache_settings().validate().map_err(|e| e.to_string())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        let grid_extent = self.grid_extent.unwrap_or_else(|| self.unit.world_extent());
        let mut settings = CacheSettings::for_unit(self.unit)
            .with_tile_size(self.tile_width, self.tile_height)
            .with_grid_extent(grid_extent, self.reference_corner);
        settings.dpi = self.dpi;
        settings
    }
}

// =============================================================================
// Subcommands
// =============================================================================

/// Arguments for `geotile cells`.
#[derive(Args, Debug, Clone)]
pub struct CellsConfig {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Extent to query (`min_x,max_y,max_x,min_y`).
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: WorldRectangle,

    /// Scale to build the grid at.
    #[arg(long, allow_hyphen_values = true)]
    pub scale: f64,

    /// Only list cells lying entirely inside the extent.
    #[arg(long, default_value_t = false)]
    pub contained: bool,

    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CellsConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.grid.validate()?;
        validate_scale(self.scale)
    }
}

/// Arguments for `geotile seed`.
#[derive(Args, Debug, Clone)]
pub struct SeedConfig {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Extent to pre-render (`min_x,max_y,max_x,min_y`).
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: WorldRectangle,

    /// Scales to pre-render (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub scales: Vec<f64>,

    /// Checker square size of the debug renderer, in world units.
    #[arg(long, default_value_t = DEFAULT_CHECKER_SIZE)]
    pub checker_size: f64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SeedConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        self.grid.validate()?;
        if self.scales.is_empty() {
            return Err("at least one scale is required".to_string());
        }
        for &scale in &self.scales {
            validate_scale(scale)?;
        }
        validate_checker_size(self.checker_size)
    }
}

/// Cache backend used by `geotile render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Memory,
    File,
    Session,
}

/// Arguments for `geotile render`.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Cache backend to draw through.
    #[arg(long, value_enum, default_value_t = BackendKind::File)]
    pub backend: BackendKind,

    /// Extent to draw (`min_x,max_y,max_x,min_y`).
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: WorldRectangle,

    /// Frame width in pixels.
    #[arg(long, default_value_t = DEFAULT_SCREEN_SIZE)]
    pub width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = DEFAULT_SCREEN_SIZE)]
    pub height: u32,

    /// Output image path; the format follows `--image-format`.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Capacity of the in-memory backend.
    #[arg(long, default_value_t = DEFAULT_MAXIMUM_TILES_COUNT, env = "GEOTILE_MEMORY_TILES")]
    pub memory_tiles: usize,

    /// Sweep interval of the session backend in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CLEANUP_INTERVAL_MS, env = "GEOTILE_CLEANUP_INTERVAL_MS")]
    pub cleanup_interval_ms: u64,

    /// Checker square size of the debug renderer, in world units.
    #[arg(long, default_value_t = DEFAULT_CHECKER_SIZE)]
    pub checker_size: f64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        self.grid.validate()?;
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if self.memory_tiles == 0 {
            return Err("memory_tiles must be greater than 0".to_string());
        }
        if self.cleanup_interval_ms == 0 {
            return Err("cleanup_interval_ms must be greater than 0".to_string());
        }
        validate_checker_size(self.checker_size)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Arguments for `geotile clear`.
#[derive(Args, Debug, Clone)]
pub struct ClearConfig {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ClearConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()
    }
}

// =============================================================================
// Parsers and Validation Helpers
// =============================================================================

/// Parse `min_x,max_y,max_x,min_y` into an extent with positive area.
pub fn parse_extent(value: &str) -> Result<WorldRectangle, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<_, _>>()?;

    let [min_x, max_y, max_x, min_y] = parts[..] else {
        return Err(format!(
            "expected 4 comma-separated numbers (min_x,max_y,max_x,min_y), got {}",
            parts.len()
        ));
    };

    let extent = WorldRectangle::new(min_x, max_y, max_x, min_y);
    extent.validate("extent").map_err(|e| e.to_string())?;
    Ok(extent)
}

fn validate_scale(scale: f64) -> Result<(), String> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("scale must be a positive number, got {}", scale));
    }
    Ok(())
}

fn validate_checker_size(size: f64) -> Result<(), String> {
    if !size.is_finite() || size <= 0.0 {
        return Err(format!("checker_size must be a positive number, got {}", size));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
