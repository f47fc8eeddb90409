//! geotile - Tile grid and tile cache tools.
//!
//! This binary exposes grid queries, cache seeding, frame rendering and cache
//! clearing on top of the `geotile_cache` library.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geotile_cache::{
    cache::{TileCache, TileStore},
    compositor::{FrameCompositor, TileRenderer},
    config::{BackendKind, CellsConfig, ClearConfig, Cli, Command, RenderConfig, SeedConfig},
    error::RenderError,
    geometry::WorldRectangle,
    grid::MAX_CELL_COUNT,
    tile::{PixelBuffer, TileEncoder},
    FileTileStore, MemoryTileStore, SessionFileTileStore,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Cells(config) => run_cells(config),
        Command::Seed(config) => run_seed(config),
        Command::Render(config) => run_render(config),
        Command::Clear(config) => run_clear(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "geotile_cache=debug,geotile=debug"
    } else {
        "geotile_cache=info,geotile=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Debug Renderer
// =============================================================================

/// Renders a world-aligned checkerboard, so tiles from separate calls line up.
struct DebugGridRenderer {
    checker_size: f64,
}

impl DebugGridRenderer {
    const LIGHT: [u8; 4] = [236, 236, 228, 255];
    const DARK: [u8; 4] = [96, 128, 160, 255];
}

impl TileRenderer for DebugGridRenderer {
    fn render(
        &mut self,
        extent: &WorldRectangle,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, RenderError> {
        let mut image = PixelBuffer::new(width, height);
        let x_step = extent.width() / f64::from(width);
        let y_step = extent.height() / f64::from(height);

        for py in 0..height {
            let y = extent.max_y() - (f64::from(py) + 0.5) * y_step;
            let row = (y / self.checker_size).floor() as i64;
            for px in 0..width {
                let x = extent.min_x() + (f64::from(px) + 0.5) * x_step;
                let column = (x / self.checker_size).floor() as i64;
                let color = if (row + column).rem_euclid(2) == 0 {
                    Self::LIGHT
                } else {
                    Self::DARK
                };
                image.set_pixel(px, py, color);
            }
        }
        Ok(image)
    }
}

// =============================================================================
// Cells Command
// =============================================================================

fn run_cells(config: CellsConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let matrix = match config.grid.cache_settings().matrix_for_scale(config.scale) {
        Ok(matrix) => matrix,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let range = if config.contained {
        matrix.contained_row_column_range(&config.extent)
    } else {
        matrix.intersecting_row_column_range(&config.extent)
    };
    let range = match range {
        Ok(range) => range,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Above the cap only the range is printed.
    let cells = if range.cell_count() <= MAX_CELL_COUNT {
        match matrix.cells_in_range(&range) {
            Ok(cells) => Some(cells),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let output = json!({
        "scale": config.scale,
        "matrix": {
            "id": matrix.id(),
            "cell_width": matrix.cell_width(),
            "cell_height": matrix.cell_height(),
            "row_count": matrix.row_count(),
            "column_count": matrix.column_count(),
            "bounding_box": matrix.bounding_box(),
        },
        "range": range,
        "cell_count": range.cell_count(),
        "cells": cells,
    });

    let rendered = if config.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    };
    match rendered {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Seed Command
// =============================================================================

fn run_seed(config: SeedConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = FileTileStore::new(config.store.file_store_config());
    info!("Seeding {}", store.cache_root().display());

    let cache = match TileCache::new(store, config.grid.cache_settings()) {
        Ok(cache) => cache,
        Err(e) => {
            error!("Invalid cache settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let compositor = FrameCompositor::new(cache);
    let mut renderer = DebugGridRenderer {
        checker_size: config.checker_size,
    };

    for &scale in &config.scales {
        match compositor.seed(&config.extent, scale, &mut renderer) {
            Ok(report) => info!(
                "  Scale {}: {} tiles saved in {} blocks, {} already cached",
                scale, report.tiles_saved, report.blocks_rendered, report.tiles_skipped
            ),
            Err(e) => {
                error!("Failed to seed scale {}: {}", scale, e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Render Command
// =============================================================================

fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match config.backend {
        BackendKind::Memory => render_frame(MemoryTileStore::with_capacity(config.memory_tiles), &config),
        BackendKind::File => render_frame(FileTileStore::new(config.store.file_store_config()), &config),
        BackendKind::Session => {
            match SessionFileTileStore::with_cleanup_interval(
                config.store.file_store_config(),
                config.cleanup_interval(),
            ) {
                Ok(store) => render_frame(store, &config),
                Err(e) => Err(e.to_string()),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Render failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn render_frame<S: TileStore>(store: S, config: &RenderConfig) -> Result<(), String> {
    let cache = TileCache::new(store, config.grid.cache_settings()).map_err(|e| e.to_string())?;
    let compositor = FrameCompositor::new(cache);
    let mut renderer = DebugGridRenderer {
        checker_size: config.checker_size,
    };

    let frame = compositor
        .draw(&config.extent, config.width, config.height, &mut renderer)
        .map_err(|e| e.to_string())?;
    info!(
        "Drew {}x{} frame at scale {}: {} cached tiles, {} rendered",
        config.width, config.height, frame.scale, frame.cached_tiles, frame.rendered_tiles
    );

    let encoder = TileEncoder::with_quality(config.store.image_format, config.store.jpeg_quality);
    let bytes = encoder.encode(&frame.image).map_err(|e| e.to_string())?;
    fs::write(&config.output, &bytes)
        .map_err(|e| format!("failed to write {}: {}", config.output.display(), e))?;

    info!("Wrote {}", config.output.display());
    Ok(())
}

// =============================================================================
// Clear Command
// =============================================================================

fn run_clear(config: ClearConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = FileTileStore::new(config.store.file_store_config());
    let root = store.cache_root();
    if !root.exists() {
        info!("Nothing to clear at {}", root.display());
        return ExitCode::SUCCESS;
    }

    match store.delete_cache_tree() {
        Ok(true) => {
            info!("Cleared {}", root.display());
            ExitCode::SUCCESS
        }
        Ok(false) => {
            warn!("Left {} untouched", root.display());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Failed to clear {}: {}", root.display(), e);
            ExitCode::FAILURE
        }
    }
}
