//! # Tessella - Tiled Image Resizing
//!
//! Tessella resizes a raster image by cutting it into a grid of tiles,
//! resizing every tile on its own, staging the results and stitching them
//! back into one canvas of exactly the requested size.
//!
//! ## Features
//!
//! - **Exact geometry**: edge tiles may be smaller than the nominal size, and
//!   every tile is drawn at an offset computed from the sizes before it
//! - **Parallel staging**: tiles are independent and fan out over rayon
//! - **Pluggable staging**: keep tiles in memory or as PNG files on disk
//! - **Clean failure**: a failed or cancelled run deletes everything it staged
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessella::prelude::*;
//!
//! let source = image::open("input.png")?.into_rgba8();
//!
//! let config = TilingConfig::new()
//!     .with_tile_size(256, 256)
//!     .with_filter(ResampleFilter::Lanczos3);
//! let pipeline = TiledResizePipeline::new(config)?;
//!
//! let output = pipeline.run(&source, 1000, 750)?;
//! output.image.save("output.png")?;
//! println!("{} tiles in {}ms", output.stats.tiles, output.stats.total_ms);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: geometry types, errors and configuration
//! - [`tiling`]: grid planning, extraction, per-tile resizing and composition
//! - [`staging`]: the [`TileStore`](staging::TileStore) trait and its stores
//! - [`execution`]: the pipeline that ties the above together, with progress
//! - [`filters`]: whole-image operations used around the pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;
pub mod staging;
pub mod tiling;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use tessella::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Axis, PixelBuffer, RunId, TileCoord, TileKey, TileRect};

    // Errors
    pub use crate::core::error::{ConfigError, Phase, TilingError, TilingResult};

    // Configuration
    pub use crate::core::config::{StagingConfig, TilingConfig, DEFAULT_TILE_SIZE};

    // Tiling
    pub use crate::tiling::compositor::TileCompositor;
    pub use crate::tiling::extractor::TileExtractor;
    pub use crate::tiling::planner::{OutputSplit, TileDescriptor, TileGrid, TileGridPlanner};
    pub use crate::tiling::transformer::{
        FilterResampler, ResampleFilter, Resampler, TileTransformer,
    };

    // Staging
    pub use crate::staging::{
        FileTileStore, MemoryTileStore, StagedTile, StagingGuard, TileStore,
    };

    // Execution
    pub use crate::execution::pipeline::{
        resize_tiled, PipelineOutput, PipelineStats, TiledResizePipeline,
    };
    pub use crate::execution::progress::{
        CancelHandle, ProgressCallback, ProgressTracker, ProgressUpdate,
    };

    // Filters
    pub use crate::filters::{
        apply_filter, clamp_output_size, downscale, rotate, FilterKind, MAX_OUTPUT_HEIGHT,
        MAX_OUTPUT_WIDTH,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
