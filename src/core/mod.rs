//! Core types for the Tessella tiling pipeline.
//!
//! This module contains the foundations shared by every component:
//! - Geometry and identity types (tile coordinates, rectangles, keys)
//! - Error types
//! - Pipeline configuration

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{StagingConfig, TilingConfig, DEFAULT_TILE_SIZE};
pub use error::{ConfigError, ConfigResult, Phase, TilingError, TilingResult};
pub use types::{Axis, PixelBuffer, RunId, TileCoord, TileKey, TileRect};
