//! Pipeline execution.
//!
//! This module runs the tiling components end to end and reports progress.

pub mod pipeline;
pub mod progress;

pub use pipeline::{resize_tiled, PipelineOutput, PipelineStats, TiledResizePipeline};
pub use progress::{CancelHandle, ProgressCallback, ProgressTracker, ProgressUpdate};
