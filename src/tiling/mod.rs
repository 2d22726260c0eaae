//! The tiling components.
//!
//! - [`planner`]: partitions the source into a grid and sizes each tile's
//!   slot in the output
//! - [`extractor`]: copies one tile out of the source
//! - [`transformer`]: resizes a tile to its slot
//! - [`compositor`]: draws staged tiles back into one canvas

pub mod compositor;
pub mod extractor;
pub mod planner;
pub mod transformer;

pub use compositor::TileCompositor;
pub use extractor::TileExtractor;
pub use planner::{OutputSplit, TileDescriptor, TileGrid, TileGridPlanner};
pub use transformer::{FilterResampler, ResampleFilter, Resampler, TileTransformer};
