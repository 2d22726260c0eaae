//! Configuration for tiled resizing.
//!
//! A [`TilingConfig`] can be built in code with the `with_*` methods or read
//! from a TOML file. Every key is optional:
//!
//! ```toml
//! tile_width = 256
//! tile_height = 256
//! workers = 4          # 0 = one per core
//! parallel = true
//! filter = "lanczos3"  # nearest | triangle | catmullrom | gaussian | lanczos3
//! split = "uniform"    # uniform | proportional
//!
//! [staging]
//! kind = "directory"   # memory | tempdir | directory
//! path = "/var/tmp/tessella"
//! ```

use crate::core::error::{ConfigError, ConfigResult, TilingError, TilingResult};
use crate::tiling::planner::OutputSplit;
use crate::tiling::transformer::ResampleFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default nominal tile edge in source pixels.
pub const DEFAULT_TILE_SIZE: u32 = 100;

/// Where resized tiles wait between staging and composition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StagingConfig {
    /// Keep tiles in a map in memory.
    #[default]
    Memory,
    /// PNG files in a fresh temporary directory, removed with the store.
    TempDir,
    /// PNG files in the given directory, which may be shared between runs.
    Directory {
        /// Directory holding the staged files.
        path: PathBuf,
    },
}

/// Configuration for a [`TiledResizePipeline`](crate::execution::pipeline::TiledResizePipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilingConfig {
    /// Nominal tile width in source pixels.
    pub tile_width: u32,
    /// Nominal tile height in source pixels.
    pub tile_height: u32,
    /// Number of worker threads (0 = auto).
    pub workers: usize,
    /// Whether to stage tiles in parallel.
    pub parallel: bool,
    /// Resampling filter applied to each tile.
    pub filter: ResampleFilter,
    /// How the output size is divided among columns and rows.
    ///
    /// [`OutputSplit::Uniform`] gives every column the same width, so narrow
    /// edge tiles are stretched and source features shift even when the
    /// output has the source's size. Use [`OutputSplit::Proportional`] to
    /// keep geometry.
    pub split: OutputSplit,
    /// Staging medium.
    pub staging: StagingConfig,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            workers: 0,
            parallel: true,
            filter: ResampleFilter::default(),
            split: OutputSplit::default(),
            staging: StagingConfig::default(),
        }
    }
}

impl TilingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nominal tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enable or disable parallel staging.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the resampling filter.
    pub fn with_filter(mut self, filter: ResampleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the output split rule.
    pub fn with_split(mut self, split: OutputSplit) -> Self {
        self.split = split;
        self
    }

    /// Set the staging medium.
    pub fn with_staging(mut self, staging: StagingConfig) -> Self {
        self.staging = staging;
        self
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> TilingResult<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(TilingError::invalid_dimension(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: TilingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
