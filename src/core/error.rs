//! Error types for Tessella.
//!
//! Uses thiserror for structured errors with context. Every variant carries
//! enough information to tell which tile and which phase of the run failed:
//! - [`TilingError::coord`] names the tile, when one is involved
//! - [`TilingError::phase`] names the pipeline stage

use crate::core::types::{Axis, TileCoord, TileKey, TileRect};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Computing the tile grid.
    Plan,
    /// Copying a tile out of the source.
    Extract,
    /// Resampling a tile.
    Transform,
    /// Writing a tile to the staging area.
    Stage,
    /// Reading tiles back and drawing the canvas.
    Compose,
    /// Removing staged tiles.
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Plan => "plan",
            Phase::Extract => "extract",
            Phase::Transform => "transform",
            Phase::Stage => "stage",
            Phase::Compose => "compose",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Errors raised by the tiling pipeline and its components.
#[derive(Error, Debug)]
pub enum TilingError {
    #[error("Invalid dimension: {reason}")]
    InvalidDimension { reason: String },

    #[error("Tile rectangle {rect} lies outside the {width}x{height} source")]
    OutOfBounds {
        rect: TileRect,
        width: u32,
        height: u32,
    },

    #[error("Tile {0} is already staged")]
    DuplicateKey(TileKey),

    #[error("Tile {0} is not staged")]
    NotFound(TileKey),

    #[error("Tile {coord} overlaps other tiles when drawn at ({x}, {y})")]
    TileOverlapDetected { coord: TileCoord, x: u32, y: u32 },

    #[error("Output {axis} mismatch{}: expected {expected}, got {actual}", tile_suffix(.coord))]
    DimensionMismatch {
        axis: Axis,
        coord: Option<TileCoord>,
        expected: u32,
        actual: u32,
    },

    #[error("Storage failure for tile {key} during {phase}: {error}")]
    StorageFailure {
        key: TileKey,
        phase: Phase,
        error: String,
    },

    #[error("Resampling failed: {error}")]
    Resample { error: String },

    #[error("Staging area {} is unusable: {error}", .path.display())]
    StagingUnavailable { path: PathBuf, error: String },

    #[error("Failed to start worker pool: {error}")]
    WorkerPool { error: String },

    #[error("Run cancelled after staging {completed}/{total} tiles")]
    Cancelled { completed: usize, total: usize },
}

fn tile_suffix(coord: &Option<TileCoord>) -> String {
    match coord {
        Some(coord) => format!(" for tile {}", coord),
        None => String::new(),
    }
}

impl TilingError {
    /// Shorthand for [`TilingError::InvalidDimension`].
    pub fn invalid_dimension(reason: impl Into<String>) -> Self {
        TilingError::InvalidDimension {
            reason: reason.into(),
        }
    }

    /// Get the tile this error concerns, if applicable.
    pub fn coord(&self) -> Option<TileCoord> {
        match self {
            TilingError::DuplicateKey(key)
            | TilingError::NotFound(key)
            | TilingError::StorageFailure { key, .. } => Some(key.coord),
            TilingError::TileOverlapDetected { coord, .. } => Some(*coord),
            TilingError::DimensionMismatch { coord, .. } => *coord,
            _ => None,
        }
    }

    /// Get the phase in which this error is raised.
    pub fn phase(&self) -> Phase {
        match self {
            TilingError::InvalidDimension { .. } | TilingError::WorkerPool { .. } => Phase::Plan,
            TilingError::OutOfBounds { .. } => Phase::Extract,
            TilingError::Resample { .. } => Phase::Transform,
            TilingError::DuplicateKey(_)
            | TilingError::StagingUnavailable { .. }
            | TilingError::Cancelled { .. } => Phase::Stage,
            TilingError::NotFound(_)
            | TilingError::TileOverlapDetected { .. }
            | TilingError::DimensionMismatch { .. } => Phase::Compose,
            TilingError::StorageFailure { phase, .. } => *phase,
        }
    }

    /// Whether this error points at a bug in the pipeline itself rather than
    /// at bad input or a failing collaborator.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            TilingError::OutOfBounds { .. }
                | TilingError::DuplicateKey(_)
                | TilingError::NotFound(_)
                | TilingError::TileOverlapDetected { .. }
        )
    }
}

/// Errors from loading a [`TilingConfig`](crate::core::config::TilingConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] TilingError),
}

/// Result type alias for tiling operations.
pub type TilingResult<T> = Result<T, TilingError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RunId;

    #[test]
    fn test_storage_failure_names_tile_and_phase() {
        let key = TileKey::new(RunId::new(), TileCoord::new(1, 1));
        let error = TilingError::StorageFailure {
            key,
            phase: Phase::Stage,
            error: "disk full".to_string(),
        };
        assert_eq!(error.coord(), Some(TileCoord::new(1, 1)));
        assert_eq!(error.phase(), Phase::Stage);
        let message = error.to_string();
        assert!(message.contains("(1, 1)"));
        assert!(message.contains("stage"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let error = TilingError::DimensionMismatch {
            axis: Axis::Horizontal,
            coord: None,
            expected: 1000,
            actual: 994,
        };
        assert_eq!(
            error.to_string(),
            "Output width mismatch: expected 1000, got 994"
        );

        let error = TilingError::DimensionMismatch {
            axis: Axis::Vertical,
            coord: Some(TileCoord::new(2, 0)),
            expected: 40,
            actual: 41,
        };
        assert!(error.to_string().contains("for tile (2, 0)"));
        assert_eq!(error.phase(), Phase::Compose);
    }

    #[test]
    fn test_internal_faults() {
        let rect = TileRect::new(0, 0, 10, 10);
        assert!(TilingError::OutOfBounds { rect, width: 5, height: 5 }.is_internal_fault());
        assert!(!TilingError::invalid_dimension("zero width").is_internal_fault());
    }
}
