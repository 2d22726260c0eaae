//! Per-tile resizing.
//!
//! [`TileTransformer`] only does the size bookkeeping. The pixels themselves
//! are produced by a [`Resampler`], by default [`FilterResampler`] which wraps
//! `image::imageops::resize`.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::PixelBuffer;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resampling filter applied when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear (bilinear in 2D).
    #[default]
    Triangle,
    /// Cubic, Catmull-Rom spline.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with window 3.
    Lanczos3,
}

impl ResampleFilter {
    /// The `image` crate filter this maps to.
    pub fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResampleFilter::Nearest),
            "triangle" | "bilinear" => Ok(ResampleFilter::Triangle),
            "catmullrom" | "bicubic" => Ok(ResampleFilter::CatmullRom),
            "gaussian" => Ok(ResampleFilter::Gaussian),
            "lanczos3" => Ok(ResampleFilter::Lanczos3),
            other => Err(format!("unknown resampling filter '{}'", other)),
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResampleFilter::Nearest => "nearest",
            ResampleFilter::Triangle => "triangle",
            ResampleFilter::CatmullRom => "catmullrom",
            ResampleFilter::Gaussian => "gaussian",
            ResampleFilter::Lanczos3 => "lanczos3",
        };
        f.write_str(name)
    }
}

/// Produces a resized copy of a pixel buffer.
pub trait Resampler: Send + Sync {
    /// Resize `tile` to exactly `width x height`.
    fn resample(&self, tile: &PixelBuffer, width: u32, height: u32) -> TilingResult<PixelBuffer>;
}

/// [`Resampler`] backed by `image::imageops::resize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterResampler {
    filter: ResampleFilter,
}

impl FilterResampler {
    /// Create a resampler using `filter`.
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }
}

impl Resampler for FilterResampler {
    fn resample(&self, tile: &PixelBuffer, width: u32, height: u32) -> TilingResult<PixelBuffer> {
        if tile.dimensions() == (width, height) {
            return Ok(tile.clone());
        }
        Ok(imageops::resize(tile, width, height, self.filter.filter_type()))
    }
}

/// Resizes extracted tiles to their target size.
pub struct TileTransformer {
    resampler: Box<dyn Resampler>,
}

impl TileTransformer {
    /// Create a transformer around any resampler.
    pub fn new(resampler: Box<dyn Resampler>) -> Self {
        Self { resampler }
    }

    /// Create a transformer using `image::imageops::resize` with `filter`.
    pub fn with_filter(filter: ResampleFilter) -> Self {
        Self::new(Box::new(FilterResampler::new(filter)))
    }

    /// Resize `tile` to `target_width x target_height`.
    pub fn transform(
        &self,
        tile: &PixelBuffer,
        target_width: u32,
        target_height: u32,
    ) -> TilingResult<PixelBuffer> {
        if target_width == 0 || target_height == 0 {
            return Err(TilingError::invalid_dimension(format!(
                "tile target size must be positive, got {}x{}",
                target_width, target_height
            )));
        }
        if tile.width() == 0 || tile.height() == 0 {
            return Err(TilingError::invalid_dimension("cannot resize an empty tile"));
        }

        let resized = self.resampler.resample(tile, target_width, target_height)?;
        if resized.dimensions() != (target_width, target_height) {
            return Err(TilingError::Resample {
                error: format!(
                    "resampler returned {}x{}, expected {}x{}",
                    resized.width(),
                    resized.height(),
                    target_width,
                    target_height
                ),
            });
        }
        Ok(resized)
    }
}

impl Default for TileTransformer {
    fn default() -> Self {
        Self::with_filter(ResampleFilter::default())
    }
}

impl fmt::Debug for TileTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileTransformer")
            .field("resampler", &"<resampler>")
            .finish()
    }
}
