//! Whole-image operations applied around the tiled resize.
//!
//! These are single calls into `image` and `imageproc`. None of them know
//! about tiles.

pub mod blur;
pub mod color;
pub mod transform;

pub use transform::{clamp_output_size, downscale, rotate, MAX_OUTPUT_HEIGHT, MAX_OUTPUT_WIDTH};

use crate::core::types::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-strength filters that can be applied before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Gaussian blur, sigma [`blur::BLUR_SIGMA`].
    GaussianBlur,
    /// Unsharp mask.
    Sharpen,
    /// Channels multiplied by [`color::BRIGHTNESS_FACTOR`].
    Brightness,
    /// Contrast scaled by [`color::CONTRAST_FACTOR`].
    Contrast,
    /// Color inversion.
    Invert,
}

impl FilterKind {
    /// Every filter, in display order.
    pub const ALL: [FilterKind; 5] = [
        FilterKind::GaussianBlur,
        FilterKind::Sharpen,
        FilterKind::Brightness,
        FilterKind::Contrast,
        FilterKind::Invert,
    ];

    /// Name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::GaussianBlur => "gaussianblur",
            FilterKind::Sharpen => "sharpen",
            FilterKind::Brightness => "brightness",
            FilterKind::Contrast => "contrast",
            FilterKind::Invert => "invert",
        }
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = FilterKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown filter '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply `kind` to `image` in place.
pub fn apply_filter(image: &mut PixelBuffer, kind: FilterKind) {
    match kind {
        FilterKind::GaussianBlur => *image = blur::gaussian_blur(image, blur::BLUR_SIGMA),
        FilterKind::Sharpen => *image = blur::sharpen(image),
        FilterKind::Brightness => color::brightness(image, color::BRIGHTNESS_FACTOR),
        FilterKind::Contrast => color::contrast(image, color::CONTRAST_FACTOR),
        FilterKind::Invert => color::invert(image),
    }
}
