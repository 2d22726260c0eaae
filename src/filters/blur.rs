//! Blur and sharpen.

use crate::core::types::PixelBuffer;
use image::imageops;

/// Sigma of the fixed-strength gaussian blur.
pub const BLUR_SIGMA: f32 = 5.0;

/// Sigma of the unsharp mask used for sharpening.
pub const SHARPEN_SIGMA: f32 = 1.0;

/// Minimum difference, in channel levels, before the unsharp mask kicks in.
pub const SHARPEN_THRESHOLD: i32 = 2;

/// Gaussian blur with the given sigma.
pub fn gaussian_blur(image: &PixelBuffer, sigma: f32) -> PixelBuffer {
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Unsharp-mask sharpening.
pub fn sharpen(image: &PixelBuffer) -> PixelBuffer {
    imageops::unsharpen(image, SHARPEN_SIGMA, SHARPEN_THRESHOLD)
}
