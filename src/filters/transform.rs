//! Whole-image geometry: resize, rotate and output size limits.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::PixelBuffer;
use crate::tiling::transformer::ResampleFilter;
use image::{imageops, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Largest accepted output width.
pub const MAX_OUTPUT_WIDTH: u32 = 26_000;

/// Largest accepted output height.
pub const MAX_OUTPUT_HEIGHT: u32 = 78_000;

/// Clamp a requested output size to [`MAX_OUTPUT_WIDTH`] x [`MAX_OUTPUT_HEIGHT`].
pub fn clamp_output_size(width: u32, height: u32) -> (u32, u32) {
    (width.min(MAX_OUTPUT_WIDTH), height.min(MAX_OUTPUT_HEIGHT))
}

/// Resize the whole image in one pass.
pub fn downscale(
    image: &PixelBuffer,
    width: u32,
    height: u32,
    filter: ResampleFilter,
) -> TilingResult<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(TilingError::invalid_dimension(format!(
            "resize target must be positive, got {}x{}",
            width, height
        )));
    }
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }
    Ok(imageops::resize(image, width, height, filter.filter_type()))
}

/// Rotate clockwise by `degrees`.
///
/// Multiples of 90 are exact and swap the dimensions where needed. Any other
/// angle rotates about the centre with bilinear sampling onto a canvas
/// enlarged to the rotated bounding box, so no corner is lost. Uncovered
/// areas are transparent.
pub fn rotate(image: &PixelBuffer, degrees: f32) -> TilingResult<PixelBuffer> {
    if !degrees.is_finite() {
        return Err(TilingError::invalid_dimension(format!(
            "rotation angle must be finite, got {}",
            degrees
        )));
    }

    let normalized = degrees.rem_euclid(360.0);
    let rotated = match normalized {
        d if d == 0.0 => image.clone(),
        d if d == 90.0 => imageops::rotate90(image),
        d if d == 180.0 => imageops::rotate180(image),
        d if d == 270.0 => imageops::rotate270(image),
        d => rotate_expanded(image, d.to_radians()),
    };
    Ok(rotated)
}

fn rotate_expanded(image: &PixelBuffer, radians: f32) -> PixelBuffer {
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    let (width, height) = image.dimensions();
    let (sin, cos) = f64::from(radians).sin_cos();
    let extent = |along: u32, across: u32, a: f64, b: f64| {
        // Absorb float noise at exact fits.
        let length = f64::from(along) * a.abs() + f64::from(across) * b.abs() - 1e-6;
        (length.ceil() as u32).max(1)
    };
    let out_width = extent(width, height, cos, sin);
    let out_height = extent(height, width, cos, sin);

    // The source has to fit on the canvas before it is turned.
    let pad_width = out_width.max(width);
    let pad_height = out_height.max(height);
    let mut padded = PixelBuffer::from_pixel(pad_width, pad_height, CLEAR);
    imageops::replace(
        &mut padded,
        image,
        i64::from((pad_width - width) / 2),
        i64::from((pad_height - height) / 2),
    );

    let rotated = rotate_about_center(&padded, radians, Interpolation::Bilinear, CLEAR);
    imageops::crop_imm(
        &rotated,
        (pad_width - out_width) / 2,
        (pad_height - out_height) / 2,
        out_width,
        out_height,
    )
    .to_image()
}
