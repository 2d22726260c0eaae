//! Per-pixel color adjustments.
//!
//! Alpha is never touched.

use crate::core::types::PixelBuffer;
use image::{imageops, Pixel};

/// Brightness factor of the fixed-strength brightness filter.
pub const BRIGHTNESS_FACTOR: f32 = 2.2;

/// Contrast factor of the fixed-strength contrast filter.
pub const CONTRAST_FACTOR: f32 = 1.2;

/// Multiply every color channel by `factor`, clamping to the channel range.
pub fn brightness(image: &mut PixelBuffer, factor: f32) {
    for pixel in image.pixels_mut() {
        let channels = pixel.channels_mut();
        for channel in channels.iter_mut().take(3) {
            *channel = (*channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Scale each color channel's distance from mid-grey by `factor`.
pub fn contrast(image: &mut PixelBuffer, factor: f32) {
    let adjust = |v: u8| -> u8 { ((v as f32 - 128.0) * factor + 128.0).round().clamp(0.0, 255.0) as u8 };
    for pixel in image.pixels_mut() {
        let channels = pixel.channels_mut();
        for channel in channels.iter_mut().take(3) {
            *channel = adjust(*channel);
        }
    }
}

/// Invert the color channels.
pub fn invert(image: &mut PixelBuffer) {
    imageops::invert(image);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn single(pixel: [u8; 4]) -> PixelBuffer {
        PixelBuffer::from_pixel(1, 1, Rgba(pixel))
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let mut image = single([10, 100, 200, 50]);
        brightness(&mut image, BRIGHTNESS_FACTOR);
        assert_eq!(*image.get_pixel(0, 0), Rgba([22, 220, 255, 50]));
    }

    #[test]
    fn test_contrast_around_mid_grey() {
        let mut image = single([128, 28, 228, 255]);
        contrast(&mut image, CONTRAST_FACTOR);
        assert_eq!(*image.get_pixel(0, 0), Rgba([128, 8, 248, 255]));
    }

    #[test]
    fn test_invert_keeps_alpha() {
        let mut image = single([0, 55, 255, 9]);
        invert(&mut image);
        assert_eq!(*image.get_pixel(0, 0), Rgba([255, 200, 0, 9]));
    }
}
