//! Copies tile regions out of the source image.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{PixelBuffer, TileRect};
use image::imageops;

/// Produces owned copies of source regions.
///
/// The copy does not borrow from the source, so a tile stays valid after the
/// source is dropped or modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileExtractor;

impl TileExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Copy exactly `rect` out of `source`.
    ///
    /// A rectangle reaching past the source is a planning bug and fails with
    /// [`TilingError::OutOfBounds`]; it is never clamped.
    pub fn extract(&self, source: &PixelBuffer, rect: TileRect) -> TilingResult<PixelBuffer> {
        let (width, height) = source.dimensions();
        if rect.width == 0 || rect.height == 0 || !rect.is_within_bounds(width, height) {
            return Err(TilingError::OutOfBounds {
                rect,
                width,
                height,
            });
        }

        Ok(imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, (x ^ y) as u8, 255]))
    }

    #[test]
    fn test_extracts_exact_region() {
        let source = gradient(250, 140);
        let tile = TileExtractor::new()
            .extract(&source, TileRect::new(200, 100, 50, 40))
            .unwrap();

        assert_eq!(tile.dimensions(), (50, 40));
        assert_eq!(tile.get_pixel(0, 0), source.get_pixel(200, 100));
        assert_eq!(tile.get_pixel(49, 39), source.get_pixel(249, 139));
    }

    #[test]
    fn test_tile_outlives_source() {
        let mut source = gradient(20, 20);
        let tile = TileExtractor::new()
            .extract(&source, TileRect::new(5, 5, 10, 10))
            .unwrap();
        let before = *tile.get_pixel(0, 0);

        source.put_pixel(5, 5, Rgba([0, 0, 0, 0]));
        drop(source);

        assert_eq!(*tile.get_pixel(0, 0), before);
    }

    #[test]
    fn test_out_of_bounds() {
        let source = gradient(100, 100);
        let extractor = TileExtractor::new();

        for rect in [
            TileRect::new(50, 0, 51, 10),
            TileRect::new(0, 95, 10, 6),
            TileRect::new(100, 0, 1, 1),
            TileRect::new(0, 0, 0, 10),
        ] {
            let error = extractor.extract(&source, rect).unwrap_err();
            assert!(matches!(error, TilingError::OutOfBounds { .. }));
            assert!(error.is_internal_fault());
        }
    }
}
