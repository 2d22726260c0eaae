//! Geometry and identity types shared by the tiling components.
//!
//! Tiles are addressed by their grid coordinates, never by their position in
//! a sequence. A [`TileKey`] pairs those coordinates with the [`RunId`] of the
//! pipeline run that produced the tile, so runs sharing one staging area can
//! never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pixel buffer type used for every tile and for the final canvas.
pub type PixelBuffer = image::RgbaImage;

// ============================================================================
// Grid coordinates
// ============================================================================

/// Column/row position of a tile in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zero-based column index.
    pub col: u32,
    /// Zero-based row index.
    pub row: u32,
}

impl TileCoord {
    /// Create a new coordinate.
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// A rectangular region, either in the source image or in the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    /// X offset from the image origin
    pub x: u32,
    /// Y offset from the image origin
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl TileRect {
    /// Create a new rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the right edge coordinate (exclusive).
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Get the bottom edge coordinate (exclusive).
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Calculate the area of this region in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if this region is entirely within the given bounds.
    pub fn is_within_bounds(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Whether two rectangles share at least one pixel.
    pub fn intersects(&self, other: &TileRect) -> bool {
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// One of the two image axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Columns; sizes along this axis are widths.
    Horizontal,
    /// Rows; sizes along this axis are heights.
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "width"),
            Axis::Vertical => write!(f, "height"),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Identifier of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Full-length form, safe to embed in file names.
    pub fn as_file_stem(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Address of a staged tile: unique per `(run, col, row)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    /// Run that owns the tile.
    pub run: RunId,
    /// Grid position of the tile.
    pub coord: TileCoord,
}

impl TileKey {
    /// Create a key for the tile at `coord` in `run`.
    pub fn new(run: RunId, coord: TileCoord) -> Self {
        Self { run, coord }
    }

    /// File name used when the tile is staged on disk.
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "tile_{}_{}_{}.{}",
            self.run.as_file_stem(),
            self.coord.col,
            self.coord.row,
            extension
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.run, self.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_rect() {
        let rect = TileRect::new(10, 20, 100, 200);
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 220);
        assert_eq!(rect.area(), 20000);
        assert!(rect.is_within_bounds(110, 220));
        assert!(!rect.is_within_bounds(109, 220));
    }

    #[test]
    fn test_rect_intersection() {
        let a = TileRect::new(0, 0, 100, 100);
        let b = TileRect::new(100, 0, 50, 100);
        let c = TileRect::new(99, 99, 10, 10);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(b.intersects(&c));
    }

    #[test]
    fn test_run_id_display() {
        let id = RunId::new();
        assert_eq!(format!("{}", id).len(), 8);
        assert_eq!(id.as_file_stem().len(), 32);
    }

    #[test]
    fn test_tile_key_display() {
        let key = TileKey::new(RunId::new(), TileCoord::new(1, 1));
        assert_eq!(key.to_string(), format!("{}@(1, 1)", key.run));
    }

    #[test]
    fn test_tile_key_file_name_is_unique_per_run() {
        let coord = TileCoord::new(1, 2);
        let a = TileKey::new(RunId::new(), coord);
        let b = TileKey::new(RunId::new(), coord);
        assert_ne!(a.file_name("png"), b.file_name("png"));
        assert!(a.file_name("png").ends_with("_1_2.png"));
    }
}
