//! Reassembly of staged tiles into the final canvas.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{Axis, PixelBuffer, RunId, TileCoord};
use crate::staging::TileStore;
use crate::tiling::planner::TileDescriptor;
use image::imageops;
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Draws staged tiles onto a freshly allocated canvas.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileCompositor;

/// Column widths and row heights read back from a set of descriptors.
#[derive(Debug)]
struct CanvasLayout {
    column_offsets: BTreeMap<u32, u32>,
    row_offsets: BTreeMap<u32, u32>,
}

impl TileCompositor {
    /// Create a new compositor.
    pub fn new() -> Self {
        Self
    }

    /// Build the `output_width x output_height` canvas from the tiles staged
    /// for `descriptors` in `run`.
    ///
    /// The layout is checked before anything is allocated. Each tile is
    /// deleted from the store right after it has been drawn.
    pub fn compose(
        &self,
        output_width: u32,
        output_height: u32,
        descriptors: &[TileDescriptor],
        store: &dyn TileStore,
        run: RunId,
    ) -> TilingResult<PixelBuffer> {
        let layout = CanvasLayout::check(output_width, output_height, descriptors)?;

        let mut canvas = PixelBuffer::new(output_width, output_height);
        for descriptor in descriptors {
            let key = descriptor.key(run);
            let tile = store.get(&key)?;

            if tile.width() != descriptor.dest.width {
                return Err(TilingError::DimensionMismatch {
                    axis: Axis::Horizontal,
                    coord: Some(descriptor.coord),
                    expected: descriptor.dest.width,
                    actual: tile.width(),
                });
            }
            if tile.height() != descriptor.dest.height {
                return Err(TilingError::DimensionMismatch {
                    axis: Axis::Vertical,
                    coord: Some(descriptor.coord),
                    expected: descriptor.dest.height,
                    actual: tile.height(),
                });
            }
            let (x, y) = tile.offset;
            if (x, y) != layout.offset_of(descriptor.coord) {
                return Err(TilingError::TileOverlapDetected {
                    coord: descriptor.coord,
                    x,
                    y,
                });
            }

            imageops::replace(&mut canvas, &tile.pixels, x as i64, y as i64);
            store.delete(&key)?;
        }

        debug!(
            "Composed {} tiles into {}x{} canvas",
            descriptors.len(),
            output_width,
            output_height
        );
        Ok(canvas)
    }
}

impl CanvasLayout {
    /// Verify the descriptors tile the canvas exactly and record where each
    /// column and row starts.
    fn check(
        output_width: u32,
        output_height: u32,
        descriptors: &[TileDescriptor],
    ) -> TilingResult<Self> {
        if output_width == 0 || output_height == 0 {
            return Err(TilingError::invalid_dimension(format!(
                "canvas size must be positive, got {}x{}",
                output_width, output_height
            )));
        }
        if descriptors.is_empty() {
            return Err(TilingError::invalid_dimension("no tiles to compose"));
        }

        let mut widths: BTreeMap<u32, u32> = BTreeMap::new();
        let mut heights: BTreeMap<u32, u32> = BTreeMap::new();
        let mut seen: HashSet<TileCoord> = HashSet::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let coord = descriptor.coord;
            if !seen.insert(coord) {
                return Err(TilingError::TileOverlapDetected {
                    coord,
                    x: descriptor.dest.x,
                    y: descriptor.dest.y,
                });
            }
            consistent(&mut widths, coord.col, descriptor.dest.width, Axis::Horizontal, coord)?;
            consistent(&mut heights, coord.row, descriptor.dest.height, Axis::Vertical, coord)?;
        }

        let total_width: u64 = widths.values().map(|&w| w as u64).sum();
        if total_width != output_width as u64 {
            return Err(TilingError::DimensionMismatch {
                axis: Axis::Horizontal,
                coord: None,
                expected: output_width,
                actual: total_width.min(u32::MAX as u64) as u32,
            });
        }
        let total_height: u64 = heights.values().map(|&h| h as u64).sum();
        if total_height != output_height as u64 {
            return Err(TilingError::DimensionMismatch {
                axis: Axis::Vertical,
                coord: None,
                expected: output_height,
                actual: total_height.min(u32::MAX as u64) as u32,
            });
        }

        let cells = widths.len() * heights.len();
        if cells != descriptors.len() {
            return Err(TilingError::invalid_dimension(format!(
                "{} descriptors cannot fill a {}x{} grid",
                descriptors.len(),
                widths.len(),
                heights.len()
            )));
        }

        let layout = Self {
            column_offsets: offsets(&widths),
            row_offsets: offsets(&heights),
        };

        for descriptor in descriptors {
            if (descriptor.dest.x, descriptor.dest.y) != layout.offset_of(descriptor.coord) {
                return Err(TilingError::TileOverlapDetected {
                    coord: descriptor.coord,
                    x: descriptor.dest.x,
                    y: descriptor.dest.y,
                });
            }
        }

        Ok(layout)
    }

    fn offset_of(&self, coord: TileCoord) -> (u32, u32) {
        (
            self.column_offsets.get(&coord.col).copied().unwrap_or(0),
            self.row_offsets.get(&coord.row).copied().unwrap_or(0),
        )
    }
}

fn consistent(
    sizes: &mut BTreeMap<u32, u32>,
    index: u32,
    size: u32,
    axis: Axis,
    coord: TileCoord,
) -> TilingResult<()> {
    let expected = *sizes.entry(index).or_insert(size);
    if expected != size {
        return Err(TilingError::DimensionMismatch {
            axis,
            coord: Some(coord),
            expected,
            actual: size,
        });
    }
    Ok(())
}

/// Running sums in index order. Sizes are already known to sum to the
/// canvas size, so the additions cannot overflow.
fn offsets(sizes: &BTreeMap<u32, u32>) -> BTreeMap<u32, u32> {
    let mut offset = 0;
    sizes
        .iter()
        .map(|(&index, &size)| {
            let current = offset;
            offset += size;
            (index, current)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TileRect;
    use crate::staging::{MemoryTileStore, StagedTile};
    use crate::tiling::planner::{TileGrid, TileGridPlanner};
    use image::Rgba;

    fn color(coord: TileCoord) -> Rgba<u8> {
        Rgba([coord.col as u8 * 40, coord.row as u8 * 40, 200, 255])
    }

    fn stage_solid(grid: &TileGrid, store: &MemoryTileStore, run: RunId) {
        for d in grid.descriptors() {
            let pixels = PixelBuffer::from_pixel(d.dest.width, d.dest.height, color(d.coord));
            store
                .put(d.key(run), StagedTile::new(pixels, d.dest.x, d.dest.y))
                .unwrap();
        }
    }

    #[test]
    fn test_composes_without_gaps() {
        let grid = TileGridPlanner::default()
            .plan(300, 300, 100, 100, 300, 300)
            .unwrap();
        let store = MemoryTileStore::new();
        let run = RunId::new();
        stage_solid(&grid, &store, run);

        let canvas = TileCompositor::new()
            .compose(300, 300, grid.descriptors(), &store, run)
            .unwrap();

        assert_eq!(canvas.dimensions(), (300, 300));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            assert_eq!(*pixel, color(TileCoord::new(x / 100, y / 100)));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_non_divisible_output() {
        let grid = TileGridPlanner::default()
            .plan(700, 250, 100, 100, 1000, 333)
            .unwrap();
        let store = MemoryTileStore::new();
        let run = RunId::new();
        stage_solid(&grid, &store, run);

        let canvas = TileCompositor::new()
            .compose(1000, 333, grid.descriptors(), &store, run)
            .unwrap();

        assert_eq!(canvas.dimensions(), (1000, 333));
        // Last column starts at 6 * 142 and runs to the right edge.
        assert_eq!(*canvas.get_pixel(852, 0), color(TileCoord::new(6, 0)));
        assert_eq!(*canvas.get_pixel(999, 332), color(TileCoord::new(6, 2)));
        assert_eq!(*canvas.get_pixel(851, 0), color(TileCoord::new(5, 0)));
    }

    #[test]
    fn test_canvas_mismatch_before_allocation() {
        let grid = TileGridPlanner::default()
            .plan(300, 300, 100, 100, 300, 300)
            .unwrap();
        let store = MemoryTileStore::new();
        let run = RunId::new();
        stage_solid(&grid, &store, run);

        let error = TileCompositor::new()
            .compose(301, 300, grid.descriptors(), &store, run)
            .unwrap_err();
        assert!(matches!(
            error,
            TilingError::DimensionMismatch { axis: Axis::Horizontal, expected: 301, actual: 300, .. }
        ));
        // Nothing was consumed.
        assert_eq!(store.len(), 9);
    }

    #[test]
    fn test_inconsistent_column_width() {
        let grid = TileGridPlanner::default()
            .plan(200, 200, 100, 100, 200, 200)
            .unwrap();
        let mut descriptors = grid.descriptors().to_vec();
        descriptors[3].dest.width = 90;

        let error = TileCompositor::new()
            .compose(200, 200, &descriptors, &MemoryTileStore::new(), RunId::new())
            .unwrap_err();
        assert_eq!(error.coord(), Some(TileCoord::new(1, 1)));
        assert!(matches!(error, TilingError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_overlap_detected() {
        let grid = TileGridPlanner::default()
            .plan(200, 100, 100, 100, 200, 100)
            .unwrap();
        let store = MemoryTileStore::new();

        let mut duplicated = grid.descriptors().to_vec();
        duplicated.push(duplicated[0]);
        let error = TileCompositor::new()
            .compose(200, 100, &duplicated, &store, RunId::new())
            .unwrap_err();
        assert!(matches!(error, TilingError::TileOverlapDetected { .. }));

        let mut shifted = grid.descriptors().to_vec();
        shifted[1].dest = TileRect::new(50, 0, 100, 100);
        let error = TileCompositor::new()
            .compose(200, 100, &shifted, &store, RunId::new())
            .unwrap_err();
        assert!(matches!(error, TilingError::TileOverlapDetected { x: 50, .. }));
    }

    #[test]
    fn test_staged_tile_wrong_size() {
        let grid = TileGridPlanner::default()
            .plan(200, 100, 100, 100, 200, 100)
            .unwrap();
        let store = MemoryTileStore::new();
        let run = RunId::new();
        stage_solid(&grid, &store, run);

        let bad = grid.descriptors()[1];
        store.delete(&bad.key(run)).unwrap();
        store
            .put(bad.key(run), StagedTile::new(PixelBuffer::new(100, 99), 100, 0))
            .unwrap();

        let error = TileCompositor::new()
            .compose(200, 100, grid.descriptors(), &store, run)
            .unwrap_err();
        assert!(matches!(
            error,
            TilingError::DimensionMismatch { axis: Axis::Vertical, expected: 100, actual: 99, .. }
        ));
    }

    #[test]
    fn test_missing_tile() {
        let grid = TileGridPlanner::default()
            .plan(100, 100, 100, 100, 50, 50)
            .unwrap();
        let error = TileCompositor::new()
            .compose(50, 50, grid.descriptors(), &MemoryTileStore::new(), RunId::new())
            .unwrap_err();
        assert!(matches!(error, TilingError::NotFound(_)));
    }
}
