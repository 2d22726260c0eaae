//! Tile grid planning.
//!
//! The planner partitions a `W x H` source into `ceil(W / tw) x ceil(H / th)`
//! cells and assigns each cell a destination rectangle in the output canvas.
//!
//! # Order
//!
//! Descriptors are produced in **row-major** order: row 0 left to right, then
//! row 1, and so on. Nothing downstream depends on that order; the compositor
//! and the staging keys only ever use a descriptor's `(col, row)`.
//!
//! # Output sizes
//!
//! Column widths are the same in every row and sum to the output width;
//! row heights likewise. Destination offsets are the running sums of those
//! sizes, so the canvas is covered exactly once.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{Axis, RunId, TileCoord, TileKey, TileRect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule for dividing the output size among columns (or rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSplit {
    /// `output / count` each; the last column or row absorbs the remainder.
    /// Clipped edge tiles are stretched to a full share.
    #[default]
    Uniform,
    /// Each tile keeps its share of the source, so edge tiles stay narrow.
    Proportional,
}

impl FromStr for OutputSplit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(OutputSplit::Uniform),
            "proportional" => Ok(OutputSplit::Proportional),
            other => Err(format!(
                "unknown split '{}' (expected uniform or proportional)",
                other
            )),
        }
    }
}

impl fmt::Display for OutputSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSplit::Uniform => write!(f, "uniform"),
            OutputSplit::Proportional => write!(f, "proportional"),
        }
    }
}

/// One cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDescriptor {
    /// Grid position.
    pub coord: TileCoord,
    /// Region of the source, clipped to the source bounds.
    pub source: TileRect,
    /// Region of the output canvas this tile is resized to fill.
    pub dest: TileRect,
}

impl TileDescriptor {
    /// Staging key of this tile in `run`.
    pub fn key(&self, run: RunId) -> TileKey {
        TileKey::new(run, self.coord)
    }

    /// Target size of the resized tile.
    pub fn target_size(&self) -> (u32, u32) {
        (self.dest.width, self.dest.height)
    }
}

/// The planned grid and its descriptors.
#[derive(Debug, Clone)]
pub struct TileGrid {
    /// Source width in pixels.
    pub source_width: u32,
    /// Source height in pixels.
    pub source_height: u32,
    /// Nominal tile width.
    pub tile_width: u32,
    /// Nominal tile height.
    pub tile_height: u32,
    /// Number of columns.
    pub x_tiles: u32,
    /// Number of rows.
    pub y_tiles: u32,
    /// Output canvas width.
    pub output_width: u32,
    /// Output canvas height.
    pub output_height: u32,
    column_widths: Vec<u32>,
    row_heights: Vec<u32>,
    descriptors: Vec<TileDescriptor>,
}

impl TileGrid {
    /// Descriptors in row-major order.
    pub fn descriptors(&self) -> &[TileDescriptor] {
        &self.descriptors
    }

    /// Get the total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Output width of each column.
    pub fn column_widths(&self) -> &[u32] {
        &self.column_widths
    }

    /// Output height of each row.
    pub fn row_heights(&self) -> &[u32] {
        &self.row_heights
    }

    /// Descriptor at `coord`, if it lies in the grid.
    pub fn descriptor(&self, coord: TileCoord) -> Option<&TileDescriptor> {
        if coord.col >= self.x_tiles || coord.row >= self.y_tiles {
            return None;
        }
        let index = coord.row as usize * self.x_tiles as usize + coord.col as usize;
        self.descriptors.get(index)
    }
}

/// Computes tile grids.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileGridPlanner {
    split: OutputSplit,
}

impl TileGridPlanner {
    /// Create a planner using the given output split rule.
    pub fn new(split: OutputSplit) -> Self {
        Self { split }
    }

    /// The output split rule in use.
    pub fn split(&self) -> OutputSplit {
        self.split
    }

    /// Plan a grid of `tile_width x tile_height` cells over the source and map
    /// it onto an `output_width x output_height` canvas.
    pub fn plan(
        &self,
        source_width: u32,
        source_height: u32,
        tile_width: u32,
        tile_height: u32,
        output_width: u32,
        output_height: u32,
    ) -> TilingResult<TileGrid> {
        for (name, value) in [
            ("source width", source_width),
            ("source height", source_height),
            ("tile width", tile_width),
            ("tile height", tile_height),
            ("output width", output_width),
            ("output height", output_height),
        ] {
            if value == 0 {
                return Err(TilingError::invalid_dimension(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        let columns = source_spans(source_width, tile_width);
        let rows = source_spans(source_height, tile_height);

        let column_widths =
            self.split_output(Axis::Horizontal, output_width, source_width, &columns)?;
        let row_heights = self.split_output(Axis::Vertical, output_height, source_height, &rows)?;

        let column_offsets = running_offsets(&column_widths);
        let row_offsets = running_offsets(&row_heights);

        let mut descriptors = Vec::with_capacity(columns.len() * rows.len());
        for (row, &(y, height)) in rows.iter().enumerate() {
            for (col, &(x, width)) in columns.iter().enumerate() {
                descriptors.push(TileDescriptor {
                    coord: TileCoord::new(col as u32, row as u32),
                    source: TileRect::new(x, y, width, height),
                    dest: TileRect::new(
                        column_offsets[col],
                        row_offsets[row],
                        column_widths[col],
                        row_heights[row],
                    ),
                });
            }
        }

        Ok(TileGrid {
            source_width,
            source_height,
            tile_width,
            tile_height,
            x_tiles: columns.len() as u32,
            y_tiles: rows.len() as u32,
            output_width,
            output_height,
            column_widths,
            row_heights,
            descriptors,
        })
    }

    fn split_output(
        &self,
        axis: Axis,
        output: u32,
        source: u32,
        spans: &[(u32, u32)],
    ) -> TilingResult<Vec<u32>> {
        let sizes = match self.split {
            OutputSplit::Uniform => uniform_split(output, spans.len() as u32),
            OutputSplit::Proportional => proportional_split(output, source, spans),
        };

        if let Some(index) = sizes.iter().position(|&size| size == 0) {
            return Err(TilingError::invalid_dimension(format!(
                "output {} {} leaves tile {} of {} empty",
                axis,
                output,
                index,
                spans.len()
            )));
        }
        Ok(sizes)
    }
}

/// `(offset, length)` of each tile along one axis, clipped to `total`.
fn source_spans(total: u32, nominal: u32) -> Vec<(u32, u32)> {
    let count = total.div_ceil(nominal);
    (0..count)
        .map(|index| {
            let start = index * nominal;
            (start, nominal.min(total - start))
        })
        .collect()
}

fn uniform_split(output: u32, count: u32) -> Vec<u32> {
    let base = output / count;
    let mut sizes = vec![base; count as usize];
    if let Some(last) = sizes.last_mut() {
        *last += output % count;
    }
    sizes
}

fn proportional_split(output: u32, source: u32, spans: &[(u32, u32)]) -> Vec<u32> {
    // Rounded image of a source boundary; exact at 0 and at `source`.
    let boundary = |position: u32| -> u32 {
        let scaled = (position as u64 * output as u64 + source as u64 / 2) / source as u64;
        scaled as u32
    };

    spans
        .iter()
        .map(|&(start, length)| boundary(start + length) - boundary(start))
        .collect()
}

fn running_offsets(sizes: &[u32]) -> Vec<u32> {
    sizes
        .iter()
        .scan(0u32, |offset, &size| {
            let current = *offset;
            *offset += size;
            Some(current)
        })
        .collect()
}
