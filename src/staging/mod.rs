//! Temporary storage for resized tiles.
//!
//! A [`TileStore`] holds each [`StagedTile`] from the moment it is resized
//! until the compositor has drawn it. Two media are provided:
//! - [`MemoryTileStore`]: a map guarded by a mutex
//! - [`FileTileStore`]: lossless PNG files in a staging directory
//!
//! The pipeline never talks to a store directly while staging; it goes
//! through a [`StagingGuard`], which remembers every `put` that left a tile
//! in the store and deletes whatever is still staged when it is dropped.
//! That holds on success, on error and on cancellation alike.

pub mod file;
pub mod memory;

pub use file::FileTileStore;
pub use memory::MemoryTileStore;

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::{PixelBuffer, TileKey, TileRect};
use log::{debug, warn};
use parking_lot::Mutex;

/// A resized tile waiting to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedTile {
    /// Resized pixel data.
    pub pixels: PixelBuffer,
    /// Destination offset `(x, y)` in the output canvas.
    pub offset: (u32, u32),
}

impl StagedTile {
    /// Create a staged tile that belongs at `(x, y)` in the canvas.
    pub fn new(pixels: PixelBuffer, x: u32, y: u32) -> Self {
        Self {
            pixels,
            offset: (x, y),
        }
    }

    /// Width of the tile.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height of the tile.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// The canvas rectangle this tile covers.
    pub fn dest_rect(&self) -> TileRect {
        TileRect::new(self.offset.0, self.offset.1, self.width(), self.height())
    }
}

/// Keyed storage for staged tiles.
///
/// Implementations must accept concurrent `put` calls with distinct keys.
pub trait TileStore: Send + Sync {
    /// Store `tile` under `key`. Fails with [`TilingError::DuplicateKey`] if
    /// the key is already present.
    fn put(&self, key: TileKey, tile: StagedTile) -> TilingResult<()>;

    /// Retrieve the tile stored under `key`, leaving it staged.
    fn get(&self, key: &TileKey) -> TilingResult<StagedTile>;

    /// Remove the tile stored under `key`.
    fn delete(&self, key: &TileKey) -> TilingResult<()>;

    /// Keys currently staged, in no particular order.
    fn keys(&self) -> Vec<TileKey>;

    /// Number of staged tiles.
    fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether nothing is staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is staged.
    fn contains(&self, key: &TileKey) -> bool {
        self.keys().contains(key)
    }
}

/// Scoped release of staged tiles.
///
/// Every key put through the guard is deleted from the store when the guard
/// is released or dropped, unless it is already gone.
pub struct StagingGuard<'a> {
    store: &'a dyn TileStore,
    staged: Mutex<Vec<TileKey>>,
}

impl<'a> StagingGuard<'a> {
    /// Start tracking puts into `store`.
    pub fn new(store: &'a dyn TileStore) -> Self {
        Self {
            store,
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Put a tile into the store and remember its key.
    ///
    /// A failed put whose key the store still holds, such as a partial file
    /// that could not be removed, is remembered too so release can retry it.
    pub fn put(&self, key: TileKey, tile: StagedTile) -> TilingResult<()> {
        match self.store.put(key, tile) {
            Ok(()) => {
                self.staged.lock().push(key);
                Ok(())
            }
            Err(TilingError::DuplicateKey(key)) => Err(TilingError::DuplicateKey(key)),
            Err(error) => {
                if self.store.contains(&key) {
                    self.staged.lock().push(key);
                }
                Err(error)
            }
        }
    }

    /// Number of tiles put through this guard and not yet released.
    pub fn tracked(&self) -> usize {
        self.staged.lock().len()
    }

    /// Delete every tracked key still present in the store.
    ///
    /// Returns how many tiles were actually removed. Failures are logged and
    /// skipped so one bad file does not keep the others around.
    pub fn release(&self) -> usize {
        let keys = std::mem::take(&mut *self.staged.lock());
        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key) {
                Ok(()) => removed += 1,
                Err(TilingError::NotFound(_)) => {}
                Err(error) => warn!("Could not remove staged tile {}: {}", key, error),
            }
        }
        if removed > 0 {
            debug!("Released {} staged tiles", removed);
        }
        removed
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
