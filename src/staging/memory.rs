//! In-memory tile store.

use crate::core::error::{TilingError, TilingResult};
use crate::core::types::TileKey;
use crate::staging::{StagedTile, TileStore};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Thread-safe map of staged tiles.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: Mutex<HashMap<TileKey, StagedTile>>,
}

impl MemoryTileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Approximate pixel memory held, in bytes.
    pub fn memory_size(&self) -> usize {
        self.tiles
            .lock()
            .values()
            .map(|tile| tile.pixels.as_raw().len())
            .sum()
    }
}

impl TileStore for MemoryTileStore {
    fn put(&self, key: TileKey, tile: StagedTile) -> TilingResult<()> {
        match self.tiles.lock().entry(key) {
            Entry::Occupied(_) => Err(TilingError::DuplicateKey(key)),
            Entry::Vacant(slot) => {
                slot.insert(tile);
                Ok(())
            }
        }
    }

    fn get(&self, key: &TileKey) -> TilingResult<StagedTile> {
        self.tiles
            .lock()
            .get(key)
            .cloned()
            .ok_or(TilingError::NotFound(*key))
    }

    fn delete(&self, key: &TileKey) -> TilingResult<()> {
        self.tiles
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or(TilingError::NotFound(*key))
    }

    fn keys(&self) -> Vec<TileKey> {
        self.tiles.lock().keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.tiles.lock().len()
    }

    fn contains(&self, key: &TileKey) -> bool {
        self.tiles.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PixelBuffer, RunId, TileCoord};
    use image::Rgba;
    use rayon::prelude::*;

    fn key(col: u32, row: u32) -> TileKey {
        TileKey::new(RunId::new(), TileCoord::new(col, row))
    }

    #[test]
    fn test_round_trip() {
        let store = MemoryTileStore::new();
        let key = key(2, 1);
        let pixels = PixelBuffer::from_fn(7, 5, |x, y| Rgba([x as u8, y as u8, 3, 128]));
        let tile = StagedTile::new(pixels, 200, 100);

        store.put(key, tile.clone()).unwrap();
        assert_eq!(store.get(&key).unwrap(), tile);
        assert_eq!(store.memory_size(), 7 * 5 * 4);

        store.delete(&key).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_and_missing() {
        let store = MemoryTileStore::new();
        let key = key(0, 0);
        let tile = StagedTile::new(PixelBuffer::new(1, 1), 0, 0);

        store.put(key, tile.clone()).unwrap();
        assert!(matches!(store.put(key, tile), Err(TilingError::DuplicateKey(k)) if k == key));

        store.delete(&key).unwrap();
        assert!(matches!(store.get(&key), Err(TilingError::NotFound(_))));
        assert!(matches!(store.delete(&key), Err(TilingError::NotFound(_))));
    }

    #[test]
    fn test_same_coord_different_runs() {
        let store = MemoryTileStore::new();
        let tile = StagedTile::new(PixelBuffer::new(1, 1), 0, 0);
        store.put(key(1, 1), tile.clone()).unwrap();
        store.put(key(1, 1), tile).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_puts() {
        let store = MemoryTileStore::new();
        let run = RunId::new();

        (0..64u32).into_par_iter().for_each(|i| {
            let key = TileKey::new(run, TileCoord::new(i % 8, i / 8));
            let tile = StagedTile::new(PixelBuffer::from_pixel(2, 2, Rgba([i as u8, 0, 0, 255])), i, 0);
            store.put(key, tile).unwrap();
        });

        assert_eq!(store.len(), 64);
        let tile = store.get(&TileKey::new(run, TileCoord::new(3, 5))).unwrap();
        assert_eq!(tile.pixels.get_pixel(0, 0)[0], 43);
    }
}
