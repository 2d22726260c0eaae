//! File-backed tile store.
//!
//! Each tile is written as a PNG (lossless, so a round trip is pixel-exact)
//! named after its [`TileKey`]: `tile_<run>_<col>_<row>.png`. Because the run
//! ID is part of the name, several runs can share one directory. Destination
//! offsets are kept in an in-memory index next to the files.

use crate::core::error::{Phase, TilingError, TilingResult};
use crate::core::types::TileKey;
use crate::staging::{StagedTile, TileStore};
use image::ImageFormat;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STAGED_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    offset: (u32, u32),
    written: bool,
}

/// Tile store writing one PNG per tile into a staging directory.
#[derive(Debug)]
pub struct FileTileStore {
    dir: PathBuf,
    index: Mutex<HashMap<TileKey, IndexEntry>>,
    // Removes the directory on drop when the store created it.
    _owned: Option<TempDir>,
}

impl FileTileStore {
    /// Stage into `dir`, creating it if needed. The directory is left in
    /// place when the store is dropped.
    pub fn new(dir: impl Into<PathBuf>) -> TilingResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TilingError::StagingUnavailable {
            path: dir.clone(),
            error: e.to_string(),
        })?;
        Ok(Self {
            dir,
            index: Mutex::new(HashMap::new()),
            _owned: None,
        })
    }

    /// Stage into a fresh directory under the system temp dir, removed
    /// together with the store.
    pub fn temporary() -> TilingResult<Self> {
        Self::temporary_in(std::env::temp_dir())
    }

    /// Stage into a fresh directory under `parent`, removed together with
    /// the store.
    pub fn temporary_in(parent: impl AsRef<Path>) -> TilingResult<Self> {
        let parent = parent.as_ref();
        let temp = tempfile::Builder::new()
            .prefix("tessella-")
            .tempdir_in(parent)
            .map_err(|e| TilingError::StagingUnavailable {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        debug!("Staging tiles in {}", temp.path().display());
        Ok(Self {
            dir: temp.path().to_path_buf(),
            index: Mutex::new(HashMap::new()),
            _owned: Some(temp),
        })
    }

    /// Directory the tiles are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a tile with `key` is staged at.
    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        self.dir.join(key.file_name(STAGED_EXTENSION))
    }

    /// Drop the reservation for a failed write once its partial file is gone.
    ///
    /// If the file could not be removed the entry stays indexed, unwritten,
    /// so a later `delete` can still find it.
    fn discard_partial(&self, key: TileKey, path: &Path, removal: io::Result<()>) {
        match removal {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    "Could not remove partial tile {} at {}: {}",
                    key,
                    path.display(),
                    e
                );
                return;
            }
        }
        self.index.lock().remove(&key);
    }

    fn storage_failure(key: TileKey, phase: Phase, error: impl ToString) -> TilingError {
        TilingError::StorageFailure {
            key,
            phase,
            error: error.to_string(),
        }
    }
}

impl TileStore for FileTileStore {
    fn put(&self, key: TileKey, tile: StagedTile) -> TilingResult<()> {
        let path = self.path_for(&key);

        // Reserve the key first so a concurrent put of the same key fails
        // instead of racing on the file.
        match self.index.lock().entry(key) {
            Entry::Occupied(_) => return Err(TilingError::DuplicateKey(key)),
            Entry::Vacant(slot) => {
                slot.insert(IndexEntry {
                    path: path.clone(),
                    offset: tile.offset,
                    written: false,
                });
            }
        }

        if let Err(error) = tile.pixels.save_with_format(&path, ImageFormat::Png) {
            self.discard_partial(key, &path, std::fs::remove_file(&path));
            return Err(Self::storage_failure(key, Phase::Stage, error));
        }

        if let Some(entry) = self.index.lock().get_mut(&key) {
            entry.written = true;
        }
        Ok(())
    }

    fn get(&self, key: &TileKey) -> TilingResult<StagedTile> {
        let entry = match self.index.lock().get(key) {
            Some(entry) if entry.written => entry.clone(),
            _ => return Err(TilingError::NotFound(*key)),
        };

        let pixels = image::open(&entry.path)
            .map_err(|e| Self::storage_failure(*key, Phase::Compose, e))?
            .into_rgba8();
        Ok(StagedTile {
            pixels,
            offset: entry.offset,
        })
    }

    fn delete(&self, key: &TileKey) -> TilingResult<()> {
        let mut index = self.index.lock();
        let entry = index.get(key).ok_or(TilingError::NotFound(*key))?;

        match std::fs::remove_file(&entry.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Self::storage_failure(*key, Phase::Cleanup, e)),
        }
        index.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<TileKey> {
        self.index.lock().keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.index.lock().len()
    }

    fn contains(&self, key: &TileKey) -> bool {
        self.index.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PixelBuffer, RunId, TileCoord};
    use image::Rgba;

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("tile_"))
            .count()
    }

    #[test]
    fn test_round_trip_is_pixel_exact() {
        let parent = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(parent.path()).unwrap();
        let key = TileKey::new(RunId::new(), TileCoord::new(1, 2));
        let pixels = PixelBuffer::from_fn(13, 9, |x, y| {
            Rgba([(x * 19) as u8, (y * 27) as u8, (x * y) as u8, (255 - x) as u8])
        });
        let tile = StagedTile::new(pixels, 142, 200);

        store.put(key, tile.clone()).unwrap();
        assert!(store.path_for(&key).exists());
        assert_eq!(store.get(&key).unwrap(), tile);

        store.delete(&key).unwrap();
        assert!(!store.path_for(&key).exists());
        assert_eq!(staged_files(parent.path()), 0);
    }

    #[test]
    fn test_duplicate_and_missing() {
        let store = FileTileStore::temporary().unwrap();
        let key = TileKey::new(RunId::new(), TileCoord::new(0, 0));
        let tile = StagedTile::new(PixelBuffer::new(2, 2), 0, 0);

        store.put(key, tile.clone()).unwrap();
        assert!(matches!(store.put(key, tile), Err(TilingError::DuplicateKey(_))));
        store.delete(&key).unwrap();
        assert!(matches!(store.get(&key), Err(TilingError::NotFound(_))));
        assert!(matches!(store.delete(&key), Err(TilingError::NotFound(_))));
    }

    #[test]
    fn test_shared_directory_between_runs() {
        let parent = tempfile::tempdir().unwrap();
        let first = FileTileStore::new(parent.path()).unwrap();
        let second = FileTileStore::new(parent.path()).unwrap();
        let coord = TileCoord::new(1, 1);
        let a = TileKey::new(RunId::new(), coord);
        let b = TileKey::new(RunId::new(), coord);

        first.put(a, StagedTile::new(PixelBuffer::from_pixel(1, 1, Rgba([1, 0, 0, 255])), 0, 0)).unwrap();
        second.put(b, StagedTile::new(PixelBuffer::from_pixel(1, 1, Rgba([2, 0, 0, 255])), 0, 0)).unwrap();
        assert_eq!(staged_files(parent.path()), 2);

        assert_eq!(first.get(&a).unwrap().pixels.get_pixel(0, 0)[0], 1);
        assert_eq!(second.get(&b).unwrap().pixels.get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let parent = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(parent.path().join("staging")).unwrap();
        let key = TileKey::new(RunId::new(), TileCoord::new(1, 1));

        // A directory squatting on the tile's path makes the write fail.
        std::fs::create_dir(store.path_for(&key)).unwrap();
        let error = store
            .put(key, StagedTile::new(PixelBuffer::new(2, 2), 0, 0))
            .unwrap_err();

        assert!(matches!(error, TilingError::StorageFailure { phase: Phase::Stage, .. }));
        assert_eq!(error.coord(), Some(TileCoord::new(1, 1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unremovable_partial_stays_indexed() {
        let parent = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(parent.path()).unwrap();
        let key = TileKey::new(RunId::new(), TileCoord::new(2, 0));
        let path = store.path_for(&key);

        store.index.lock().insert(
            key,
            IndexEntry {
                path: path.clone(),
                offset: (0, 0),
                written: false,
            },
        );
        std::fs::write(&path, b"partial").unwrap();

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        store.discard_partial(key, &path, Err(denied));

        assert!(store.contains(&key));
        assert!(matches!(store.get(&key), Err(TilingError::NotFound(_))));

        store.delete(&key).unwrap();
        assert!(store.is_empty());
        assert_eq!(staged_files(parent.path()), 0);
    }

    #[test]
    fn test_removed_partial_drops_entry() {
        let store = FileTileStore::temporary().unwrap();
        let key = TileKey::new(RunId::new(), TileCoord::new(0, 3));
        let path = store.path_for(&key);
        store.index.lock().insert(
            key,
            IndexEntry {
                path: path.clone(),
                offset: (0, 0),
                written: false,
            },
        );

        store.discard_partial(key, &path, Err(io::Error::from(io::ErrorKind::NotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_temporary_dir_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let store = FileTileStore::temporary_in(parent.path()).unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.exists());
        drop(store);
        assert!(!dir.exists());
    }
}
