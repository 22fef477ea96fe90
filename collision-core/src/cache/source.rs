//! Tile sources: where raw tile and index bytes come from.
//!
//! The cache only talks to the `TileSource` trait, so tests and tooling can
//! plug in other backends. "Not found" is `Ok(None)`; every other I/O failure
//! is an error and must never be treated as an absent tile.

use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{CollisionError, CollisionResult};
use crate::format::{index_file_name, parse_tile_file_name, tile_file_name};
use crate::types::TileKey;

pub trait TileSource: Send + Sync {
    /// Raw tile bytes, `None` when no file exists for the key
    fn read_tile(&self, key: TileKey) -> CollisionResult<Option<Vec<u8>>>;

    /// Raw map index bytes, `None` when the map ships without an index
    fn read_index(&self, map_id: u16) -> CollisionResult<Option<Vec<u8>>>;

    /// Every tile the source holds for a map
    fn list_tiles(&self, map_id: u16) -> CollisionResult<Vec<TileKey>>;
}

/// Reads `{map:03}_{x:02}_{y:02}.ctile` and `{map:03}.cidx` from one directory
#[derive(Debug, Clone)]
pub struct FsTileSource {
    data_dir: PathBuf,
}

impl FsTileSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tile_path(&self, key: TileKey) -> PathBuf {
        self.data_dir.join(tile_file_name(key))
    }

    pub fn index_path(&self, map_id: u16) -> PathBuf {
        self.data_dir.join(index_file_name(map_id))
    }

    fn read_optional(path: PathBuf) -> CollisionResult<Option<Vec<u8>>> {
        match std::fs::read(&path) {
            Ok(bytes) => {
                trace!(path = %path.display(), len = bytes.len(), "read file");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CollisionError::Io { path, source }),
        }
    }
}

impl TileSource for FsTileSource {
    fn read_tile(&self, key: TileKey) -> CollisionResult<Option<Vec<u8>>> {
        Self::read_optional(self.tile_path(key))
    }

    fn read_index(&self, map_id: u16) -> CollisionResult<Option<Vec<u8>>> {
        Self::read_optional(self.index_path(map_id))
    }

    fn list_tiles(&self, map_id: u16) -> CollisionResult<Vec<TileKey>> {
        let dir = match std::fs::read_dir(&self.data_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CollisionError::Io {
                    path: self.data_dir.clone(),
                    source,
                })
            }
        };

        let mut keys = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|source| CollisionError::Io {
                path: self.data_dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(parse_tile_file_name) {
                if key.map_id == map_id {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsTileSource::new(dir.path());
        assert!(source.read_tile(TileKey::new(1, 0, 0)).unwrap().is_none());
        assert!(source.read_index(1).unwrap().is_none());
    }

    #[test]
    fn test_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsTileSource::new(dir.path());
        let key = TileKey::new(1, 4, 5);
        std::fs::write(source.tile_path(key), b"bytes").unwrap();
        assert_eq!(source.read_tile(key).unwrap().as_deref(), Some(&b"bytes"[..]));
    }

    #[test]
    fn test_directory_in_place_of_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsTileSource::new(dir.path());
        let key = TileKey::new(1, 0, 0);
        std::fs::create_dir(source.tile_path(key)).unwrap();
        assert!(matches!(
            source.read_tile(key),
            Err(CollisionError::Io { .. })
        ));
    }

    #[test]
    fn test_list_tiles_filters_by_map() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsTileSource::new(dir.path());
        for key in [TileKey::new(1, 2, 0), TileKey::new(1, 0, 1), TileKey::new(2, 0, 0)] {
            std::fs::write(source.tile_path(key), b"").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(source.index_path(1), b"").unwrap();

        assert_eq!(
            source.list_tiles(1).unwrap(),
            vec![TileKey::new(1, 0, 1), TileKey::new(1, 2, 0)]
        );
        assert!(FsTileSource::new(dir.path().join("missing"))
            .list_tiles(1)
            .unwrap()
            .is_empty());
    }
}
