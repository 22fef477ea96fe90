//! Error taxonomy for the collision core.
//!
//! Only structural failures surface here. A malformed record inside a valid
//! tile and a missing tile file are recovered locally and show up as counters
//! (`TileData::dropped_records`, `CacheStats::absent_loads`) instead.

use std::path::PathBuf;

use crate::format::FormatError;
use crate::types::TileKey;

/// Generic result type for collision operations
pub type CollisionResult<T> = Result<T, CollisionError>;

#[derive(Debug, thiserror::Error)]
pub enum CollisionError {
    /// Tile header failed validation; no data from this tile is exposed
    #[error("corrupt tile {key}: {source}")]
    Format {
        key: TileKey,
        #[source]
        source: FormatError,
    },

    #[error("corrupt index for map {map_id}: {source}")]
    IndexFormat {
        map_id: u16,
        #[source]
        source: FormatError,
    },

    /// Filesystem failure other than "not found"
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("map {0} is not open")]
    UnknownMap(u16),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl CollisionError {
    /// True for errors caused by bad on-disk data rather than the environment
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CollisionError::Format { .. } | CollisionError::IndexFormat { .. }
        )
    }
}
