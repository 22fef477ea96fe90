//! Collision World
//!
//! Explicit per-process handle owning one `CollisionIndex` per open map.
//! Create it at startup from a `CollisionConfig`, share it by reference (or
//! `Arc`), and close maps or reconfigure the data directory explicitly.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheStats, FsTileSource, TileSource};
use crate::config::CollisionConfig;
use crate::error::{CollisionError, CollisionResult};
use crate::index::{CollisionIndex, RadiusQueryResult, RaycastResult};
use crate::types::{TileKey, WorldPoint};

pub struct CollisionWorld {
    config: RwLock<CollisionConfig>,
    source: RwLock<Arc<dyn TileSource>>,
    maps: RwLock<HashMap<u16, Arc<CollisionIndex>>>,
}

impl CollisionWorld {
    /// World reading tiles from `config.data_dir`
    pub fn new(config: CollisionConfig) -> CollisionResult<Self> {
        let source: Arc<dyn TileSource> = Arc::new(FsTileSource::new(&config.data_dir));
        Self::with_source(config, source)
    }

    /// World reading tiles from a custom source; `data_dir` is informational
    pub fn with_source(config: CollisionConfig, source: Arc<dyn TileSource>) -> CollisionResult<Self> {
        config.validate()?;
        info!(
            data_dir = %config.data_dir.display(),
            capacity = config.cache_capacity,
            tile_size = config.tile_size,
            grid_dim = config.grid_dim,
            "collision world created"
        );
        Ok(Self {
            config: RwLock::new(config),
            source: RwLock::new(source),
            maps: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> CollisionConfig {
        self.config.read().clone()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.read().data_dir.clone()
    }

    /// Open a map, or return the already open index for it
    pub fn open_map(&self, map_id: u16) -> CollisionResult<Arc<CollisionIndex>> {
        if let Some(index) = self.maps.read().get(&map_id) {
            return Ok(index.clone());
        }

        // Index I/O happens outside the map lock; a racing open keeps the first.
        let (grid, capacity) = {
            let config = self.config.read();
            (config.grid(), config.capacity()?)
        };
        let source = self.source.read().clone();
        let index = Arc::new(CollisionIndex::open(map_id, grid, source, capacity)?);

        Ok(self.maps.write().entry(map_id).or_insert(index).clone())
    }

    pub fn map(&self, map_id: u16) -> Option<Arc<CollisionIndex>> {
        self.maps.read().get(&map_id).cloned()
    }

    fn require(&self, map_id: u16) -> CollisionResult<Arc<CollisionIndex>> {
        self.map(map_id).ok_or(CollisionError::UnknownMap(map_id))
    }

    pub fn open_maps(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.maps.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Close a map and drop its cached tiles. Callers still holding the index
    /// keep a working (but detached) handle.
    pub fn close_map(&self, map_id: u16) -> bool {
        match self.maps.write().remove(&map_id) {
            Some(index) => {
                index.clear();
                info!(map_id, "collision map closed");
                true
            }
            None => false,
        }
    }

    /// Close every map
    pub fn close_all(&self) -> Vec<u16> {
        let closed: Vec<(u16, Arc<CollisionIndex>)> = self.maps.write().drain().collect();
        let mut ids = Vec::with_capacity(closed.len());
        for (map_id, index) in closed {
            index.clear();
            ids.push(map_id);
        }
        ids.sort_unstable();
        ids
    }

    /// Point the world at a new data directory. Every open map is closed;
    /// returns the ids that were open so the caller can reopen them.
    ///
    /// A running `DataWatcher` is not moved; call `DataWatcher::retarget`
    /// with the same directory or it keeps watching the old one.
    pub fn reconfigure<P: Into<PathBuf>>(&self, data_dir: P) -> Vec<u16> {
        let data_dir = data_dir.into();
        let closed = self.close_all();
        *self.source.write() = Arc::new(FsTileSource::new(&data_dir));
        info!(data_dir = %data_dir.display(), closed = closed.len(), "collision data directory changed");
        self.config.write().data_dir = data_dir;
        closed
    }

    /// Drop one cached tile from its map, if that map is open
    pub fn invalidate_tile(&self, key: TileKey) -> bool {
        self.map(key.map_id)
            .is_some_and(|index| index.invalidate_tile(key))
    }

    pub fn stats(&self, map_id: u16) -> CollisionResult<CacheStats> {
        Ok(self.require(map_id)?.stats())
    }

    // ========================================================================
    // Query routing
    // ========================================================================

    pub fn test_line_of_sight(
        &self,
        map_id: u16,
        start: WorldPoint,
        end: WorldPoint,
    ) -> CollisionResult<RaycastResult> {
        self.require(map_id)?.test_line_of_sight(start, end)
    }

    pub fn find_spawns_in_radius(
        &self,
        map_id: u16,
        center: WorldPoint,
        radius: f64,
    ) -> CollisionResult<RadiusQueryResult> {
        self.require(map_id)?.find_spawns_in_radius(center, radius)
    }
}
