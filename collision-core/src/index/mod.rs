//! Collision Index
//!
//! Per-map query front end composing tile addressing, the tile cache and the
//! box tests.
//!
//! ## Line of sight
//! ```text
//! [start, end] → tiles along segment (ordered) → for each tile:
//!     cache.get → slab-test every spawn → keep nearest hit so far
//!     nearest hit before the tile's exit? stop
//! ```
//! Boxes are listed in every tile they overlap, so a hit found in one tile
//! may lie beyond it. Only once the segment has left all tiles up to the hit
//! can no later tile hold a nearer entry point.
//!
//! ## Radius
//! Bounding-square tiles → exact point/box distance for every spawn →
//! keep `distance <= radius`, sorted ascending.

pub mod results;

pub use results::{BlockingSpawn, RadiusMatch, RadiusQueryResult, RaycastResult};

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, debug_span, info, warn};

use crate::cache::{CacheStats, TileCache, TileSource};
use crate::error::{CollisionError, CollisionResult};
use crate::format::{decode_map_index, FormatError, MapIndex};
use crate::geometry::{distance_point_aabb, intersect_ray_aabb, Ray};
use crate::grid::TileGrid;
use crate::logging::TimingSpan;
use crate::types::{TileKey, WorldPoint};

pub struct CollisionIndex {
    map_id: u16,
    grid: TileGrid,
    map_index: MapIndex,
    cache: TileCache,
}

impl std::fmt::Debug for CollisionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionIndex")
            .field("map_id", &self.map_id)
            .field("grid", &self.grid)
            .finish_non_exhaustive()
    }
}

impl CollisionIndex {
    /// Read the map's index file and set up an empty cache.
    ///
    /// A missing index means the exporter wrote none; the whole grid is then
    /// treated as potentially populated.
    pub fn open(
        map_id: u16,
        grid: TileGrid,
        source: Arc<dyn TileSource>,
        capacity: NonZeroUsize,
    ) -> CollisionResult<Self> {
        let map_index = match source.read_index(map_id)? {
            Some(bytes) => {
                let index = decode_map_index(&bytes)
                    .map_err(|source| CollisionError::IndexFormat { map_id, source })?;
                if index.map_id != map_id {
                    return Err(CollisionError::IndexFormat {
                        map_id,
                        source: FormatError::MapMismatch {
                            expected: map_id,
                            found: index.map_id,
                        },
                    });
                }
                index
            }
            None => {
                warn!(map_id, "no index file, assuming the full grid");
                MapIndex::full_grid(map_id, &grid)
            }
        };

        info!(
            map_id,
            min_tile = ?map_index.min_tile,
            max_tile = ?map_index.max_tile,
            tiles = map_index.tile_count,
            capacity = capacity.get(),
            "collision index opened"
        );

        Ok(Self {
            map_id,
            grid,
            map_index,
            cache: TileCache::new(source, capacity),
        })
    }

    pub fn map_id(&self) -> u16 {
        self.map_id
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn map_index(&self) -> &MapIndex {
        &self.map_index
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ========================================================================
    // Line of sight
    // ========================================================================

    pub fn test_line_of_sight(
        &self,
        start: WorldPoint,
        end: WorldPoint,
    ) -> CollisionResult<RaycastResult> {
        if !start.is_finite() || !end.is_finite() {
            return Err(CollisionError::InvalidQuery(format!(
                "non-finite line of sight endpoints {:?} -> {:?}",
                start, end
            )));
        }
        let Some(ray) = Ray::between(start, end) else {
            return Ok(RaycastResult::clear(0.0, 0, 0));
        };

        let _span = debug_span!("line_of_sight", map_id = self.map_id).entered();
        let mut tested_count = 0u32;
        let mut tiles_loaded = 0u32;

        // A box listed in an earlier tile can be hit beyond that tile, so the
        // nearest hit only wins once the segment has left every tile before it.
        let mut nearest: Option<(f64, BlockingSpawn)> = None;
        for (key, exit) in self.grid.segment_crossings(self.map_id, start, end) {
            if self.map_index.contains(key) {
                let tile = self.cache.get(key)?;
                tiles_loaded += 1;

                for spawn in tile.spawns() {
                    tested_count += 1;
                    if let Some(t) = intersect_ray_aabb(&ray, &spawn.bounds) {
                        if nearest.as_ref().map_or(true, |(best, _)| t < *best) {
                            nearest = Some((
                                t,
                                BlockingSpawn {
                                    id: spawn.id,
                                    name: spawn.name.clone(),
                                },
                            ));
                        }
                    }
                }
            }

            if nearest.as_ref().is_some_and(|(t, _)| *t <= exit * ray.length) {
                break;
            }
        }

        if let Some((t, spawn)) = nearest {
            debug!(spawn = spawn.id, t, tested_count, tiles_loaded, "line of sight blocked");
            return Ok(RaycastResult {
                clear: false,
                distance: ray.length,
                hit_distance: Some(t),
                hit_point: Some(ray.point_at(t)),
                blocking_spawn: Some(spawn),
                tested_count,
                tiles_loaded,
            });
        }

        debug!(tested_count, tiles_loaded, "line of sight clear");
        Ok(RaycastResult::clear(ray.length, tested_count, tiles_loaded))
    }

    // ========================================================================
    // Radius
    // ========================================================================

    pub fn find_spawns_in_radius(
        &self,
        center: WorldPoint,
        radius: f64,
    ) -> CollisionResult<RadiusQueryResult> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Err(CollisionError::InvalidQuery(format!(
                "radius query at {:?} with radius {}",
                center, radius
            )));
        }

        let _span = debug_span!("radius_query", map_id = self.map_id, radius).entered();
        let mut result = RadiusQueryResult::default();
        // Exporters write a spawn into every tile its box overlaps.
        let mut seen = HashSet::new();

        for key in self.grid.tiles_in_radius(self.map_id, center, radius) {
            if !self.map_index.contains(key) {
                continue;
            }
            let tile = self.cache.get(key)?;
            result.tiles_loaded += 1;

            for spawn in tile.spawns() {
                result.tested_count += 1;
                let distance = distance_point_aabb(&center, &spawn.bounds);
                if distance <= radius && seen.insert(spawn.id) {
                    result.matches.push(RadiusMatch {
                        spawn: spawn.clone(),
                        distance,
                    });
                }
            }
        }

        result.matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.spawn.id.cmp(&b.spawn.id))
        });
        debug!(
            matches = result.matches.len(),
            tested = result.tested_count,
            tiles = result.tiles_loaded,
            "radius query done"
        );
        Ok(result)
    }

    // ========================================================================
    // Cache management
    // ========================================================================

    /// Load the given tiles ahead of latency-sensitive queries. Returns how many
    /// of them hold data (absent tiles are cached but not counted).
    pub fn prewarm(&self, keys: &[TileKey]) -> CollisionResult<usize> {
        let mut present = 0;
        for key in keys {
            if key.map_id != self.map_id || !self.map_index.contains(*key) {
                continue;
            }
            if !self.cache.get(*key)?.is_absent() {
                present += 1;
            }
        }
        Ok(present)
    }

    /// Load every tile the source holds for this map, up to the cache capacity
    pub fn prewarm_all(&self) -> CollisionResult<usize> {
        let _timing = TimingSpan::new("prewarm_all");
        let keys: Vec<TileKey> = self
            .cache
            .source()
            .list_tiles(self.map_id)?
            .into_iter()
            .filter(|k| self.map_index.contains(*k))
            .take(self.cache.capacity())
            .collect();
        let present = self.prewarm(&keys)?;
        info!(map_id = self.map_id, present, "cache prewarmed");
        Ok(present)
    }

    pub fn invalidate_tile(&self, key: TileKey) -> bool {
        key.map_id == self.map_id && self.cache.invalidate(key)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
