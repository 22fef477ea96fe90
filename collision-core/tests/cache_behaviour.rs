//! Tile cache behaviour seen through `CollisionIndex` and `CollisionWorld`.
//!
//! Covers:
//! - LRU eviction and re-decode of evicted tiles
//! - At most one decode per tile under concurrent queries
//! - Prewarming, invalidation and reconfiguration
//! - Live invalidation through the data directory watcher, including after
//!   the world moves to a new directory

use collision_core::format::{encode_tile, tile_file_name};
use collision_core::{
    Aabb, CollisionConfig, CollisionIndex, CollisionResult, CollisionWorld, DataWatcher,
    FsTileSource, ModelSpawn, TileGrid, TileKey, TileSource, WorldPoint,
};
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================
// Helpers
// ============================================================

const MAP: u16 = 3;

/// Filesystem source that counts tile reads and can slow them down
struct CountingSource {
    inner: FsTileSource,
    reads: AtomicU64,
    delay: Duration,
}

impl CountingSource {
    fn new(dir: &Path, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: FsTileSource::new(dir),
            reads: AtomicU64::new(0),
            delay,
        })
    }

    fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl TileSource for CountingSource {
    fn read_tile(&self, key: TileKey) -> CollisionResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.read_tile(key)
    }

    fn read_index(&self, map_id: u16) -> CollisionResult<Option<Vec<u8>>> {
        self.inner.read_index(map_id)
    }

    fn list_tiles(&self, map_id: u16) -> CollisionResult<Vec<TileKey>> {
        self.inner.list_tiles(map_id)
    }
}

/// One 10x10 block in the middle of each of tiles (0..n, 0)
fn write_row(dir: &Path, n: u8) {
    for x in 0..n {
        let key = TileKey::new(MAP, x, 0);
        let cx = f64::from(x) * 100.0 + 50.0;
        let block = ModelSpawn {
            id: u32::from(x) + 1,
            name: format!("block_{}", x),
            position: WorldPoint::new(cx, 50.0, 0.0),
            bounds: Aabb::new(
                WorldPoint::new(cx - 5.0, 45.0, -5.0),
                WorldPoint::new(cx + 5.0, 55.0, 5.0),
            ),
        };
        std::fs::write(dir.join(tile_file_name(key)), encode_tile(key, &[block]).unwrap()).unwrap();
    }
}

fn open_index(source: Arc<CountingSource>, capacity: usize) -> CollisionIndex {
    CollisionIndex::open(
        MAP,
        TileGrid::new(100.0, 64),
        source,
        NonZeroUsize::new(capacity).unwrap(),
    )
    .unwrap()
}

fn center_of(x: u8) -> WorldPoint {
    WorldPoint::new(f64::from(x) * 100.0 + 50.0, 50.0, 0.0)
}

// ============================================================
// 1. Eviction
// ============================================================

#[test]
fn test_evicted_tile_is_decoded_again() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 3);
    let source = CountingSource::new(dir.path(), Duration::ZERO);
    let index = open_index(source.clone(), 2);

    for x in 0..3 {
        let result = index.find_spawns_in_radius(center_of(x), 1.0).unwrap();
        assert_eq!(result.spawn_ids(), vec![u32::from(x) + 1]);
    }
    assert_eq!(source.reads(), 3);
    assert_eq!(index.cache().len(), 2);
    assert!(!index.cache().contains(TileKey::new(MAP, 0, 0)));

    // Tile 0 was least recently used; asking again costs a read
    index.find_spawns_in_radius(center_of(0), 1.0).unwrap();
    assert_eq!(source.reads(), 4);

    let stats = index.stats();
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.decodes, 4);
    assert_eq!(stats.entries, 2);
}

#[test]
fn test_recent_use_protects_from_eviction() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 3);
    let source = CountingSource::new(dir.path(), Duration::ZERO);
    let index = open_index(source.clone(), 2);

    index.find_spawns_in_radius(center_of(0), 1.0).unwrap();
    index.find_spawns_in_radius(center_of(1), 1.0).unwrap();
    index.find_spawns_in_radius(center_of(0), 1.0).unwrap();
    index.find_spawns_in_radius(center_of(2), 1.0).unwrap();

    assert!(index.cache().contains(TileKey::new(MAP, 0, 0)));
    assert!(!index.cache().contains(TileKey::new(MAP, 1, 0)));
    assert_eq!(source.reads(), 3);
}

// ============================================================
// 2. Concurrency
// ============================================================

#[test]
fn test_concurrent_queries_decode_each_tile_once() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 2);
    let source = CountingSource::new(dir.path(), Duration::from_millis(20));
    let index = open_index(source.clone(), 4);

    let blocked: Vec<bool> = (0..32)
        .into_par_iter()
        .map(|_| {
            let result = index
                .test_line_of_sight(WorldPoint::new(0.0, 50.0, 0.0), WorldPoint::new(199.0, 50.0, 0.0))
                .unwrap();
            !result.clear
        })
        .collect();

    assert!(blocked.iter().all(|b| *b));
    // Every query stops in tile 0, so only tile 0 is ever read
    assert_eq!(source.reads(), 1);
    assert_eq!(index.stats().decodes, 1);
}

#[test]
fn test_concurrent_mixed_queries_share_tiles() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 4);
    let source = CountingSource::new(dir.path(), Duration::from_millis(5));
    let index = open_index(source.clone(), 8);

    (0..64u32).into_par_iter().for_each(|i| {
        let x = (i % 4) as u8;
        if i % 2 == 0 {
            let result = index.find_spawns_in_radius(center_of(x), 2.0).unwrap();
            assert_eq!(result.spawn_ids(), vec![u32::from(x) + 1]);
        } else {
            let start = WorldPoint::new(f64::from(x) * 100.0 + 5.0, 50.0, 0.0);
            let result = index.test_line_of_sight(start, center_of(x)).unwrap();
            assert_eq!(result.blocking_spawn.unwrap().id, u32::from(x) + 1);
        }
    });

    assert_eq!(source.reads(), 4);
}

// ============================================================
// 3. Prewarm, invalidation, reconfigure
// ============================================================

#[test]
fn test_prewarm_all_respects_capacity() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 5);
    let source = CountingSource::new(dir.path(), Duration::ZERO);
    let index = open_index(source.clone(), 3);

    assert_eq!(index.prewarm_all().unwrap(), 3);
    assert_eq!(index.cache().len(), 3);
    assert_eq!(source.reads(), 3);

    // Prewarmed tiles answer without another read
    index.find_spawns_in_radius(center_of(0), 1.0).unwrap();
    assert_eq!(source.reads(), 3);
}

#[test]
fn test_invalidate_picks_up_new_file() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 1);
    let world = CollisionWorld::new(CollisionConfig::with_data_dir(dir.path())).unwrap();
    world.open_map(MAP).unwrap();

    assert_eq!(world.find_spawns_in_radius(MAP, center_of(0), 1.0).unwrap().spawn_ids(), vec![1]);

    let key = TileKey::new(MAP, 0, 0);
    std::fs::write(dir.path().join(tile_file_name(key)), encode_tile(key, &[]).unwrap()).unwrap();
    // Cached copy still answers until invalidated
    assert_eq!(world.find_spawns_in_radius(MAP, center_of(0), 1.0).unwrap().spawn_ids(), vec![1]);

    assert!(world.invalidate_tile(key));
    assert!(world.find_spawns_in_radius(MAP, center_of(0), 1.0).unwrap().matches.is_empty());
}

#[test]
fn test_watcher_invalidates_changed_tile() {
    let dir = tempfile::tempdir().unwrap();
    write_row(dir.path(), 1);
    let world = Arc::new(CollisionWorld::new(CollisionConfig::with_data_dir(dir.path())).unwrap());
    let index = world.open_map(MAP).unwrap();
    let key = TileKey::new(MAP, 0, 0);
    index.prewarm(&[key]).unwrap();
    assert!(index.cache().contains(key));

    let watcher = DataWatcher::start(dir.path(), &world).unwrap();
    std::fs::write(dir.path().join(tile_file_name(key)), encode_tile(key, &[]).unwrap()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while index.cache().contains(key) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!index.cache().contains(key));
    assert!(watcher.invalidations() >= 1);
    assert!(world.find_spawns_in_radius(MAP, center_of(0), 1.0).unwrap().matches.is_empty());
}

#[test]
fn test_retargeted_watcher_follows_reconfigure() {
    let old_dir = tempfile::tempdir().unwrap();
    let new_dir = tempfile::tempdir().unwrap();
    write_row(old_dir.path(), 1);
    write_row(new_dir.path(), 1);
    let world = Arc::new(CollisionWorld::new(CollisionConfig::with_data_dir(old_dir.path())).unwrap());
    world.open_map(MAP).unwrap();
    let mut watcher = DataWatcher::start(old_dir.path(), &world).unwrap();

    assert_eq!(world.reconfigure(new_dir.path()), vec![MAP]);
    watcher.retarget(new_dir.path()).unwrap();
    assert_eq!(watcher.data_dir(), new_dir.path());

    let index = world.open_map(MAP).unwrap();
    let key = TileKey::new(MAP, 0, 0);
    index.prewarm(&[key]).unwrap();
    std::fs::write(new_dir.path().join(tile_file_name(key)), encode_tile(key, &[]).unwrap()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while index.cache().contains(key) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!index.cache().contains(key));
    assert!(world.find_spawns_in_radius(MAP, center_of(0), 1.0).unwrap().matches.is_empty());
}
