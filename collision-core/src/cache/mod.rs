//! Tile Cache
//!
//! Bounded, lazily populated LRU cache of decoded tiles for one map.
//!
//! ## Flow
//! ```text
//! get(key) → [LRU hit?] → bump access seq, return
//!               ↓ miss
//!          [per-key load slot] → re-check LRU → read source → decode → insert
//! ```
//!
//! Only one load per key is in flight: concurrent callers for the same key
//! queue on that key's slot and then find the entry already cached. Hits only
//! take the short LRU lock. Decoded tiles are immutable and shared via `Arc`.

pub mod source;

pub use source::{FsTileSource, TileSource};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::{CollisionError, CollisionResult};
use crate::format::decode_tile;
use crate::types::{TileKey, TileState};

/// One cached tile plus its recency stamp
#[derive(Debug, Clone)]
struct CacheEntry {
    tile: Arc<TileState>,
    last_access_seq: u64,
}

#[derive(Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    decodes: AtomicU64,
    absent_loads: AtomicU64,
    evictions: AtomicU64,
    dropped_records: AtomicU64,
}

pub struct TileCache {
    source: Arc<dyn TileSource>,
    /// LRU order matches `last_access_seq` order: both move under this lock
    entries: Mutex<LruCache<TileKey, CacheEntry>>,
    /// Per-key load slots for misses in flight
    loading: Mutex<HashMap<TileKey, Arc<Mutex<()>>>>,
    access_seq: AtomicU64,
    metrics: CacheMetrics,
}

impl TileCache {
    pub fn new(source: Arc<dyn TileSource>, capacity: NonZeroUsize) -> Self {
        Self {
            source,
            entries: Mutex::new(LruCache::new(capacity)),
            loading: Mutex::new(HashMap::new()),
            access_seq: AtomicU64::new(0),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached without touching recency
    pub fn contains(&self, key: TileKey) -> bool {
        self.entries.lock().contains(&key)
    }

    /// Fetch a tile, loading it on a miss.
    ///
    /// Missing files become cached `Absent` tiles. Corrupt tiles and I/O
    /// failures are returned as errors and nothing is cached for them.
    pub fn get(&self, key: TileKey) -> CollisionResult<Arc<TileState>> {
        if let Some(tile) = self.lookup(key) {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }

        let slot = self
            .loading
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = slot.lock();
            // The previous holder of the slot may have loaded it already.
            if let Some(tile) = self.lookup(key) {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Ok(tile)
            } else {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                let loaded = self.load(key);
                if let Ok(tile) = &loaded {
                    self.insert(key, tile.clone());
                }
                loaded
            }
        };

        self.release_slot(key, slot);
        result
    }

    /// Drop one tile; the next `get` reloads it
    pub fn invalidate(&self, key: TileKey) -> bool {
        let removed = self.entries.lock().pop(&key).is_some();
        if removed {
            debug!(tile = %key, "invalidated");
        }
        removed
    }

    /// Drop every cached tile (metrics are kept)
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        debug!(count, "tile cache cleared");
    }

    /// Cached keys with their access stamps, least recently used first
    pub fn recency(&self) -> Vec<(TileKey, u64)> {
        let entries = self.entries.lock();
        let mut out: Vec<(TileKey, u64)> = entries
            .iter()
            .map(|(key, entry)| (*key, entry.last_access_seq))
            .collect();
        out.sort_by_key(|(_, seq)| *seq);
        out
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, capacity) = {
            let cache = self.entries.lock();
            (cache.len(), cache.cap().get())
        };
        CacheStats {
            entries,
            capacity,
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            decodes: self.metrics.decodes.load(Ordering::Relaxed),
            absent_loads: self.metrics.absent_loads.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            dropped_records: self.metrics.dropped_records.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn next_seq(&self) -> u64 {
        self.access_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lookup(&self, key: TileKey) -> Option<Arc<TileState>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&key)?;
        entry.last_access_seq = self.next_seq();
        Some(entry.tile.clone())
    }

    fn insert(&self, key: TileKey, tile: Arc<TileState>) {
        let mut entries = self.entries.lock();
        let entry = CacheEntry {
            tile,
            last_access_seq: self.next_seq(),
        };
        if let Some((evicted, old)) = entries.push(key, entry) {
            if evicted != key {
                self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(tile = %evicted, last_access = old.last_access_seq, "evicted");
            }
        }
    }

    fn load(&self, key: TileKey) -> CollisionResult<Arc<TileState>> {
        let Some(bytes) = self.source.read_tile(key)? else {
            self.metrics.absent_loads.fetch_add(1, Ordering::Relaxed);
            trace!(tile = %key, "no tile file, caching as absent");
            return Ok(Arc::new(TileState::Absent(key)));
        };

        self.metrics.decodes.fetch_add(1, Ordering::Relaxed);
        let data = decode_tile(&bytes, key).map_err(|source| {
            warn!(tile = %key, "tile failed validation: {}", source);
            CollisionError::Format { key, source }
        })?;

        if data.dropped_records > 0 {
            self.metrics
                .dropped_records
                .fetch_add(u64::from(data.dropped_records), Ordering::Relaxed);
            debug!(tile = %key, dropped = data.dropped_records, "tile loaded with skipped records");
        }
        debug!(tile = %key, spawns = data.spawns.len(), bytes = data.byte_size, "tile decoded");
        Ok(Arc::new(TileState::Present(data)))
    }

    /// Remove the slot once no other caller holds it. Slots are cloned and
    /// dropped only under the `loading` lock, so the count is exact here.
    fn release_slot(&self, key: TileKey, slot: Arc<Mutex<()>>) {
        let mut loading = self.loading.lock();
        drop(slot);
        if loading.get(&key).is_some_and(|s| Arc::strong_count(s) == 1) {
            loading.remove(&key);
        }
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Decode attempts, including ones that failed validation
    pub decodes: u64,
    /// Misses answered with an absent tile (no backing file)
    pub absent_loads: u64,
    pub evictions: u64,
    pub dropped_records: u64,
}

impl CacheStats {
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f32 {
        if self.total_requests() == 0 {
            0.0
        } else {
            (self.hits as f32 / self.total_requests() as f32) * 100.0
        }
    }

    pub fn fill_percent(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.entries as f32 / self.capacity as f32) * 100.0
        }
    }
}
