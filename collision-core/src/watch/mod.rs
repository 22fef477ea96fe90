//! Data directory watcher.
//!
//! Watches the collision data directory with `notify` and invalidates cached
//! tiles whose files change on disk. The next query re-reads them. Nothing is
//! loaded in the background.
//!
//! ```text
//! notify thread ──► mpsc ──► collision-watch thread ──► CollisionWorld::invalidate_tile
//! ```

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CollisionError, CollisionResult};
use crate::format::{parse_tile_file_name, INDEX_EXTENSION};
use crate::world::CollisionWorld;

pub struct DataWatcher {
    data_dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    invalidations: Arc<AtomicU64>,
}

impl DataWatcher {
    /// Start watching `data_dir` on behalf of `world`. The watcher holds only
    /// a weak reference, so it never keeps the world alive.
    pub fn start<P: AsRef<Path>>(data_dir: P, world: &Arc<CollisionWorld>) -> CollisionResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&data_dir, RecursiveMode::NonRecursive)?;

        let invalidations = Arc::new(AtomicU64::new(0));
        let worker = {
            let world = Arc::downgrade(world);
            let invalidations = invalidations.clone();
            std::thread::Builder::new()
                .name("collision-watch".to_string())
                .spawn(move || run_worker(rx, world, invalidations))
                .map_err(|source| CollisionError::Io {
                    path: data_dir.clone(),
                    source,
                })?
        };

        info!(data_dir = %data_dir.display(), "collision data watcher started");
        Ok(Self {
            data_dir,
            watcher: Some(watcher),
            worker: Some(worker),
            invalidations,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Move the watch to `data_dir`, typically right after
    /// `CollisionWorld::reconfigure`. The new directory is watched before the
    /// old one is released; on error the watcher stays on the old directory.
    pub fn retarget<P: AsRef<Path>>(&mut self, data_dir: P) -> CollisionResult<()> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if data_dir == self.data_dir {
            return Ok(());
        }
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };

        watcher.watch(&data_dir, RecursiveMode::NonRecursive)?;
        if let Err(e) = watcher.unwatch(&self.data_dir) {
            // The old directory may already be gone
            debug!(data_dir = %self.data_dir.display(), error = %e, "unwatch failed");
        }

        info!(
            from = %self.data_dir.display(),
            to = %data_dir.display(),
            "collision data watcher retargeted"
        );
        self.data_dir = data_dir;
        Ok(())
    }

    /// Tiles evicted because their file changed
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

impl Drop for DataWatcher {
    fn drop(&mut self) {
        // Dropping the watcher closes the channel, which ends the worker loop.
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!(data_dir = %self.data_dir.display(), "collision data watcher stopped");
    }
}

fn run_worker(
    rx: Receiver<notify::Result<Event>>,
    world: Weak<CollisionWorld>,
    invalidations: Arc<AtomicU64>,
) {
    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "collision watcher error");
                continue;
            }
        };
        let Some(world) = world.upgrade() else {
            break;
        };
        let count = apply_event(&world, &event);
        invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Invalidate every open-map tile named by a create, modify or remove event.
/// Returns how many cached tiles were dropped.
pub fn apply_event(world: &CollisionWorld, event: &Event) -> usize {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return 0;
    }

    let mut invalidated = 0;
    for path in &event.paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(key) = parse_tile_file_name(name) {
            if world.invalidate_tile(key) {
                debug!(tile = %key, "tile file changed, cache entry dropped");
                invalidated += 1;
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(INDEX_EXTENSION) {
            info!(path = %path.display(), "map index changed; reopen the map to pick it up");
        }
    }
    invalidated
}
