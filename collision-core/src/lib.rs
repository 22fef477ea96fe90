//! Collision Core - static world collision queries
//!
//! Server-side line-of-sight and proximity queries against static world
//! geometry stored as per-tile binary files:
//! - Binary tile / map index decoding (untrusted input, bounds-checked)
//! - Tile grid addressing and segment traversal
//! - Ray vs. AABB and point vs. AABB geometry
//! - Bounded LRU tile cache with at-most-one decode per tile
//! - Per-map `CollisionIndex` and a process-level `CollisionWorld`
//! - Optional data directory watcher that invalidates changed tiles

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod geometry;
pub mod grid;
pub mod index;
pub mod logging;
pub mod types;
pub mod watch;
pub mod world;

pub use cache::{CacheStats, FsTileSource, TileCache, TileSource};
pub use config::CollisionConfig;
pub use error::{CollisionError, CollisionResult};
pub use format::FormatError;
pub use grid::TileGrid;
pub use index::{CollisionIndex, RadiusMatch, RadiusQueryResult, RaycastResult};
pub use types::{Aabb, ModelSpawn, TileKey, WorldPoint};
pub use watch::DataWatcher;
pub use world::CollisionWorld;
