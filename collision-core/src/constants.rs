//! Centralized constants for the collision core.
//!
//! Binary layout constants live next to the codec in `format`; this file holds
//! the grid, cache and geometry defaults shared across modules.

// =====================================================
// Tile Grid
// =====================================================

/// Edge length of one grid tile in world units (shared by all maps)
pub const DEFAULT_TILE_SIZE: f64 = 100.0;

/// Number of tiles along each grid axis
pub const DEFAULT_GRID_DIM: u16 = 64;

/// Largest grid a `u8` tile coordinate can address
pub const MAX_GRID_DIM: u16 = 256;

// =====================================================
// Tile Cache
// =====================================================

/// Decoded tiles kept in memory per map
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Data directory used when no configuration is supplied
pub const DEFAULT_DATA_DIR: &str = "data/collision";

// =====================================================
// Geometry
// =====================================================

/// Direction components below this magnitude are treated as parallel to a slab
pub const PARALLEL_EPSILON: f64 = 1e-12;
