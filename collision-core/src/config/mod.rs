//! Collision configuration.
//!
//! One `CollisionConfig` per process: the data directory, the per-map cache
//! capacity and the grid geometry shared by every map. Loaded from JSON or
//! from `COLLISION_*` environment variables layered over the defaults.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_DATA_DIR, DEFAULT_GRID_DIM, DEFAULT_TILE_SIZE, MAX_GRID_DIM,
};
use crate::error::{CollisionError, CollisionResult};
use crate::grid::TileGrid;

pub const ENV_DATA_DIR: &str = "COLLISION_DATA_DIR";
pub const ENV_CACHE_CAPACITY: &str = "COLLISION_CACHE_CAPACITY";
pub const ENV_TILE_SIZE: &str = "COLLISION_TILE_SIZE";
pub const ENV_GRID_DIM: &str = "COLLISION_GRID_DIM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub data_dir: PathBuf,
    /// Decoded tiles kept per map
    pub cache_capacity: usize,
    /// Tile edge length in world units
    pub tile_size: f64,
    /// Tiles per grid axis
    pub grid_dim: u16,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            tile_size: DEFAULT_TILE_SIZE,
            grid_dim: DEFAULT_GRID_DIM,
        }
    }
}

impl CollisionConfig {
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by any `COLLISION_*` variables that are set.
    /// Unparseable values are a configuration error, not silently ignored.
    pub fn from_env() -> CollisionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> CollisionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            config.cache_capacity = parse_var(ENV_CACHE_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TILE_SIZE) {
            config.tile_size = parse_var(ENV_TILE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GRID_DIM) {
            config.grid_dim = parse_var(ENV_GRID_DIM, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> CollisionResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CollisionError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> CollisionResult<()> {
        if self.cache_capacity == 0 {
            return Err(CollisionError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err(CollisionError::Config(format!(
                "tile_size must be positive, got {}",
                self.tile_size
            )));
        }
        if self.grid_dim == 0 || self.grid_dim > MAX_GRID_DIM {
            return Err(CollisionError::Config(format!(
                "grid_dim must be in 1..={}, got {}",
                MAX_GRID_DIM, self.grid_dim
            )));
        }
        Ok(())
    }

    pub fn grid(&self) -> TileGrid {
        TileGrid::new(self.tile_size, self.grid_dim)
    }

    pub fn capacity(&self) -> CollisionResult<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| CollisionError::Config("cache_capacity must be at least 1".to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> CollisionResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CollisionError::Config(format!("{} has invalid value {:?}", name, raw)))
}
