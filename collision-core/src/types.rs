//! Core data model shared by the decoder, the cache and the query layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A game-world coordinate. `z` is vertical; tiles are laid over `x`/`y`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPoint {
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &WorldPoint) -> f64 {
        (*other - *self).length()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z)
    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Add for WorldPoint {
    type Output = WorldPoint;

    fn add(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for WorldPoint {
    type Output = WorldPoint;

    fn sub(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for WorldPoint {
    type Output = WorldPoint;

    fn mul(self, rhs: f64) -> WorldPoint {
        WorldPoint::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Axis-aligned bounding box. Decoded boxes always satisfy `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl Aabb {
    pub const fn new(min: WorldPoint, max: WorldPoint) -> Self {
        Self { min, max }
    }

    /// `min <= max` on every axis. NaN components fail the check.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn center(&self) -> WorldPoint {
        (self.min + self.max) * 0.5
    }
}

/// A static object placed in the world. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpawn {
    pub id: u32,
    pub name: String,
    pub position: WorldPoint,
    pub bounds: Aabb,
}

/// One cell of a map's tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub map_id: u16,
    pub tile_x: u8,
    pub tile_y: u8,
}

impl TileKey {
    pub const fn new(map_id: u16, tile_x: u8, tile_y: u8) -> Self {
        Self {
            map_id,
            tile_x,
            tile_y,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.map_id, self.tile_x, self.tile_y)
    }
}

/// Parsed contents of one tile file
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    pub key: TileKey,
    pub spawns: Vec<ModelSpawn>,
    pub byte_size: u32,
    /// Records skipped during decode (bad bounds, overruns, bad names)
    pub dropped_records: u32,
}

/// What the cache holds for a key. Corrupt tiles are never cached; they are
/// returned as errors instead.
#[derive(Debug, Clone, PartialEq)]
pub enum TileState {
    Present(TileData),
    /// No backing file: a legitimately unpopulated cell
    Absent(TileKey),
}

impl TileState {
    pub fn key(&self) -> TileKey {
        match self {
            TileState::Present(data) => data.key,
            TileState::Absent(key) => *key,
        }
    }

    pub fn spawns(&self) -> &[ModelSpawn] {
        match self {
            TileState::Present(data) => &data.spawns,
            TileState::Absent(_) => &[],
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TileState::Absent(_))
    }

    pub fn dropped_records(&self) -> u32 {
        match self {
            TileState::Present(data) => data.dropped_records,
            TileState::Absent(_) => 0,
        }
    }
}
