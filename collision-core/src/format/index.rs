//! Per-map index file: the grid extent and world bounds a map's tiles cover.
//!
//! ```text
//! "CIDX" | version u32 | map u16 | min_x u8 | min_y u8 | max_x u8 | max_y u8
//!        | bounds min 3xf32 | bounds max 3xf32 | tile_count u32
//! ```

use serde::{Deserialize, Serialize};

use super::{ByteCursor, FormatError};
use crate::grid::TileGrid;
use crate::types::{Aabb, TileKey, WorldPoint};

pub const INDEX_MAGIC: [u8; 4] = *b"CIDX";
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapIndex {
    pub map_id: u16,
    /// Inclusive lower grid corner (x, y)
    pub min_tile: (u8, u8),
    /// Inclusive upper grid corner (x, y)
    pub max_tile: (u8, u8),
    pub bounds: Aabb,
    /// Number of tile files the exporter wrote
    pub tile_count: u32,
}

impl MapIndex {
    /// Index covering the whole grid, used when a map ships without one
    pub fn full_grid(map_id: u16, grid: &TileGrid) -> Self {
        let last = (grid.grid_dim() - 1).min(u16::from(u8::MAX)) as u8;
        let edge = grid.world_extent();
        Self {
            map_id,
            min_tile: (0, 0),
            max_tile: (last, last),
            bounds: Aabb::new(
                WorldPoint::new(0.0, 0.0, f64::MIN),
                WorldPoint::new(edge, edge, f64::MAX),
            ),
            tile_count: 0,
        }
    }

    /// True when the key lies inside this map's populated grid extent
    pub fn contains(&self, key: TileKey) -> bool {
        key.map_id == self.map_id
            && (self.min_tile.0..=self.max_tile.0).contains(&key.tile_x)
            && (self.min_tile.1..=self.max_tile.1).contains(&key.tile_y)
    }
}

pub fn decode_map_index(buf: &[u8]) -> Result<MapIndex, FormatError> {
    let mut cursor = ByteCursor::new(buf);

    let magic = cursor.read_array::<4>()?;
    if magic != INDEX_MAGIC {
        return Err(FormatError::BadMagic {
            expected: INDEX_MAGIC,
            found: magic,
        });
    }
    let version = cursor.read_u32()?;
    if version != INDEX_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported: INDEX_VERSION,
        });
    }

    let map_id = cursor.read_u16()?;
    let min_tile = (cursor.read_u8()?, cursor.read_u8()?);
    let max_tile = (cursor.read_u8()?, cursor.read_u8()?);
    let mut coords = [0f64; 6];
    for c in coords.iter_mut() {
        *c = f64::from(cursor.read_f32()?);
    }
    let bounds = Aabb::new(
        WorldPoint::new(coords[0], coords[1], coords[2]),
        WorldPoint::new(coords[3], coords[4], coords[5]),
    );
    let tile_count = cursor.read_u32()?;

    if min_tile.0 > max_tile.0 || min_tile.1 > max_tile.1 || !bounds.is_valid() {
        return Err(FormatError::InvalidExtent);
    }

    Ok(MapIndex {
        map_id,
        min_tile,
        max_tile,
        bounds,
        tile_count,
    })
}

pub fn encode_map_index(index: &MapIndex) -> Vec<u8> {
    let mut out = Vec::with_capacity(42);
    out.extend_from_slice(&INDEX_MAGIC);
    out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    out.extend_from_slice(&index.map_id.to_le_bytes());
    out.extend_from_slice(&[
        index.min_tile.0,
        index.min_tile.1,
        index.max_tile.0,
        index.max_tile.1,
    ]);
    for p in [index.bounds.min, index.bounds.max] {
        out.extend_from_slice(&(p.x as f32).to_le_bytes());
        out.extend_from_slice(&(p.y as f32).to_le_bytes());
        out.extend_from_slice(&(p.z as f32).to_le_bytes());
    }
    out.extend_from_slice(&index.tile_count.to_le_bytes());
    out
}
