//! Binary Tile Format
//!
//! Decodes the per-tile record stream and the per-map index produced by the
//! external export step, and encodes both for tooling and tests.
//!
//! ## Tile layout (little-endian)
//! ```text
//! "CTIL" | version u32 | map u16 | tile_x u8 | tile_y u8 | count u32
//! count x [ body_len u32 | id u32 | name_len u16 | name | pos 3xf32 | min 3xf32 | max 3xf32 ]
//! ```
//!
//! Header problems reject the whole tile. A bad record only costs itself:
//! it is skipped, counted in `dropped_records`, and decoding resumes at the
//! next record boundary.

pub mod cursor;
pub mod index;

pub use cursor::ByteCursor;
pub use index::{decode_map_index, encode_map_index, MapIndex};

use tracing::{debug, trace};

use crate::types::{Aabb, ModelSpawn, TileData, TileKey, WorldPoint};

pub const TILE_MAGIC: [u8; 4] = *b"CTIL";
pub const TILE_VERSION: u32 = 1;
pub const TILE_HEADER_SIZE: usize = 16;

/// body_len + id + name_len + 9 f32 components, with an empty name
pub const MIN_RECORD_SIZE: usize = 4 + 4 + 2 + 9 * 4;

pub const TILE_EXTENSION: &str = "ctile";
pub const INDEX_EXTENSION: &str = "cidx";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("header describes tile {found}, expected {expected}")]
    KeyMismatch { expected: TileKey, found: TileKey },

    #[error("index describes map {found}, expected {expected}")]
    MapMismatch { expected: u16, found: u16 },

    #[error("record count {count} does not fit in memory")]
    RecordCountOverflow { count: u64 },

    #[error("invalid grid extent in index")]
    InvalidExtent,

    #[error("spawn {id} name is {len} bytes, limit is {}", u16::MAX)]
    NameTooLong { id: u32, len: usize },
}

/// Why a single record was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    MalformedBody,
    InvalidName,
    InvertedBounds,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MalformedBody => "malformed body",
            SkipReason::InvalidName => "name is not UTF-8",
            SkipReason::InvertedBounds => "bounds min > max",
        }
    }
}

// ============================================================================
// Tile decoding
// ============================================================================

/// Decode one tile file. `key` is the tile the caller asked for; the header
/// must describe the same tile.
pub fn decode_tile(buf: &[u8], key: TileKey) -> Result<TileData, FormatError> {
    let mut cursor = ByteCursor::new(buf);

    let magic = cursor.read_array::<4>()?;
    if magic != TILE_MAGIC {
        return Err(FormatError::BadMagic {
            expected: TILE_MAGIC,
            found: magic,
        });
    }

    let version = cursor.read_u32()?;
    if version != TILE_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported: TILE_VERSION,
        });
    }

    let map_id = cursor.read_u16()?;
    let tile_x = cursor.read_u8()?;
    let tile_y = cursor.read_u8()?;
    let found = TileKey::new(map_id, tile_x, tile_y);
    if found != key {
        return Err(FormatError::KeyMismatch {
            expected: key,
            found,
        });
    }

    let count = cursor.read_u32()?;
    let needed = (count as usize)
        .checked_mul(MIN_RECORD_SIZE)
        .ok_or(FormatError::RecordCountOverflow {
            count: u64::from(count),
        })?;
    if needed > cursor.remaining() {
        return Err(FormatError::Truncated {
            needed,
            available: cursor.remaining(),
        });
    }

    let mut spawns = Vec::with_capacity(count as usize);
    let mut dropped_records = 0u32;

    for index in 0..count {
        // An overrunning length prefix loses every later record boundary.
        let body = match cursor.read_u32().and_then(|len| cursor.take(len as usize)) {
            Ok(body) => body,
            Err(e) => {
                let lost = count - index;
                debug!(tile = %key, index, lost, "record overruns buffer: {}", e);
                dropped_records += lost;
                break;
            }
        };

        match decode_record(body) {
            Ok(spawn) => spawns.push(spawn),
            Err(reason) => {
                debug!(tile = %key, index, "skipping record: {}", reason.as_str());
                dropped_records += 1;
            }
        }
    }

    if !cursor.is_empty() {
        trace!(tile = %key, trailing = cursor.remaining(), "ignoring trailing bytes");
    }

    Ok(TileData {
        key,
        spawns,
        byte_size: u32::try_from(buf.len()).unwrap_or(u32::MAX),
        dropped_records,
    })
}

fn decode_record(body: &[u8]) -> Result<ModelSpawn, SkipReason> {
    let mut cursor = ByteCursor::new(body);
    let malformed = |_| SkipReason::MalformedBody;

    let id = cursor.read_u32().map_err(malformed)?;
    let name_len = cursor.read_u16().map_err(malformed)?;
    let name_bytes = cursor.take(name_len as usize).map_err(malformed)?;
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| SkipReason::InvalidName)?
        .to_string();

    let position = read_point(&mut cursor).map_err(malformed)?;
    let min = read_point(&mut cursor).map_err(malformed)?;
    let max = read_point(&mut cursor).map_err(malformed)?;
    let bounds = Aabb::new(min, max);
    if !bounds.is_valid() {
        return Err(SkipReason::InvertedBounds);
    }

    // Bytes past the known fields belong to newer exporters; ignore them.
    Ok(ModelSpawn {
        id,
        name,
        position,
        bounds,
    })
}

fn read_point(cursor: &mut ByteCursor<'_>) -> Result<WorldPoint, FormatError> {
    Ok(WorldPoint::new(
        f64::from(cursor.read_f32()?),
        f64::from(cursor.read_f32()?),
        f64::from(cursor.read_f32()?),
    ))
}

// ============================================================================
// Tile encoding (export tooling, tests)
// ============================================================================

/// Encode spawns into the tile layout. Bounds are written as given, so this can
/// also produce files with invalid records.
pub fn encode_tile(key: TileKey, spawns: &[ModelSpawn]) -> Result<Vec<u8>, FormatError> {
    let count = u32::try_from(spawns.len()).map_err(|_| FormatError::RecordCountOverflow {
        count: spawns.len() as u64,
    })?;

    let mut out = Vec::with_capacity(TILE_HEADER_SIZE + spawns.len() * (MIN_RECORD_SIZE + 16));
    out.extend_from_slice(&TILE_MAGIC);
    out.extend_from_slice(&TILE_VERSION.to_le_bytes());
    out.extend_from_slice(&key.map_id.to_le_bytes());
    out.push(key.tile_x);
    out.push(key.tile_y);
    out.extend_from_slice(&count.to_le_bytes());

    for spawn in spawns {
        let name_len = u16::try_from(spawn.name.len()).map_err(|_| FormatError::NameTooLong {
            id: spawn.id,
            len: spawn.name.len(),
        })?;
        let body_len = (MIN_RECORD_SIZE - 4 + spawn.name.len()) as u32;

        out.extend_from_slice(&body_len.to_le_bytes());
        out.extend_from_slice(&spawn.id.to_le_bytes());
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(spawn.name.as_bytes());
        write_point(&mut out, &spawn.position);
        write_point(&mut out, &spawn.bounds.min);
        write_point(&mut out, &spawn.bounds.max);
    }

    Ok(out)
}

fn write_point(out: &mut Vec<u8>, point: &WorldPoint) {
    out.extend_from_slice(&(point.x as f32).to_le_bytes());
    out.extend_from_slice(&(point.y as f32).to_le_bytes());
    out.extend_from_slice(&(point.z as f32).to_le_bytes());
}

// ============================================================================
// File naming
// ============================================================================

/// `"{map:03}_{x:02}_{y:02}.ctile"`
pub fn tile_file_name(key: TileKey) -> String {
    format!(
        "{:03}_{:02}_{:02}.{}",
        key.map_id, key.tile_x, key.tile_y, TILE_EXTENSION
    )
}

/// `"{map:03}.cidx"`
pub fn index_file_name(map_id: u16) -> String {
    format!("{:03}.{}", map_id, INDEX_EXTENSION)
}

/// Recover the tile key from a tile file name
pub fn parse_tile_file_name(name: &str) -> Option<TileKey> {
    let stem = name.strip_suffix(TILE_EXTENSION)?.strip_suffix('.')?;
    let mut parts = stem.split('_');
    let map_id = parts.next()?.parse::<u16>().ok()?;
    let tile_x = parts.next()?.parse::<u8>().ok()?;
    let tile_y = parts.next()?.parse::<u8>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(TileKey::new(map_id, tile_x, tile_y))
}
