//! Tile addressing: world coordinates to grid cells.
//!
//! Pure functions, no I/O. The grid covers `[0, grid_dim * tile_size)` on the
//! `x` and `y` axes; `z` never affects addressing.

use crate::constants::{DEFAULT_GRID_DIM, DEFAULT_TILE_SIZE, MAX_GRID_DIM};
use crate::types::{TileKey, WorldPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    tile_size: f64,
    grid_dim: u16,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_GRID_DIM)
    }
}

impl TileGrid {
    /// `grid_dim` is clamped to `1..=256`; `CollisionConfig::validate` rejects
    /// out-of-range values before they get here.
    pub fn new(tile_size: f64, grid_dim: u16) -> Self {
        debug_assert!(tile_size.is_finite() && tile_size > 0.0);
        Self {
            tile_size,
            grid_dim: grid_dim.clamp(1, MAX_GRID_DIM),
        }
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    pub fn grid_dim(&self) -> u16 {
        self.grid_dim
    }

    /// World-space edge length of the whole grid
    pub fn world_extent(&self) -> f64 {
        self.tile_size * f64::from(self.grid_dim)
    }

    /// Grid cell containing `point`, or `None` outside the grid
    pub fn world_to_tile(&self, map_id: u16, point: WorldPoint) -> Option<TileKey> {
        let tx = self.cell_of(point.x)?;
        let ty = self.cell_of(point.y)?;
        Some(TileKey::new(map_id, tx, ty))
    }

    /// World-space `(min, max)` corners of a tile on the x/y plane
    pub fn tile_bounds(&self, key: TileKey) -> ((f64, f64), (f64, f64)) {
        let x0 = f64::from(key.tile_x) * self.tile_size;
        let y0 = f64::from(key.tile_y) * self.tile_size;
        ((x0, y0), (x0 + self.tile_size, y0 + self.tile_size))
    }

    fn cell_of(&self, coord: f64) -> Option<u8> {
        if !coord.is_finite() {
            return None;
        }
        let cell = (coord / self.tile_size).floor();
        if cell < 0.0 || cell >= f64::from(self.grid_dim) {
            return None;
        }
        Some(cell as u8)
    }

    fn clamp_cell(&self, cell: f64) -> i64 {
        (cell.floor() as i64).clamp(0, i64::from(self.grid_dim) - 1)
    }

    // ========================================================================
    // Segment traversal
    // ========================================================================

    /// Every tile crossed by the x/y projection of `start -> end`, ordered from
    /// start to end. Parts of the segment outside the grid are clipped away.
    pub fn tiles_along_segment(
        &self,
        map_id: u16,
        start: WorldPoint,
        end: WorldPoint,
    ) -> Vec<TileKey> {
        self.segment_crossings(map_id, start, end)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Same traversal as `tiles_along_segment`, paired with the parameter in
    /// `[0, 1]` along `start -> end` at which the segment leaves each tile.
    /// Exit parameters never decrease; the last one is the clipped end.
    pub fn segment_crossings(
        &self,
        map_id: u16,
        start: WorldPoint,
        end: WorldPoint,
    ) -> Vec<(TileKey, f64)> {
        if !start.is_finite() || !end.is_finite() {
            return Vec::new();
        }
        let Some((t0, t1)) = self.clip_to_grid(start, end) else {
            return Vec::new();
        };

        // Work in tile units from here on.
        let ax = (start.x + (end.x - start.x) * t0) / self.tile_size;
        let ay = (start.y + (end.y - start.y) * t0) / self.tile_size;
        let bx = (start.x + (end.x - start.x) * t1) / self.tile_size;
        let by = (start.y + (end.y - start.y) * t1) / self.tile_size;

        let (mut cx, mut cy) = (self.clamp_cell(ax), self.clamp_cell(ay));
        let (ex, ey) = (self.clamp_cell(bx), self.clamp_cell(by));
        let (dx, dy) = (bx - ax, by - ay);

        let step_x = if ex > cx { 1 } else if ex < cx { -1 } else { 0 };
        let step_y = if ey > cy { 1 } else if ey < cy { -1 } else { 0 };
        let (mut t_max_x, t_delta_x) = first_crossing(ax, cx, dx);
        let (mut t_max_y, t_delta_y) = first_crossing(ay, cy, dy);

        let steps = (ex - cx).unsigned_abs() + (ey - cy).unsigned_abs();
        let mut tiles = Vec::with_capacity(steps as usize + 1);
        let mut current = TileKey::new(map_id, cx as u8, cy as u8);
        // `t_max_*` run over the clipped range; map them back onto the segment.
        let to_segment = |u: f64| t0 + u.clamp(0.0, 1.0) * (t1 - t0);
        let mut last_exit = t0;

        for _ in 0..steps {
            // Once an axis reaches its end cell, only the other axis may move.
            let move_x = if cx == ex {
                false
            } else if cy == ey {
                true
            } else {
                t_max_x < t_max_y
            };

            let crossing = if move_x {
                cx += step_x;
                let at = t_max_x;
                t_max_x += t_delta_x;
                at
            } else {
                cy += step_y;
                let at = t_max_y;
                t_max_y += t_delta_y;
                at
            };
            last_exit = to_segment(crossing).max(last_exit);
            tiles.push((current, last_exit));
            current = TileKey::new(map_id, cx as u8, cy as u8);
        }
        tiles.push((current, t1.max(last_exit)));

        tiles
    }

    /// Liang-Barsky clip of the x/y projection against the grid square.
    /// Returns the surviving parameter range within `[0, 1]`.
    fn clip_to_grid(&self, start: WorldPoint, end: WorldPoint) -> Option<(f64, f64)> {
        let extent = self.world_extent();
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;

        for (p, q) in [
            (-dx, start.x),
            (dx, extent - start.x),
            (-dy, start.y),
            (dy, extent - start.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }

        Some((t0, t1))
    }

    // ========================================================================
    // Radius coverage
    // ========================================================================

    /// Tiles overlapping the bounding square of the disk around `center`, in
    /// row-major order. Exact membership is decided by the caller.
    pub fn tiles_in_radius(&self, map_id: u16, center: WorldPoint, radius: f64) -> Vec<TileKey> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let extent = self.world_extent();
        if center.x + radius < 0.0
            || center.y + radius < 0.0
            || center.x - radius >= extent
            || center.y - radius >= extent
        {
            return Vec::new();
        }

        let min_x = self.clamp_cell((center.x - radius) / self.tile_size);
        let max_x = self.clamp_cell((center.x + radius) / self.tile_size);
        let min_y = self.clamp_cell((center.y - radius) / self.tile_size);
        let max_y = self.clamp_cell((center.y + radius) / self.tile_size);

        let mut tiles = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
        for ty in min_y..=max_y {
            for tx in min_x..=max_x {
                tiles.push(TileKey::new(map_id, tx as u8, ty as u8));
            }
        }
        tiles
    }
}

/// Parametric distance to the first cell boundary along one axis, and the
/// distance between successive boundaries. `t` runs over `[0, 1]`.
fn first_crossing(origin: f64, cell: i64, delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        ((cell as f64 + 1.0 - origin) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        ((cell as f64 - origin) / delta, -1.0 / delta)
    } else {
        (f64::INFINITY, f64::INFINITY)
    }
}
