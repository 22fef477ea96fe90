//! Ray/box and point/box tests against spawn bounding boxes.
//!
//! Both tests work on the AABB, not the model mesh: a ray grazing the box of
//! an arch still counts as blocked.

use crate::constants::PARALLEL_EPSILON;
use crate::types::{Aabb, WorldPoint};

/// Finite ray from `origin` along the unit vector `direction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: WorldPoint,
    pub direction: WorldPoint,
    pub length: f64,
}

impl Ray {
    /// Ray covering the segment `start -> end`; `None` when the points coincide
    pub fn between(start: WorldPoint, end: WorldPoint) -> Option<Self> {
        let delta = end - start;
        let length = delta.length();
        if length == 0.0 || !length.is_finite() {
            return None;
        }
        Some(Self {
            origin: start,
            direction: delta * (1.0 / length),
            length,
        })
    }

    pub fn point_at(&self, t: f64) -> WorldPoint {
        self.origin + self.direction * t
    }
}

/// Slab test. Returns the entry distance `t_near` when the ray enters the box
/// within `[0, length]`.
///
/// An origin already inside the box gives a negative `t_near` and is not
/// reported as a hit.
pub fn intersect_ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f64> {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for axis in 0..3 {
        let origin = ray.origin.axis(axis);
        let dir = ray.direction.axis(axis);
        let (lo, hi) = (aabb.min.axis(axis), aabb.max.axis(axis));

        if dir.abs() < PARALLEL_EPSILON {
            // Parallel to this slab: either always inside it or never.
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let mut t1 = (lo - origin) * inv;
        let mut t2 = (hi - origin) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_near = t_near.max(t1);
        t_far = t_far.min(t2);
        if t_near > t_far {
            return None;
        }
    }

    if t_near >= 0.0 && t_near <= ray.length {
        Some(t_near)
    } else {
        None
    }
}

/// Exact Euclidean distance from `point` to the closest point of `aabb`;
/// zero when the point is inside.
pub fn distance_point_aabb(point: &WorldPoint, aabb: &Aabb) -> f64 {
    let clamped = WorldPoint::new(
        point.x.clamp(aabb.min.x, aabb.max.x),
        point.y.clamp(aabb.min.y, aabb.max.y),
        point.z.clamp(aabb.min.z, aabb.max.z),
    );
    point.distance(&clamped)
}
