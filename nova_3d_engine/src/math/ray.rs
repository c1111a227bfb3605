/// Rays and ray/primitive intersection for picking

use glam::{Mat4, Vec3};
use crate::math::{BoundingBox, BoundingSphere};

/// Distance tolerance used when picking lines and points
pub const PICK_TOLERANCE: f32 = 0.01;

/// Half-line `origin + t * direction`, `t >= 0`, direction normalized
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Hit on a triangle: ray distance and barycentric (u, v) of the hit point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub distance: f32,
    pub u: f32,
    pub v: f32,
}

impl Ray {
    /// Create a ray; `direction` is normalized
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Transform into another space (direction re-normalized)
    pub fn transformed(&self, matrix: &Mat4) -> Ray {
        Ray::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }

    /// Möller-Trumbore, two-sided
    pub fn intersects_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<TriangleHit> {
        const EPSILON: f32 = 1e-7;
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let distance = edge2.dot(q) * inv_det;
        if distance < 0.0 {
            return None;
        }
        Some(TriangleHit { distance, u, v })
    }

    /// Distance along the ray to the point of closest approach with segment `a..b`,
    /// if that approach is within `tolerance`
    pub fn intersects_segment(&self, a: Vec3, b: Vec3, tolerance: f32) -> Option<f32> {
        let segment = b - a;
        let w0 = self.origin - a;
        let aa = self.direction.dot(self.direction);
        let bb = self.direction.dot(segment);
        let cc = segment.dot(segment);
        let dd = self.direction.dot(w0);
        let ee = segment.dot(w0);
        let denom = aa * cc - bb * bb;

        // Parallel: any segment point works, pick the one nearest the origin
        let s = if denom.abs() < 1e-9 {
            if cc > 0.0 { ee / cc } else { 0.0 }
        } else {
            (aa * ee - bb * dd) / denom
        };
        let closest_on_segment = a + segment * s.clamp(0.0, 1.0);
        let t = self.direction.dot(closest_on_segment - self.origin).max(0.0);

        let closest_on_ray = self.point_at(t);
        if closest_on_ray.distance(closest_on_segment) <= tolerance {
            Some(t)
        } else {
            None
        }
    }

    /// Distance along the ray to `point`, if the ray passes within `tolerance`
    pub fn intersects_point(&self, point: Vec3, tolerance: f32) -> Option<f32> {
        let t = self.direction.dot(point - self.origin);
        if t < 0.0 {
            return None;
        }
        if self.point_at(t).distance(point) <= tolerance {
            Some(t)
        } else {
            None
        }
    }

    /// Entry distance into a sphere (0 when the origin is inside)
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> Option<f32> {
        let to_center = sphere.center - self.origin;
        let projection = to_center.dot(self.direction);
        let distance_sq = to_center.length_squared() - projection * projection;
        let radius_sq = sphere.radius * sphere.radius;
        if distance_sq > radius_sq {
            return None;
        }
        let half_chord = (radius_sq - distance_sq).sqrt();
        let entry = projection - half_chord;
        let exit = projection + half_chord;
        if exit < 0.0 {
            None
        } else {
            Some(entry.max(0.0))
        }
    }

    /// Entry distance into a box (slab test; 0 when the origin is inside)
    pub fn intersects_box(&self, bbox: &BoundingBox) -> Option<f32> {
        if bbox.is_empty() {
            return None;
        }
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let direction = self.direction[axis];
            if direction.abs() < 1e-9 {
                if origin < bbox.min[axis] || origin > bbox.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let mut t0 = (bbox.min[axis] - origin) * inv;
            let mut t1 = (bbox.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
#[path = "ray_tests.rs"]
mod tests;
