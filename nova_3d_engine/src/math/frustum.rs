/// Frustum culling volumes.
///
/// A plane is a Vec4 (nx, ny, nz, d) with a unit inward normal; a point is
/// inside when `n . p + d >= 0` for all six planes.
///
/// Matrices follow the GL clip-space convention (NDC depth in [-1, 1]), which is
/// what `Camera` builds with `perspective_rh_gl` / `orthographic_rh_gl`.

use glam::{Mat4, Vec3, Vec4};
use crate::math::{BoundingBox, BoundingSphere};

/// Clipping volume as six inward-facing planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// left, right, bottom, top, near, far
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb/Hartmann extraction: each plane is the last row of `vp` plus or
    /// minus one of the first three. Holds for perspective and orthographic.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let w = vp.row(3);
        let planes = [
            w + vp.row(0),
            w - vp.row(0),
            w + vp.row(1),
            w - vp.row(1),
            w + vp.row(2),
            w - vp.row(2),
        ]
        .map(|plane| {
            let length = plane.truncate().length();
            if length > 0.0 { plane / length } else { plane }
        });

        Self { planes }
    }

    /// World-space corners of the volume described by `vp`
    ///
    /// Order: near plane (bl, br, tr, tl) then far plane (bl, br, tr, tl).
    pub fn corners(vp: &Mat4) -> [Vec3; 8] {
        let inverse = vp.inverse();
        let ndc = [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ];
        ndc.map(|p| inverse.project_point3(p))
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.truncate().dot(point) + plane.w >= 0.0)
    }

    /// Conservative sphere test (false positives possible near corners)
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(sphere.center) + plane.w >= -sphere.radius)
    }

    /// Box test against the corner furthest along each plane normal
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let furthest = Vec3::select(normal.cmpge(Vec3::ZERO), bbox.max, bbox.min);
            normal.dot(furthest) + plane.w >= 0.0
        })
    }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
