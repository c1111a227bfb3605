/// Camera: projection parameters plus a world transform.
///
/// Projections use the GL clip convention (NDC depth in [-1, 1]), matching
/// [`Frustum`] plane extraction and corner reconstruction.

use glam::{Mat4, Vec3};
use crate::math::Frustum;
use crate::renderer::Viewport;

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians, width / height
    Perspective { fov_y: f32, aspect_ratio: f32 },
    /// View volume size in world units
    Orthographic { width: f32, height: f32 },
}

#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    near: f32,
    far: f32,
    /// Camera-to-world transform
    world: Mat4,
    /// Explicit viewport; None renders to the whole target
    viewport: Option<Viewport>,
}

impl Camera {
    pub fn perspective(fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y, aspect_ratio },
            near,
            far,
            world: Mat4::IDENTITY,
            viewport: None,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { width, height },
            near,
            far,
            world: Mat4::IDENTITY,
            viewport: None,
        }
    }

    // ===== TRANSFORM =====

    /// Place the camera with a camera-to-world transform
    pub fn set_world_transform(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Place the camera at `eye` looking at `target`
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.world = Mat4::look_at_rh(eye, target, up).inverse();
    }

    pub fn world_transform(&self) -> Mat4 {
        self.world
    }

    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    // ===== PROJECTION =====

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Update the aspect ratio of a perspective camera (ignored when orthographic)
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect_ratio, .. } = &mut self.projection {
            *aspect_ratio = aspect;
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    // ===== MATRICES =====

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        self.world.inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_for_range(self.near, self.far)
    }

    /// Same projection clipped to `[near, far]` (used for shadow cascade slices)
    pub fn projection_for_range(&self, near: f32, far: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y, aspect_ratio } => {
                Mat4::perspective_rh_gl(fov_y, aspect_ratio, near, far)
            }
            Projection::Orthographic { width, height } => {
                let (x, y) = (width * 0.5, height * 0.5);
                Mat4::orthographic_rh_gl(-x, x, -y, y, near, far)
            }
        }
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix())
    }

    /// World-space corners of the view volume between `near` and `far`
    /// (near plane first, then far plane)
    pub fn frustum_corners(&self, near: f32, far: f32) -> [Vec3; 8] {
        Frustum::corners(&(self.projection_for_range(near, far) * self.view_matrix()))
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
