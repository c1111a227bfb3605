/// Per-frame values that material auto-bindings resolve against

use std::sync::Arc;
use glam::{Mat4, Vec3};

use crate::renderer::Texture;
use crate::scene::Camera;

/// Light data gathered during traversal, flattened for uniform upload
#[derive(Debug, Clone, Default)]
pub struct LightParams {
    pub directional_directions: Vec<Vec3>,
    pub directional_colors: Vec<Vec3>,
    pub point_positions: Vec<Vec3>,
    pub point_colors: Vec<Vec3>,
    pub point_ranges: Vec<f32>,
    /// Light mask of each directional light
    pub directional_masks: Vec<u32>,
    /// Light mask of each point light
    pub point_masks: Vec<u32>,
}

impl LightParams {
    pub fn is_empty(&self) -> bool {
        self.directional_directions.is_empty() && self.point_positions.is_empty()
    }

    /// Lights sharing a bit with `mask`; lights without a recorded mask match
    /// every drawable
    pub fn filtered(&self, mask: u32) -> LightParams {
        let matches = |masks: &[u32], i: usize| masks.get(i).map_or(true, |m| m & mask != 0);
        let mut out = LightParams::default();
        for i in 0..self.directional_directions.len() {
            if matches(&self.directional_masks, i) {
                out.directional_directions.push(self.directional_directions[i]);
                out.directional_colors.extend(self.directional_colors.get(i).copied());
                out.directional_masks.extend(self.directional_masks.get(i).copied());
            }
        }
        for i in 0..self.point_positions.len() {
            if matches(&self.point_masks, i) {
                out.point_positions.push(self.point_positions[i]);
                out.point_colors.extend(self.point_colors.get(i).copied());
                out.point_ranges.extend(self.point_ranges.get(i).copied());
                out.point_masks.extend(self.point_masks.get(i).copied());
            }
        }
        out
    }
}

#[derive(Clone, Default)]
pub struct FrameParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub lights: LightParams,
    /// One light-space view-projection per cascade (first shadowed light)
    pub shadow_matrices: Vec<Mat4>,
    /// Far distance of each cascade, front to back
    pub cascade_distances: Vec<f32>,
    pub shadow_maps: Vec<Arc<dyn Texture>>,
}

impl FrameParams {
    pub fn from_camera(camera: &Camera) -> Self {
        Self::from_matrices(camera.view_matrix(), camera.projection_matrix(), camera.position())
    }

    pub fn from_matrices(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
            camera_position,
            ..Default::default()
        }
    }

    /// Copy of these values without any light
    pub fn without_lights(&self) -> FrameParams {
        FrameParams { lights: LightParams::default(), ..self.clone() }
    }

    /// Copy of these values restricted to the lights matching `mask`
    pub fn with_light_mask(&self, mask: u32) -> FrameParams {
        FrameParams { lights: self.lights.filtered(mask), ..self.clone() }
    }
}
