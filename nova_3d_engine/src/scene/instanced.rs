/// Instanced: draws a wrapped drawable once per instance matrix, in one draw
/// call per material pass.
///
/// Each instance contributes a world matrix (kept on the CPU for bounds and
/// distance) and an instance matrix (uploaded to the per-instance buffer).
/// The render data manager keeps one Instanced per instance key, with the
/// view-projection already folded into each instance matrix.

use std::sync::Arc;
use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::math::BoundingSphere;
use crate::renderer::{BufferUsage, Renderer};
use crate::render::draw_call::{DrawSource, DrawTarget, RenderInfo};
use crate::render::submit::{submit_draw_call, SubmitOptions};
use crate::resource::{RayQuery, RenderBuffer};
use crate::scene::drawable::Drawable;

const MATRIX_BYTES: usize = std::mem::size_of::<Mat4>();

pub struct Instanced {
    drawable: Arc<Drawable>,
    world_matrices: Vec<Mat4>,
    instance_buffer: RenderBuffer,
}

impl Instanced {
    pub fn new(drawable: Arc<Drawable>) -> Self {
        Self {
            drawable,
            world_matrices: Vec::new(),
            instance_buffer: RenderBuffer::new(BufferUsage::Instance, true)
                .with_grow_increment(16 * MATRIX_BYTES),
        }
    }

    pub fn drawable(&self) -> &Arc<Drawable> {
        &self.drawable
    }

    pub fn set_drawable(&mut self, drawable: Arc<Drawable>) {
        self.drawable = drawable;
    }

    pub fn instance_count(&self) -> u32 {
        self.world_matrices.len() as u32
    }

    pub fn world_matrices(&self) -> &[Mat4] {
        &self.world_matrices
    }

    /// Drop all instances, keeping the GPU allocation
    pub fn clear(&mut self) {
        self.world_matrices.clear();
        self.instance_buffer.clear();
    }

    /// Append an instance placed at `world`, uploading `instance_matrix`
    pub fn add_instance(&mut self, world: Mat4, instance_matrix: Mat4) {
        self.world_matrices.push(world);
        self.instance_buffer.add_data(bytemuck::bytes_of(&instance_matrix));
    }

    /// Byte contents of the per-instance buffer
    pub fn instance_data(&self) -> &[u8] {
        self.instance_buffer.data()
    }

    /// Union of the wrapped drawable's bounds at every instance
    pub fn bounding_sphere(&self) -> BoundingSphere {
        let local = self.drawable.bounding_sphere();
        let mut sphere = BoundingSphere::default();
        for world in &self.world_matrices {
            sphere.merge(&local.transformed(world));
        }
        sphere
    }

    /// Mean instance position
    pub fn centroid(&self) -> Vec3 {
        if self.world_matrices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.world_matrices.iter().map(|m| m.w_axis.truncate()).sum();
        sum / self.world_matrices.len() as f32
    }

    /// Draw the wrapped drawable once, instanced over every instance
    ///
    /// Draw calls of the wrapped drawable are collected, then given the
    /// instance buffer and count.
    pub fn draw(
        &mut self,
        renderer: &mut dyn Renderer,
        target: &mut DrawTarget<'_>,
        source: &DrawSource,
    ) -> Result<()> {
        if self.world_matrices.is_empty() {
            return Ok(());
        }
        self.instance_buffer.sync(renderer)?;
        let Some(instance_gpu) = self.instance_buffer.gpu_buffer().cloned() else {
            return Ok(());
        };

        let mut collected = RenderInfo {
            depth_pass: target.first_pass_only(),
            camera_position: target.camera_position(),
            ..RenderInfo::new()
        };
        self.drawable.draw(renderer, &mut DrawTarget::Queue(&mut collected), source)?;

        for mut call in collected.draw_calls {
            call.command.instance_buffer = Some(Arc::clone(&instance_gpu));
            call.command.instance_count = self.instance_count();
            match target {
                DrawTarget::Queue(info) => info.draw_calls.push(call),
                DrawTarget::Immediate(frame) => {
                    submit_draw_call(renderer, &call, frame, &SubmitOptions::default())?;
                }
            }
        }
        Ok(())
    }

    /// Closest hit over every instance; `query.ray` is in the space the
    /// instance world matrices are expressed in
    pub fn raycast(&self, query: &mut RayQuery) -> bool {
        let ray = query.ray;
        let mut hit = false;
        for (index, world) in self.world_matrices.iter().enumerate() {
            let inverse = world.inverse();
            let local = ray.transformed(&inverse);
            let mut local_query = RayQuery { ray: local, min_distance: f32::INFINITY, ..*query };
            if !self.drawable.raycast(&mut local_query) {
                continue;
            }
            let point = world.transform_point3(local.point_at(local_query.min_distance));
            let distance = point.distance(ray.origin);
            if distance < query.min_distance {
                query.min_distance = distance;
                query.primitive_index = local_query.primitive_index;
                query.part_index = Some(index);
                if query.compute_normal {
                    query.normal = inverse.transpose().transform_vector3(local_query.normal).normalize_or_zero();
                }
                hit = true;
            }
        }
        hit
    }
}

#[cfg(test)]
#[path = "instanced_tests.rs"]
mod tests;
