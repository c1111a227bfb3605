/// Cascaded shadow map of one directional light.
///
/// The camera's view range is split into cascades, each covering a slice of
/// depth with its own light-space orthographic view and depth-only frame
/// buffer. Cascade slices grow geometrically from the camera.

use std::sync::Arc;
use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::renderer::{ClearFlags, FrameBuffer, FrameBufferDesc, Renderer, Texture, TextureFormat, Viewport};
use crate::render::draw_call::RenderLayer;
use crate::render::frame_params::FrameParams;
use crate::render::render_queue::RenderDataManager;
use crate::render::submit::{submit_draw_calls, SubmitOptions};
use crate::resource::Material;
use crate::scene::{Camera, Light, Scene};

/// Share of the remaining depth range kept by each nearer cascade
const CASCADE_SPLIT: f32 = 0.2;

/// Extra depth range around the fitted slice, as a factor of its length
const DEPTH_PADDING: f32 = 1.2;

/// Far distance of each cascade over `[near, far]`, front to back
///
/// Computed back to front: the last cascade ends at `far` and each nearer one
/// keeps [`CASCADE_SPLIT`] of what remains in front of it.
pub fn cascade_distances(near: f32, far: f32, count: u32) -> Vec<f32> {
    let count = count.max(1) as usize;
    let mut distances = vec![0.0; count];
    let mut distance = far;
    for slot in distances.iter_mut().rev() {
        *slot = distance;
        distance = near + (distance - near) * CASCADE_SPLIT;
    }
    distances
}

pub struct Cascade {
    /// View distance this cascade ends at
    pub far_distance: f32,
    pub view: Mat4,
    pub projection: Mat4,
    /// Point the light looks from
    pub eye: Vec3,
    frame_buffer: Arc<dyn FrameBuffer>,
}

impl Cascade {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frame_buffer(&self) -> &Arc<dyn FrameBuffer> {
        &self.frame_buffer
    }
}

pub struct Shadow {
    cascades: Vec<Cascade>,
    map_size: u32,
    queue: RenderDataManager,
}

impl Shadow {
    /// Create `cascade_count` depth-only maps of `map_size`² texels
    ///
    /// # Errors
    ///
    /// Returns the renderer's error if a frame buffer cannot be created.
    pub fn new(renderer: &mut dyn Renderer, name: &str, cascade_count: u32, map_size: u32) -> Result<Self> {
        let map_size = map_size.max(1);
        let mut cascades = Vec::with_capacity(cascade_count.max(1) as usize);
        for index in 0..cascade_count.max(1) {
            let desc = FrameBufferDesc {
                name: format!("{}.cascade{}", name, index),
                width: map_size,
                height: map_size,
                color_formats: Vec::new(),
                depth_format: Some(TextureFormat::D32_FLOAT),
            };
            cascades.push(Cascade {
                far_distance: 0.0,
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
                eye: Vec3::ZERO,
                frame_buffer: renderer.create_frame_buffer(&desc)?,
            });
        }

        let mut queue = RenderDataManager::new();
        queue.set_depth_pass(true);
        queue.set_collect_lights(false);

        crate::engine_debug!("nova3d::Shadow",
            "Created shadow '{}' ({} cascades, {}x{})", name, cascades.len(), map_size, map_size);
        Ok(Self { cascades, map_size, queue })
    }

    pub fn cascade_count(&self) -> u32 {
        self.cascades.len() as u32
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    pub fn distances(&self) -> Vec<f32> {
        self.cascades.iter().map(|c| c.far_distance).collect()
    }

    pub fn matrices(&self) -> Vec<Mat4> {
        self.cascades.iter().map(|c| c.view_projection()).collect()
    }

    pub fn depth_maps(&self) -> Vec<Arc<dyn Texture>> {
        self.cascades
            .iter()
            .filter_map(|c| c.frame_buffer.depth_attachment())
            .collect()
    }

    /// Fit every cascade to its slice of `camera`'s view volume, seen from a
    /// light placed by `light_world`
    pub fn update(&mut self, camera: &Camera, light_world: &Mat4) {
        let (near, far) = (camera.near(), camera.far());
        let distances = cascade_distances(near, far, self.cascade_count());
        let direction = Light::direction(light_world);
        let up = if direction.dot(Vec3::Y).abs() > 0.99 { Vec3::Z } else { Vec3::Y };

        let mut start = near;
        for (cascade, &end) in self.cascades.iter_mut().zip(&distances) {
            let corners = camera.frustum_corners(start, end);
            let centroid = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
            let radius = corners
                .iter()
                .map(|c| c.distance(centroid))
                .fold(0.0f32, f32::max)
                .max(f32::EPSILON);

            let eye = centroid - direction * radius;
            let view = Mat4::look_at_rh(eye, centroid, up);

            let mut min = Vec3::splat(f32::MAX);
            let mut max = Vec3::splat(f32::MIN);
            for corner in &corners {
                let p = view.transform_point3(*corner);
                min = min.min(p);
                max = max.max(p);
            }
            // light space looks down -Z
            let (z_near, z_far) = (-max.z, -min.z);
            let padding = (z_far - z_near) * (DEPTH_PADDING - 1.0) * 0.5;

            cascade.far_distance = end;
            cascade.eye = eye;
            cascade.view = view;
            cascade.projection = Mat4::orthographic_rh_gl(
                min.x, max.x, min.y, max.y, z_near - padding, z_far + padding,
            );
            start = end;
        }
    }

    /// Rasterize the scene's opaque geometry into every cascade
    ///
    /// # Returns
    ///
    /// Number of draw calls issued over all cascades
    ///
    /// # Errors
    ///
    /// Returns the first traversal or draw error; the previously bound frame
    /// buffer is restored either way.
    pub fn draw(&mut self, renderer: &mut dyn Renderer, scene: &Scene, depth_material: &Arc<Material>) -> Result<u32> {
        let previous = renderer.current_frame_buffer();
        let result = self.draw_cascades(renderer, scene, depth_material);
        renderer.bind_frame_buffer(previous);
        result
    }

    fn draw_cascades(&mut self, renderer: &mut dyn Renderer, scene: &Scene, depth_material: &Arc<Material>) -> Result<u32> {
        let options = SubmitOptions { override_material: Some(depth_material), depth_equal: false };
        let mut casters = 0;
        for cascade in &self.cascades {
            renderer.bind_frame_buffer(Some(Arc::clone(&cascade.frame_buffer)));
            renderer.set_viewport(Viewport::full(self.map_size, self.map_size));
            renderer.clear(ClearFlags::DEPTH, [0.0; 4], 1.0, 0);

            self.queue.fill_view(renderer, scene, cascade.view_projection(), cascade.eye);
            self.queue.sort();
            let calls = self.queue.render_data(RenderLayer::Opaque);
            let frame = FrameParams::from_matrices(cascade.view, cascade.projection, cascade.eye);
            submit_draw_calls(renderer, calls, &frame, &options)?;
            casters += calls.len() as u32;
        }
        Ok(casters)
    }
}
