/// RenderPath: the root of a frame.
///
/// Owns the stage list, the frame buffer pool, the render data manager and
/// the shadow cache. Each frame it fills and sorts the render queues, rebuilds
/// shadows, then runs every stage in order.

use std::sync::{Arc, Mutex};
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::engine_err;
use crate::error::Result;
use crate::renderer::{
    ClearFlags, FrameBuffer, Renderer, ShaderProgramDesc, TextureFormat, Viewport,
};
use crate::render::draw_call::RenderLayer;
use crate::render::frame_buffer_pool::{parse_texture_name, Attachment, FrameBufferPool};
use crate::render::frame_params::FrameParams;
use crate::render::render_pass::{
    ClearDesc, RenderPass, RenderPassDesc, RenderStage, RenderStageGroup, ResizeContext, StageContext,
};
use crate::render::render_queue::RenderDataManager;
use crate::resource::{AutoBinding, Material, ShaderCache};
use crate::scene::{Camera, Drawable, Scene, DEFAULT_CASCADE_COUNT, DEFAULT_SHADOW_MAP_SIZE};
use crate::shadow::ShadowCache;

const HDR_FORMAT: TextureFormat = TextureFormat::R16G16B16A16_SFLOAT;
const DEPTH_FORMAT: TextureFormat = TextureFormat::D24_UNORM_S8_UINT;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStyle {
    #[default]
    Forward,
    Deferred,
}

/// Shader programs of the built-in stages
#[derive(Debug, Clone)]
pub struct ShaderPaths {
    /// Copies a texture to the screen
    pub present: ShaderProgramDesc,
    /// Position-only shader for depth pre-pass and shadow maps
    pub depth: ShaderProgramDesc,
    pub deferred_gbuffer: ShaderProgramDesc,
    pub deferred_lighting: ShaderProgramDesc,
    pub tone_map: ShaderProgramDesc,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            present: ShaderProgramDesc::new("shaders/present.vert", "shaders/present.frag"),
            depth: ShaderProgramDesc::new("shaders/depth.vert", "shaders/depth.frag"),
            deferred_gbuffer: ShaderProgramDesc::new("shaders/gbuffer.vert", "shaders/gbuffer.frag"),
            deferred_lighting: ShaderProgramDesc::new("shaders/present.vert", "shaders/lighting.frag"),
            tone_map: ShaderProgramDesc::new("shaders/present.vert", "shaders/tone_map.frag"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderPathConfig {
    pub style: PipelineStyle,
    pub shadows_enabled: bool,
    /// Upper bound on the cascades of a shadowed light
    pub cascade_count: u32,
    /// Upper bound on a shadow map's edge length
    pub shadow_map_size: u32,
    pub frustum_culling: bool,
    /// Lay down depth first, then shade opaque geometry with EQUAL depth testing
    pub depth_prepass: bool,
    pub wireframe: bool,
    pub shaders: ShaderPaths,
}

impl Default for RenderPathConfig {
    fn default() -> Self {
        Self {
            style: PipelineStyle::Forward,
            shadows_enabled: true,
            cascade_count: DEFAULT_CASCADE_COUNT,
            shadow_map_size: DEFAULT_SHADOW_MAP_SIZE,
            frustum_culling: true,
            depth_prepass: false,
            wireframe: false,
            shaders: ShaderPaths::default(),
        }
    }
}

/// What one frame cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw commands issued, shadow passes included
    pub draw_calls: u32,
    pub instanced_draws: u32,
    /// Drawables rejected by frustum culling
    pub culled: u32,
    /// Draw calls issued into shadow maps
    pub shadow_casters: u32,
    /// Drawables left out because drawing them failed
    pub skipped: u32,
}

// ============================================================================
// RenderPath
// ============================================================================

pub struct RenderPath {
    config: RenderPathConfig,
    stages: Vec<Box<dyn RenderStage>>,
    pool: FrameBufferPool,
    data: RenderDataManager,
    shadows: ShadowCache,
    shader_cache: ShaderCache,
    depth_material: Option<Arc<Material>>,
    /// Resolution the pool was last built for
    size: Option<(u32, u32)>,
    root_frame_buffer: Option<Arc<dyn FrameBuffer>>,
}

impl RenderPath {
    pub fn new(config: RenderPathConfig) -> Self {
        let mut data = RenderDataManager::new();
        data.set_frustum_culling(config.frustum_culling);
        data.set_wireframe(config.wireframe);
        let shadows = ShadowCache::new().with_limits(config.cascade_count, config.shadow_map_size);
        Self {
            config,
            stages: Vec::new(),
            pool: FrameBufferPool::new(),
            data,
            shadows,
            shader_cache: ShaderCache::new(),
            depth_material: None,
            size: None,
            root_frame_buffer: None,
        }
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &RenderPathConfig {
        &self.config
    }

    pub fn stages(&self) -> &[Box<dyn RenderStage>] {
        &self.stages
    }

    pub fn pool(&self) -> &FrameBufferPool {
        &self.pool
    }

    pub fn render_data(&self) -> &RenderDataManager {
        &self.data
    }

    pub fn shadows(&self) -> &ShadowCache {
        &self.shadows
    }

    pub fn shader_cache(&mut self) -> &mut ShaderCache {
        &mut self.shader_cache
    }

    /// Frame buffers created by stages since this path was built
    pub fn allocation_count(&self) -> u32 {
        self.pool.allocation_count()
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.config.shadows_enabled = enabled;
        if !enabled {
            self.shadows.clear();
        }
    }

    /// Frame buffer bound while stages render (None = back buffer)
    pub fn set_root_frame_buffer(&mut self, frame_buffer: Option<Arc<dyn FrameBuffer>>) {
        self.root_frame_buffer = frame_buffer;
    }

    /// Publish a frame buffer created outside the path; survives resizes
    pub fn add_frame_buffer(&mut self, name: &str, frame_buffer: Arc<dyn FrameBuffer>) {
        self.pool.register(name, frame_buffer);
    }

    // ===== STAGES =====

    /// Replace the stage list
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the current stages in place, if a stage
    /// reads a buffer nothing produces before it.
    pub fn set_stages(&mut self, stages: Vec<Box<dyn RenderStage>>) -> Result<()> {
        validate_stages(&stages, &self.pool)?;
        self.stages = stages;
        self.size = None;
        Ok(())
    }

    /// Drop the stages; the next frame builds the default ones of `style`
    pub fn set_pipeline_style(&mut self, style: PipelineStyle) {
        self.config.style = style;
        self.stages.clear();
        self.size = None;
    }

    /// Check that every stage input is produced earlier or registered
    ///
    /// # Errors
    ///
    /// Returns a descriptive error for the first unresolved input.
    pub fn validate(&self) -> Result<()> {
        validate_stages(&self.stages, &self.pool)
    }

    fn material(&mut self, renderer: &mut dyn Renderer, name: &str, desc: &ShaderProgramDesc) -> Result<Arc<Material>> {
        Ok(Arc::new(Material::from_shaders(name, renderer, &mut self.shader_cache, desc)?))
    }

    fn depth_material(&mut self, renderer: &mut dyn Renderer) -> Result<Arc<Material>> {
        if let Some(material) = &self.depth_material {
            return Ok(Arc::clone(material));
        }
        let desc = self.config.shaders.depth.clone();
        let material = self.material(renderer, "depth", &desc)?;
        material.set_auto_binding("u_worldViewProjectionMatrix", AutoBinding::WorldViewProjection);
        self.depth_material = Some(Arc::clone(&material));
        Ok(material)
    }

    fn present_stage(&mut self, renderer: &mut dyn Renderer, input: &str) -> Result<RenderPass> {
        let desc = self.config.shaders.present.clone();
        let present = self.material(renderer, "present", &desc)?;
        Ok(RenderPass::new(
            RenderPassDesc::new("present")
                .with_full_screen_quad(present)
                .with_input("u_texture", input)
                .to_screen(),
        ))
    }

    /// Custom, transparent and overlay layers drawn over "main"
    fn rest_stage() -> RenderPass {
        RenderPass::new(
            RenderPassDesc::new("rest")
                .with_existing_destination("main")
                .with_layers(&[RenderLayer::Custom, RenderLayer::Transparent, RenderLayer::Overlay])
                .with_lights(),
        )
    }

    /// Forward stages: [depth pre-pass], opaque, rest, present
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in shader fails to compile.
    pub fn init_forward(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let mut stages: Vec<Box<dyn RenderStage>> = Vec::new();
        let clear = ClearDesc::new(ClearFlags::COLOR_DEPTH);

        let opaque = if self.config.depth_prepass {
            let depth = self.depth_material(renderer)?;
            stages.push(Box::new(RenderPass::new(
                RenderPassDesc::new("depth")
                    .with_destination("main", 1.0, &[HDR_FORMAT], Some(DEPTH_FORMAT))
                    .with_clear(clear)
                    .with_override_material(depth),
            )));
            RenderPassDesc::new("opaque").with_existing_destination("main").with_depth_equal()
        } else {
            RenderPassDesc::new("opaque")
                .with_destination("main", 1.0, &[HDR_FORMAT], Some(DEPTH_FORMAT))
                .with_clear(clear)
        };
        stages.push(Box::new(RenderPass::new(opaque.with_lights())));
        stages.push(Box::new(Self::rest_stage()));
        stages.push(Box::new(self.present_stage(renderer, "main.0")?));

        self.config.style = PipelineStyle::Forward;
        self.set_stages(stages)
    }

    /// Deferred stages: g-buffer, lighting, rest, post (tone map + present)
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in shader fails to compile.
    pub fn init_deferred(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let shaders = self.config.shaders.clone();
        let gbuffer = self.material(renderer, "gbuffer", &shaders.deferred_gbuffer)?;
        let lighting = self.material(renderer, "lighting", &shaders.deferred_lighting)?;
        let tone_map = self.material(renderer, "tone_map", &shaders.tone_map)?;
        let clear = ClearDesc::new(ClearFlags::COLOR_DEPTH);

        let stages: Vec<Box<dyn RenderStage>> = vec![
            Box::new(RenderPass::new(
                RenderPassDesc::new("gbuffer")
                    .with_destination(
                        "gbuffer",
                        1.0,
                        &[HDR_FORMAT, HDR_FORMAT, TextureFormat::R8G8B8A8_UNORM],
                        Some(DEPTH_FORMAT),
                    )
                    .with_clear(clear)
                    .with_override_material(gbuffer),
            )),
            Box::new(RenderPass::new(
                RenderPassDesc::new("lighting")
                    .with_destination("main", 1.0, &[HDR_FORMAT], Some(DEPTH_FORMAT))
                    .with_clear(clear)
                    .with_full_screen_quad(lighting)
                    .with_input("u_position", "gbuffer.0")
                    .with_input("u_normal", "gbuffer.1")
                    .with_input("u_albedo", "gbuffer.2")
                    .with_lights(),
            )),
            Box::new(Self::rest_stage()),
            Box::new(
                RenderStageGroup::new("post")
                    .with_stage(Box::new(RenderPass::new(
                        RenderPassDesc::new("tone_map")
                            .with_destination("post", 1.0, &[TextureFormat::R8G8B8A8_UNORM], None)
                            .with_full_screen_quad(tone_map)
                            .with_input("u_texture", "main.0"),
                    )))
                    .with_stage(Box::new(self.present_stage(renderer, "post.0")?)),
            ),
        ];

        self.config.style = PipelineStyle::Deferred;
        self.set_stages(stages)
    }

    // ===== RESIZE =====

    /// Rebuild the pool and every stage's buffers for a new resolution;
    /// nothing happens when the resolution is unchanged
    ///
    /// # Errors
    ///
    /// Returns the first stage allocation error. The path resizes again on
    /// the next call in that case.
    pub fn on_resize(&mut self, renderer: &mut dyn Renderer, width: u32, height: u32) -> Result<()> {
        if self.size == Some((width, height)) {
            return Ok(());
        }
        self.size = None;
        self.pool.release();

        let mut ctx = ResizeContext { renderer, pool: &mut self.pool, width, height };
        for stage in &mut self.stages {
            stage.on_resize(&mut ctx)?;
        }

        crate::engine_debug!("nova3d::RenderPath",
            "Resized to {}x{} ({} stages, {} frame buffers)", width, height, self.stages.len(), self.pool.len());
        self.size = Some((width, height));
        Ok(())
    }

    // ===== FRAME =====

    /// Build the default stages if there are none and follow the window size
    fn prepare(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        if self.stages.is_empty() {
            match self.config.style {
                PipelineStyle::Forward => self.init_forward(renderer)?,
                PipelineStyle::Deferred => self.init_deferred(renderer)?,
            }
        }
        let (width, height) = renderer.window_size();
        self.on_resize(renderer, width, height)
    }

    /// Bind the root frame buffer and run every stage; stages that present
    /// to the screen get the previously bound frame buffer back first
    fn run_stages(
        &mut self,
        renderer: &mut dyn Renderer,
        frame: &FrameParams,
        camera_viewport: Option<Viewport>,
    ) -> Result<()> {
        let previous = renderer.bind_frame_buffer(self.root_frame_buffer.clone());

        let mut result = Ok(());
        for stage in &mut self.stages {
            if stage.draws_to_screen() {
                renderer.bind_frame_buffer(previous.clone());
            }
            let mut ctx = StageContext {
                renderer: &mut *renderer,
                pool: &self.pool,
                data: &self.data,
                frame,
                camera_viewport,
            };
            result = stage.render(&mut ctx);
            if result.is_err() {
                break;
            }
        }

        renderer.bind_frame_buffer(previous);
        result
    }

    fn frame_stats(&self, renderer: &dyn Renderer, before: crate::renderer::RendererStats, shadow_casters: u32) -> FrameStats {
        let after = renderer.stats();
        FrameStats {
            draw_calls: after.draw_calls.saturating_sub(before.draw_calls),
            instanced_draws: after.instanced_draw_calls.saturating_sub(before.instanced_draw_calls),
            culled: self.data.stats().culled,
            shadow_casters,
            skipped: self.data.stats().skipped,
        }
    }

    /// Render one frame of `scene` seen from `camera`
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer lock is poisoned, a built-in shader
    /// fails to compile, or a shadow or stage step fails. Drawables that fail
    /// to draw are skipped and counted in [`FrameStats::skipped`].
    pub fn render(
        &mut self,
        renderer: &Arc<Mutex<dyn Renderer>>,
        scene: &Scene,
        camera: &Camera,
    ) -> Result<FrameStats> {
        let mut guard = renderer
            .lock()
            .map_err(|_| engine_err!("nova3d::RenderPath", "Renderer lock poisoned"))?;
        let renderer: &mut dyn Renderer = &mut *guard;
        let before = renderer.stats();

        self.prepare(renderer)?;
        self.data.fill(renderer, scene, camera);
        self.data.sort();

        let mut frame = FrameParams::from_camera(camera);
        frame.lights = self.data.light_params();

        let mut shadow_casters = 0;
        if self.config.shadows_enabled {
            let depth = self.depth_material(renderer)?;
            shadow_casters = self.shadows.update(renderer, scene, camera, self.data.lights(), &depth)?;
            self.shadows.apply_to_frame(&mut frame);
        }

        self.run_stages(renderer, &frame, camera.viewport())?;
        Ok(self.frame_stats(renderer, before, shadow_casters))
    }

    /// Render explicit (drawable, world matrix) pairs through the stages,
    /// without lights or shadows
    ///
    /// # Errors
    ///
    /// Same as [`render`](Self::render).
    pub fn render_drawables(
        &mut self,
        renderer: &Arc<Mutex<dyn Renderer>>,
        drawables: &[(Arc<Drawable>, Mat4)],
        camera: &Camera,
    ) -> Result<FrameStats> {
        let mut guard = renderer
            .lock()
            .map_err(|_| engine_err!("nova3d::RenderPath", "Renderer lock poisoned"))?;
        let renderer: &mut dyn Renderer = &mut *guard;
        let before = renderer.stats();

        self.prepare(renderer)?;
        self.data.fill_drawables(renderer, drawables, camera);
        self.data.sort();

        let frame = FrameParams::from_camera(camera);
        self.run_stages(renderer, &frame, camera.viewport())?;
        Ok(self.frame_stats(renderer, before, 0))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Attachments a known frame buffer provides
#[derive(Clone, Copy)]
struct Produced {
    color_count: usize,
    has_depth: bool,
}

fn validate_stages(stages: &[Box<dyn RenderStage>], pool: &FrameBufferPool) -> Result<()> {
    let mut produced: FxHashMap<String, Produced> = pool
        .externals()
        .map(|(name, fb)| {
            let entry = Produced {
                color_count: fb.color_attachment_count(),
                has_depth: fb.depth_attachment().is_some(),
            };
            (name.to_string(), entry)
        })
        .collect();

    for stage in stages {
        for input in stage.inputs() {
            let (buffer, attachment) = parse_texture_name(&input);
            let Some(entry) = produced.get(buffer) else {
                return Err(engine_err!("nova3d::RenderPath",
                    "Stage '{}' reads '{}' but no earlier stage or external buffer provides '{}'",
                    stage.name(), input, buffer));
            };
            let available = match attachment {
                Some(Attachment::Color(index)) => index < entry.color_count,
                Some(Attachment::Depth) => entry.has_depth,
                None => true,
            };
            if !available {
                return Err(engine_err!("nova3d::RenderPath",
                    "Stage '{}' reads '{}' but '{}' has {} color attachment(s){}",
                    stage.name(), input, buffer, entry.color_count,
                    if entry.has_depth { " and depth" } else { " and no depth" }));
            }
        }
        for output in stage.outputs() {
            produced.insert(
                output.name,
                Produced { color_count: output.color_count, has_depth: output.has_depth },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "render_path_tests.rs"]
mod tests;
