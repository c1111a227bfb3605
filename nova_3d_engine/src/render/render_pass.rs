/// Render stages: the steps a RenderPath runs each frame.
///
/// A [`RenderStage`] is anything that can (re)allocate its targets on resize
/// and render once per frame. [`RenderPass`] is the data-driven stage:
/// destination buffer, named inputs, what to draw and how. A
/// [`RenderStageGroup`] runs several stages as one.

use std::sync::Arc;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::renderer::{ClearFlags, FrameBuffer, Renderer, TextureFormat, UniformValue, Viewport};
use crate::render::draw_call::{DrawCall, DrawSource, RenderLayer};
use crate::render::frame_buffer_pool::FrameBufferPool;
use crate::render::frame_params::FrameParams;
use crate::render::render_queue::RenderDataManager;
use crate::render::submit::{submit_draw_call, SubmitOptions};
use crate::resource::{Material, Mesh};

// ============================================================================
// Contexts
// ============================================================================

/// What a stage gets when the render resolution changes
pub struct ResizeContext<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub pool: &'a mut FrameBufferPool,
    pub width: u32,
    pub height: u32,
}

/// What a stage gets to render one frame
pub struct StageContext<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub pool: &'a FrameBufferPool,
    pub data: &'a RenderDataManager,
    pub frame: &'a FrameParams,
    /// Camera viewport, if the camera restricts drawing to part of the screen
    pub camera_viewport: Option<Viewport>,
}

impl StageContext<'_> {
    /// Window-sized viewport
    pub fn screen_viewport(&self) -> Viewport {
        let (width, height) = self.renderer.window_size();
        Viewport::full(width, height)
    }
}

/// A frame buffer a stage produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub name: String,
    pub color_count: usize,
    pub has_depth: bool,
}

// ============================================================================
// RenderStage trait
// ============================================================================

/// One step of a RenderPath
pub trait RenderStage: Send + Sync {
    fn name(&self) -> &str;

    /// Allocate size-dependent resources; called on every resolution change
    fn on_resize(&mut self, ctx: &mut ResizeContext<'_>) -> Result<()>;

    /// Render one frame
    fn render(&mut self, ctx: &mut StageContext<'_>) -> Result<()>;

    /// True when the stage presents to the real back buffer
    fn draws_to_screen(&self) -> bool {
        false
    }

    /// Pool names this stage reads: `"<buffer>.<attachment>"` for textures,
    /// a bare name for a frame buffer it draws into
    fn inputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Frame buffers this stage allocates
    fn outputs(&self) -> Vec<StageOutput> {
        Vec::new()
    }
}

// ============================================================================
// RenderPass description
// ============================================================================

/// Where a pass draws
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Whatever is bound when the pass runs
    Current,
    /// A pool frame buffer this pass allocates at `scale` x window size
    Create {
        name: String,
        scale: f32,
        color_formats: Vec<TextureFormat>,
        depth_format: Option<TextureFormat>,
    },
    /// A pool frame buffer allocated by an earlier stage or registered externally
    Existing(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawType {
    /// One quad covering the target, drawn with the override material
    FullScreenQuad,
    /// Queued draw calls of these layers, in order
    Layers(Vec<RenderLayer>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearDesc {
    pub flags: ClearFlags,
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl ClearDesc {
    pub fn new(flags: ClearFlags) -> Self {
        Self { flags, color: [0.0, 0.0, 0.0, 1.0], depth: 1.0, stencil: 0 }
    }
}

/// Builder-style description of a [`RenderPass`]
#[derive(Clone)]
pub struct RenderPassDesc {
    pub name: String,
    pub destination: Destination,
    /// (material parameter, pool texture name)
    pub inputs: Vec<(String, String)>,
    pub draw_type: DrawType,
    pub clear: Option<ClearDesc>,
    /// Draw with EQUAL depth testing and no depth writes (after a depth pre-pass)
    pub depth_equal: bool,
    pub use_lights: bool,
    pub override_material: Option<Arc<Material>>,
    /// Present to the back buffer, in the camera viewport
    pub draw_to_screen: bool,
    /// Use the whole window as viewport
    pub use_screen_viewport: bool,
}

impl RenderPassDesc {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            destination: Destination::Current,
            inputs: Vec::new(),
            draw_type: DrawType::Layers(vec![RenderLayer::Opaque]),
            clear: None,
            depth_equal: false,
            use_lights: false,
            override_material: None,
            draw_to_screen: false,
            use_screen_viewport: false,
        }
    }

    /// Allocate and draw into pool buffer `name`
    pub fn with_destination(
        mut self,
        name: &str,
        scale: f32,
        color_formats: &[TextureFormat],
        depth_format: Option<TextureFormat>,
    ) -> Self {
        self.destination = Destination::Create {
            name: name.to_string(),
            scale,
            color_formats: color_formats.to_vec(),
            depth_format,
        };
        self
    }

    /// Draw into pool buffer `name` allocated elsewhere
    pub fn with_existing_destination(mut self, name: &str) -> Self {
        self.destination = Destination::Existing(name.to_string());
        self
    }

    /// Bind pool texture `texture` to material parameter `param`
    pub fn with_input(mut self, param: &str, texture: &str) -> Self {
        self.inputs.push((param.to_string(), texture.to_string()));
        self
    }

    pub fn with_layers(mut self, layers: &[RenderLayer]) -> Self {
        self.draw_type = DrawType::Layers(layers.to_vec());
        self
    }

    /// Draw one full-screen quad with `material`
    pub fn with_full_screen_quad(mut self, material: Arc<Material>) -> Self {
        self.draw_type = DrawType::FullScreenQuad;
        self.override_material = Some(material);
        self
    }

    /// Draw queued layers with `material` instead of each call's own
    pub fn with_override_material(mut self, material: Arc<Material>) -> Self {
        self.override_material = Some(material);
        self
    }

    pub fn with_clear(mut self, clear: ClearDesc) -> Self {
        self.clear = Some(clear);
        self
    }

    pub fn with_depth_equal(mut self) -> Self {
        self.depth_equal = true;
        self
    }

    pub fn with_lights(mut self) -> Self {
        self.use_lights = true;
        self
    }

    pub fn to_screen(mut self) -> Self {
        self.draw_to_screen = true;
        self
    }

    pub fn with_screen_viewport(mut self) -> Self {
        self.use_screen_viewport = true;
        self
    }
}

// ============================================================================
// RenderPass
// ============================================================================

/// Data-driven stage: one pass over layers or one full-screen quad
pub struct RenderPass {
    desc: RenderPassDesc,
    destination: Option<Arc<dyn FrameBuffer>>,
    quad: Option<Mesh>,
}

impl RenderPass {
    pub fn new(desc: RenderPassDesc) -> Self {
        let quad = match desc.draw_type {
            DrawType::FullScreenQuad => Some(Mesh::create_full_screen_quad()),
            DrawType::Layers(_) => None,
        };
        Self { desc, destination: None, quad }
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    /// Frame buffer drawn into, once resolved by a resize
    pub fn destination(&self) -> Option<&Arc<dyn FrameBuffer>> {
        self.destination.as_ref()
    }

    fn viewport(&self, ctx: &StageContext<'_>) -> Viewport {
        if let Some(destination) = &self.destination {
            return Viewport::full(destination.width(), destination.height());
        }
        if self.desc.use_screen_viewport {
            return ctx.screen_viewport();
        }
        if self.desc.draw_to_screen {
            return ctx.camera_viewport.unwrap_or_else(|| ctx.screen_viewport());
        }
        match ctx.renderer.current_frame_buffer() {
            Some(bound) => Viewport::full(bound.width(), bound.height()),
            None => ctx.screen_viewport(),
        }
    }

    /// Bind the named pool textures on the materials this pass draws with
    fn bind_inputs(&self, ctx: &StageContext<'_>) -> Result<()> {
        if self.desc.inputs.is_empty() {
            return Ok(());
        }
        let mut textures = Vec::with_capacity(self.desc.inputs.len());
        for (param, name) in &self.desc.inputs {
            textures.push((param, ctx.pool.texture(name)?));
        }

        let mut targets: Vec<&Arc<Material>> = Vec::new();
        match (&self.desc.override_material, &self.desc.draw_type) {
            (Some(material), _) => targets.push(material),
            (None, DrawType::Layers(layers)) => {
                let mut seen = FxHashSet::default();
                for &layer in layers {
                    for call in ctx.data.render_data(layer) {
                        if seen.insert(call.material.id()) {
                            targets.push(&call.material);
                        }
                    }
                }
            }
            (None, DrawType::FullScreenQuad) => {}
        }

        for material in targets {
            for (param, texture) in &textures {
                material.set_parameter(param, UniformValue::Sampler(Arc::clone(texture)));
            }
        }
        Ok(())
    }

    fn render_bound(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let viewport = self.viewport(ctx);
        ctx.renderer.set_viewport(viewport);
        if let Some(clear) = &self.desc.clear {
            ctx.renderer.clear(clear.flags, clear.color, clear.depth, clear.stencil);
        }
        self.bind_inputs(ctx)?;
        self.draw(ctx)
    }

    fn draw(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let lightless;
        let frame = if self.desc.use_lights {
            ctx.frame
        } else {
            lightless = ctx.frame.without_lights();
            &lightless
        };

        match &self.desc.draw_type {
            DrawType::FullScreenQuad => {
                let (Some(quad), Some(material)) = (&self.quad, &self.desc.override_material) else {
                    crate::engine_warn!("nova3d::RenderPass",
                        "Pass '{}' draws a full-screen quad without a material", self.desc.name);
                    return Ok(());
                };
                let Some(command) = quad.prepare(ctx.renderer)? else {
                    return Ok(());
                };
                let call = DrawCall {
                    command,
                    material: Arc::clone(material),
                    source: DrawSource::detached(glam::Mat4::IDENTITY, RenderLayer::Overlay),
                    distance_to_camera: 0.0,
                };
                submit_draw_call(ctx.renderer, &call, frame, &SubmitOptions::default())
            }
            DrawType::Layers(layers) => {
                let options = SubmitOptions {
                    override_material: self.desc.override_material.as_ref(),
                    depth_equal: self.desc.depth_equal,
                };
                for &layer in layers {
                    for call in ctx.data.render_data(layer) {
                        submit_draw_call(ctx.renderer, call, frame, &options)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl RenderStage for RenderPass {
    fn name(&self) -> &str {
        &self.desc.name
    }

    fn on_resize(&mut self, ctx: &mut ResizeContext<'_>) -> Result<()> {
        self.destination = match &self.desc.destination {
            Destination::Current => None,
            Destination::Create { name, scale, color_formats, depth_format } => {
                let width = (ctx.width as f32 * scale).round() as u32;
                let height = (ctx.height as f32 * scale).round() as u32;
                Some(ctx.pool.allocate(ctx.renderer, name, width, height, color_formats, *depth_format)?)
            }
            Destination::Existing(name) => Some(ctx.pool.frame_buffer(name)?),
        };
        Ok(())
    }

    /// Bind the destination, set the viewport, clear, bind inputs and draw;
    /// the previous frame buffer is bound again afterwards, also on failure
    fn render(&mut self, ctx: &mut StageContext<'_>) -> Result<()> {
        let previous = self
            .destination
            .as_ref()
            .map(|fb| ctx.renderer.bind_frame_buffer(Some(Arc::clone(fb))));

        let result = self.render_bound(ctx);

        if let Some(previous) = previous {
            ctx.renderer.bind_frame_buffer(previous);
        }
        result
    }

    fn draws_to_screen(&self) -> bool {
        self.desc.draw_to_screen
    }

    fn inputs(&self) -> Vec<String> {
        let mut inputs: Vec<String> = self.desc.inputs.iter().map(|(_, name)| name.clone()).collect();
        if let Destination::Existing(name) = &self.desc.destination {
            inputs.push(name.clone());
        }
        inputs
    }

    fn outputs(&self) -> Vec<StageOutput> {
        match &self.desc.destination {
            Destination::Create { name, color_formats, depth_format, .. } => vec![StageOutput {
                name: name.clone(),
                color_count: color_formats.len(),
                has_depth: depth_format.is_some(),
            }],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// RenderStageGroup
// ============================================================================

/// Stages run in order as one stage (post-processing chains)
pub struct RenderStageGroup {
    name: String,
    stages: Vec<Box<dyn RenderStage>>,
}

impl RenderStageGroup {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: Box<dyn RenderStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_stage(&mut self, stage: Box<dyn RenderStage>) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Box<dyn RenderStage>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl RenderStage for RenderStageGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_resize(&mut self, ctx: &mut ResizeContext<'_>) -> Result<()> {
        for stage in &mut self.stages {
            stage.on_resize(ctx)?;
        }
        Ok(())
    }

    fn render(&mut self, ctx: &mut StageContext<'_>) -> Result<()> {
        for stage in &mut self.stages {
            stage.render(ctx)?;
        }
        Ok(())
    }

    fn draws_to_screen(&self) -> bool {
        self.stages.iter().any(|s| s.draws_to_screen())
    }

    /// Inputs not produced inside the group
    fn inputs(&self) -> Vec<String> {
        let mut produced: Vec<StageOutput> = Vec::new();
        let mut inputs = Vec::new();
        for stage in &self.stages {
            for input in stage.inputs() {
                let (buffer, _) = crate::render::frame_buffer_pool::parse_texture_name(&input);
                if !produced.iter().any(|o| o.name == buffer) {
                    inputs.push(input);
                }
            }
            produced.extend(stage.outputs());
        }
        inputs
    }

    fn outputs(&self) -> Vec<StageOutput> {
        self.stages.iter().flat_map(|s| s.outputs()).collect()
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
