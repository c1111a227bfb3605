//! Integration tests rendering whole frames through the public API
//!
//! A headless renderer stands in for a GPU backend: it keeps buffers in memory
//! and only counts what it is asked to draw.
//!
//! Run with: cargo test --test frame_integration_tests

use std::sync::{Arc, Mutex};

use nova_3d_engine::glam::{Mat4, Vec3};
use nova_3d_engine::nova3d::gpu::{
    Buffer, BufferDesc, BufferUsage, ClearFlags, DrawCommand, FrameBuffer, FrameBufferDesc,
    RendererStats, ShaderProgram, ShaderProgramDesc, StateBlock, Texture, TextureDesc, TextureFormat,
    TextureInfo, TextureUsage, UniformValue, VertexBinding, VertexFormat, Viewport,
};
use nova_3d_engine::nova3d::log::{LogEntry, LogSeverity, Logger};
use nova_3d_engine::nova3d::resource::{AutoBinding, Material, Mesh};
use nova_3d_engine::nova3d::scene::{Camera, Drawable, Light, Model, Scene};
use nova_3d_engine::nova3d::render::{RenderPass, RenderPassDesc, RenderStage};
use nova_3d_engine::nova3d::{
    Engine, PipelineStyle, Renderer, RenderPath, RenderPathConfig, Result,
};
use serial_test::serial;

// ============================================================================
// HEADLESS RENDERER
// ============================================================================

struct HeadlessBuffer {
    data: Mutex<Vec<u8>>,
    usage: BufferUsage,
}

impl Buffer for HeadlessBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        let start = offset as usize;
        storage[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }
}

#[derive(Debug)]
struct HeadlessTexture(TextureInfo);

impl Texture for HeadlessTexture {
    fn info(&self) -> &TextureInfo {
        &self.0
    }
}

#[derive(Debug)]
struct HeadlessProgram(String);

impl ShaderProgram for HeadlessProgram {
    fn label(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct HeadlessBinding(u32);

impl VertexBinding for HeadlessBinding {
    fn stride(&self) -> u32 {
        self.0
    }
}

struct HeadlessFrameBuffer {
    name: String,
    width: u32,
    height: u32,
    colors: Vec<Arc<dyn Texture>>,
    depth: Option<Arc<dyn Texture>>,
}

impl FrameBuffer for HeadlessFrameBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn color_attachment_count(&self) -> usize {
        self.colors.len()
    }

    fn color_attachment(&self, index: usize) -> Option<Arc<dyn Texture>> {
        self.colors.get(index).cloned()
    }

    fn depth_attachment(&self) -> Option<Arc<dyn Texture>> {
        self.depth.clone()
    }
}

/// Draw targets in submission order, shared with the test
type DrawLog = Arc<Mutex<Vec<String>>>;

struct HeadlessRenderer {
    bound: Option<Arc<dyn FrameBuffer>>,
    stats: RendererStats,
    draws: DrawLog,
}

impl HeadlessRenderer {
    fn shared() -> (Arc<Mutex<dyn Renderer>>, DrawLog) {
        let draws = DrawLog::default();
        let renderer = HeadlessRenderer { bound: None, stats: RendererStats::default(), draws: draws.clone() };
        (Arc::new(Mutex::new(renderer)), draws)
    }

    fn texture(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Arc<dyn Texture> {
        Arc::new(HeadlessTexture(TextureInfo { width, height, format, usage }))
    }
}

impl Renderer for HeadlessRenderer {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(HeadlessBuffer { data: Mutex::new(vec![0; desc.size as usize]), usage: desc.usage }))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Self::texture(desc.width, desc.height, desc.format, desc.usage))
    }

    fn create_shader_program(&mut self, desc: &ShaderProgramDesc) -> Result<Arc<dyn ShaderProgram>> {
        Ok(Arc::new(HeadlessProgram(format!("{}|{}", desc.vertex, desc.fragment))))
    }

    fn create_vertex_binding(
        &mut self,
        format: &VertexFormat,
        _vertex_buffer: &Arc<dyn Buffer>,
    ) -> Result<Arc<dyn VertexBinding>> {
        Ok(Arc::new(HeadlessBinding(format.vertex_size())))
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Arc<dyn FrameBuffer>> {
        let colors = desc
            .color_formats
            .iter()
            .map(|f| Self::texture(desc.width, desc.height, *f, TextureUsage::SampledAndRenderTarget))
            .collect();
        let depth = desc
            .depth_format
            .map(|f| Self::texture(desc.width, desc.height, f, TextureUsage::DepthStencil));
        Ok(Arc::new(HeadlessFrameBuffer {
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
            colors,
            depth,
        }))
    }

    fn bind_frame_buffer(&mut self, frame_buffer: Option<Arc<dyn FrameBuffer>>) -> Option<Arc<dyn FrameBuffer>> {
        self.stats.frame_buffer_binds += 1;
        std::mem::replace(&mut self.bound, frame_buffer)
    }

    fn current_frame_buffer(&self) -> Option<Arc<dyn FrameBuffer>> {
        self.bound.clone()
    }

    fn set_viewport(&mut self, _viewport: Viewport) {}

    fn clear(&mut self, _flags: ClearFlags, _color: [f32; 4], _depth: f32, _stencil: u32) {}

    fn apply_state(&mut self, _state: &StateBlock) {}

    fn bind_program(&mut self, _program: &Arc<dyn ShaderProgram>) {}

    fn set_uniform(&mut self, _program: &Arc<dyn ShaderProgram>, _name: &str, _value: &UniformValue) -> bool {
        true
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<()> {
        self.stats.draw_calls += 1;
        if command.is_instanced() {
            self.stats.instanced_draw_calls += 1;
        }
        let target = self.bound.as_ref().map_or("screen".to_string(), |fb| fb.name().to_string());
        self.draws.lock().unwrap().push(target);
        Ok(())
    }

    fn window_size(&self) -> (u32, u32) {
        (1280, 720)
    }

    fn stats(&self) -> RendererStats {
        self.stats
    }
}

// ============================================================================
// HELPERS
// ============================================================================

struct CountingLogger {
    warnings: Arc<Mutex<Vec<String>>>,
}

impl Logger for CountingLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity >= LogSeverity::Warn {
            self.warnings.lock().unwrap().push(entry.message.clone());
        }
    }
}

fn material(renderer: &Arc<Mutex<dyn Renderer>>, name: &str) -> Arc<Material> {
    let desc = ShaderProgramDesc::new(&format!("{}.vert", name), &format!("{}.frag", name));
    let program = renderer.lock().unwrap().create_shader_program(&desc).unwrap();
    let material = Material::new(name, program);
    material.set_auto_binding("u_worldViewProjectionMatrix", AutoBinding::WorldViewProjection);
    Arc::new(material)
}

fn camera() -> Camera {
    let mut camera = Camera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0);
    camera.look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, Vec3::Y);
    camera
}

/// A field of instanced crates, a single statue and a sun
fn courtyard(renderer: &Arc<Mutex<dyn Renderer>>) -> Scene {
    let mut scene = Scene::new();
    let wood = material(renderer, "wood");
    let stone = material(renderer, "stone");

    let crate_model = Model::new(Arc::new(Mesh::create_quad(1.0, 1.0))).with_material(wood);
    let crate_drawable = Arc::new(Drawable::model(crate_model).with_instance_key("crate"));
    for i in 0..5 {
        let node = scene.add_node(&format!("crate{}", i));
        scene.set_drawable(node, Some(Arc::clone(&crate_drawable)));
        scene.set_local_transform(node, Mat4::from_translation(Vec3::new(i as f32 * 2.0 - 4.0, 0.0, 0.0)));
    }

    let statue = scene.add_node("statue");
    let statue_model = Model::new(Arc::new(Mesh::create_quad(2.0, 4.0))).with_material(stone);
    scene.set_drawable(statue, Some(Arc::new(Drawable::model(statue_model))));
    scene.set_local_transform(statue, Mat4::from_translation(Vec3::new(0.0, 2.0, -3.0)));

    let sun = scene.add_node("sun");
    scene.set_light(sun, Some(Arc::new(Light::directional(Vec3::ONE).with_shadows(2, 512))));
    scene.set_local_transform(sun, Mat4::from_rotation_x(-1.0));
    scene
}

// ============================================================================
// FRAME TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_forward_frame() {
    let (renderer, draws) = HeadlessRenderer::shared();
    let scene = courtyard(&renderer);
    let mut path = RenderPath::new(RenderPathConfig::default());

    let stats = path.render(&renderer, &scene, &camera()).unwrap();

    // one instanced draw in the opaque pass, more in shadow cascades
    assert!(stats.instanced_draws >= 1);
    assert!(stats.shadow_casters > 0);
    let draws = draws.lock().unwrap();
    assert_eq!(stats.draw_calls as usize, draws.len());
    assert_eq!(draws.last().map(|t| t.as_str()), Some("screen"));
    assert_eq!(draws.iter().filter(|t| t.as_str() == "main").count(), 2);
}

#[test]
#[serial]
fn test_integration_frames_are_repeatable() {
    let (renderer, draws) = HeadlessRenderer::shared();
    let scene = courtyard(&renderer);
    let mut path = RenderPath::new(RenderPathConfig::default());

    let first = path.render(&renderer, &scene, &camera()).unwrap();
    let first_draws = draws.lock().unwrap().drain(..).collect::<Vec<_>>();
    let second = path.render(&renderer, &scene, &camera()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_draws, *draws.lock().unwrap());
    assert_eq!(path.allocation_count(), 1);
    assert_eq!(path.render_data().instance_count("crate"), 5);
}

#[test]
#[serial]
fn test_integration_deferred_frame() {
    let (renderer, draws) = HeadlessRenderer::shared();
    let scene = courtyard(&renderer);
    let config = RenderPathConfig { style: PipelineStyle::Deferred, shadows_enabled: false, ..Default::default() };
    let mut path = RenderPath::new(config);

    path.render(&renderer, &scene, &camera()).unwrap();

    let draws = draws.lock().unwrap();
    let mut order: Vec<&str> = draws.iter().map(|t| t.as_str()).collect();
    order.dedup();
    assert_eq!(order, vec!["gbuffer", "main", "post", "screen"]);
}

#[test]
#[serial]
fn test_integration_unknown_input_is_logged() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CountingLogger { warnings: warnings.clone() });

    let (renderer, _) = HeadlessRenderer::shared();
    let mut path = RenderPath::new(RenderPathConfig::default());
    {
        let mut guard = renderer.lock().unwrap();
        path.init_forward(&mut *guard).unwrap();
    }
    let fx = material(&renderer, "fx");
    let stages: Vec<Box<dyn RenderStage>> = vec![Box::new(RenderPass::new(
        RenderPassDesc::new("bloom")
            .with_full_screen_quad(fx)
            .with_input("u_texture", "bright.0"),
    ))];
    let result = path.set_stages(stages);

    Engine::reset_logger();
    assert!(result.is_err());
    let warnings = warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("bright.0"));
    assert_eq!(path.stages().len(), 3);
}
