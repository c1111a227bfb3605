use super::*;
use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicU32, Ordering};
use glam::Vec3;
use crate::renderer::mock_renderer::{MockLog, MockRenderer};
use crate::renderer::{CompareOp, FrameBufferDesc};
use crate::resource::Mesh;
use crate::scene::{Light, Model};

// ============================================================================
// Helpers
// ============================================================================

fn config() -> RenderPathConfig {
    RenderPathConfig { shadows_enabled: false, ..Default::default() }
}

fn camera() -> Camera {
    Camera::perspective(60f32.to_radians(), 800.0 / 600.0, 0.1, 100.0)
}

fn lit_quad(renderer: &mut dyn Renderer) -> Arc<Drawable> {
    let program = renderer.create_shader_program(&ShaderProgramDesc::new("lit.vert", "lit.frag")).unwrap();
    let model = Model::new(Arc::new(Mesh::create_quad(2.0, 2.0))).with_material(Arc::new(Material::new("lit", program)));
    Arc::new(Drawable::model(model))
}

/// Quad 5 units in front of the camera, lit by a sun shining down
fn scene(renderer: &Arc<Mutex<dyn Renderer>>, sun: Light) -> Scene {
    let mut scene = Scene::new();
    let quad = scene.add_node("quad");
    scene.set_drawable(quad, Some(lit_quad(&mut *renderer.lock().unwrap())));
    scene.set_local_transform(quad, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    let light = scene.add_node("sun");
    scene.set_light(light, Some(Arc::new(sun)));
    scene.set_local_transform(light, Mat4::from_rotation_x(-FRAC_PI_2));
    scene
}

fn shared() -> (Arc<Mutex<dyn Renderer>>, Arc<Mutex<MockLog>>) {
    let renderer = MockRenderer::new();
    let log = renderer.log();
    (renderer.into_shared(), log)
}

fn stage_names(path: &RenderPath) -> Vec<&str> {
    path.stages().iter().map(|s| s.name()).collect()
}

/// Stage that only counts its resizes
struct ResizeCounter {
    name: String,
    resizes: Arc<AtomicU32>,
}

impl ResizeCounter {
    fn boxed(name: &str) -> (Box<dyn RenderStage>, Arc<AtomicU32>) {
        let resizes = Arc::new(AtomicU32::new(0));
        (Box::new(Self { name: name.to_string(), resizes: Arc::clone(&resizes) }), resizes)
    }
}

impl RenderStage for ResizeCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_resize(&mut self, _ctx: &mut ResizeContext<'_>) -> Result<()> {
        self.resizes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render(&mut self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

fn targets(log: &MockLog) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for draw in &log.draws {
        if targets.last() != Some(&draw.target) {
            targets.push(draw.target.clone());
        }
    }
    targets
}

// ============================================================================
// Stage setup
// ============================================================================

#[test]
fn test_first_frame_builds_forward_stages() {
    let (renderer, _) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(config());

    path.render(&renderer, &scene, &camera()).unwrap();

    assert_eq!(stage_names(&path), vec!["opaque", "rest", "present"]);
    assert!(path.pool().contains("main"));
    assert_eq!(path.allocation_count(), 1);
}

#[test]
fn test_resize_is_idempotent() {
    let mut renderer = MockRenderer::new();
    let mut path = RenderPath::new(RenderPathConfig { depth_prepass: true, ..config() });
    path.init_forward(&mut renderer).unwrap();

    path.on_resize(&mut renderer, 800, 600).unwrap();
    path.on_resize(&mut renderer, 800, 600).unwrap();
    assert_eq!(path.allocation_count(), 1);

    path.on_resize(&mut renderer, 1024, 768).unwrap();
    assert_eq!(path.allocation_count(), 2);
    let main = path.pool().frame_buffer("main").unwrap();
    assert_eq!((main.width(), main.height()), (1024, 768));
}

#[test]
fn test_stages_resize_once_per_new_size() {
    let mut renderer = MockRenderer::new();
    let mut path = RenderPath::new(config());
    let (top, top_resizes) = ResizeCounter::boxed("top");
    let (nested, nested_resizes) = ResizeCounter::boxed("nested");
    let group = RenderStageGroup::new("group").with_stage(nested);
    let stages: Vec<Box<dyn RenderStage>> = vec![top, Box::new(group)];
    path.set_stages(stages).unwrap();

    path.on_resize(&mut renderer, 800, 600).unwrap();
    path.on_resize(&mut renderer, 800, 600).unwrap();
    assert_eq!(top_resizes.load(Ordering::SeqCst), 1);
    assert_eq!(nested_resizes.load(Ordering::SeqCst), 1);

    path.on_resize(&mut renderer, 1024, 768).unwrap();
    assert_eq!(top_resizes.load(Ordering::SeqCst), 2);
    assert_eq!(nested_resizes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_window_resize_reallocates_on_next_frame() {
    let (renderer, log) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(config());

    path.render(&renderer, &scene, &camera()).unwrap();
    path.render(&renderer, &scene, &camera()).unwrap();
    assert_eq!(path.allocation_count(), 1);

    log.lock().unwrap().window_size = (640, 480);
    path.render(&renderer, &scene, &camera()).unwrap();
    assert_eq!(path.allocation_count(), 2);
}

#[test]
fn test_validation_reports_missing_inputs() {
    let mut renderer = MockRenderer::new();
    let program = renderer.create_shader_program(&ShaderProgramDesc::new("fx.vert", "fx.frag")).unwrap();
    let fx = Arc::new(Material::new("fx", program));
    let reads = |input: &str| -> Vec<Box<dyn RenderStage>> {
        vec![
            Box::new(RenderPass::new(
                RenderPassDesc::new("scene").with_destination("main", 1.0, &[HDR_FORMAT], Some(DEPTH_FORMAT)),
            )),
            Box::new(RenderPass::new(
                RenderPassDesc::new("fx").with_full_screen_quad(Arc::clone(&fx)).with_input("u_texture", input),
            )),
        ]
    };
    let mut path = RenderPath::new(config());

    assert!(path.set_stages(reads("reflection.0")).is_err());
    assert!(path.set_stages(reads("main.1")).is_err());
    assert!(path.set_stages(reads("main.depth")).is_ok());
    assert!(path.set_stages(reads("main.0")).is_ok());

    let desc = FrameBufferDesc {
        name: "reflection".to_string(),
        width: 256,
        height: 256,
        color_formats: vec![TextureFormat::R8G8B8A8_UNORM],
        depth_format: None,
    };
    path.add_frame_buffer("reflection", renderer.create_frame_buffer(&desc).unwrap());
    assert!(path.set_stages(reads("reflection.0")).is_ok());
    assert!(path.validate().is_ok());
}

#[test]
fn test_stages_must_run_after_their_producer() {
    let mut path = RenderPath::new(config());
    let stages: Vec<Box<dyn RenderStage>> = vec![
        Box::new(RenderPass::new(RenderPassDesc::new("rest").with_existing_destination("main"))),
        Box::new(RenderPass::new(
            RenderPassDesc::new("scene").with_destination("main", 1.0, &[HDR_FORMAT], None),
        )),
    ];
    assert!(path.set_stages(stages).is_err());
    assert!(path.stages().is_empty());
}

#[test]
fn test_deferred_stages_validate() {
    let mut renderer = MockRenderer::new();
    let mut path = RenderPath::new(config());

    path.init_deferred(&mut renderer).unwrap();

    assert_eq!(path.config().style, PipelineStyle::Deferred);
    assert_eq!(stage_names(&path), vec!["gbuffer", "lighting", "rest", "post"]);
    path.on_resize(&mut renderer, 800, 600).unwrap();
    assert_eq!(path.pool().frame_buffer("gbuffer").unwrap().color_attachment_count(), 3);
    assert!(path.pool().contains("post"));
}

#[test]
fn test_switching_style_rebuilds_stages() {
    let (renderer, _) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(config());
    path.render(&renderer, &scene, &camera()).unwrap();

    path.set_pipeline_style(PipelineStyle::Deferred);
    assert!(path.stages().is_empty());
    path.render(&renderer, &scene, &camera()).unwrap();

    assert_eq!(stage_names(&path), vec!["gbuffer", "lighting", "rest", "post"]);
}

#[test]
fn test_failing_builtin_shader_is_an_error() {
    let renderer = MockRenderer::new().with_failing_program("present").into_shared();
    let mut path = RenderPath::new(config());

    let result = path.render(&renderer, &Scene::new(), &camera());

    assert!(result.is_err());
    assert!(path.stages().is_empty());
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_forward_frame_draws_scene_then_presents() {
    let (renderer, log) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(config());

    let stats = path.render(&renderer, &scene, &camera()).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(targets(&log), vec!["main", "screen"]);
    let present = log.draws.last().unwrap();
    assert_eq!(present.program, "shaders/present.vert|shaders/present.frag|");
    assert_eq!(present.count, 4);
    assert_eq!(stats.draw_calls as usize, log.draws.len());
    assert_eq!(stats.shadow_casters, 0);
    assert_eq!(log.commands.last().map(|c| c.as_str()), Some("bind_frame_buffer:screen"));
    assert!(log.last_uniform("u_texture").is_some());
}

#[test]
fn test_depth_prepass_then_equal_opaque() {
    let (renderer, log) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(RenderPathConfig { depth_prepass: true, ..config() });

    path.render(&renderer, &scene, &camera()).unwrap();

    assert_eq!(stage_names(&path), vec!["depth", "opaque", "rest", "present"]);
    let log = log.lock().unwrap();
    assert!(log.draws[0].program.starts_with("shaders/depth.vert"));
    assert_eq!(log.draws[1].program, "lit.vert|lit.frag|");
    assert_eq!(log.draws[1].depth_func, CompareOp::Equal);
    assert!(!log.draws[1].depth_write);
}

#[test]
fn test_deferred_frame_runs_post_chain() {
    let (renderer, log) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE));
    let mut path = RenderPath::new(RenderPathConfig { style: PipelineStyle::Deferred, ..config() });

    path.render(&renderer, &scene, &camera()).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(targets(&log), vec!["gbuffer", "main", "post", "screen"]);
    assert!(log.draws[0].program.starts_with("shaders/gbuffer.vert"));
}

#[test]
fn test_shadows_render_before_stages() {
    let (renderer, log) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE).with_shadows(2, 256));
    let mut path = RenderPath::new(RenderPathConfig { shadows_enabled: true, ..config() });

    let stats = path.render(&renderer, &scene, &camera()).unwrap();

    assert!(stats.shadow_casters > 0);
    assert_eq!(path.shadows().len(), 1);
    let log = log.lock().unwrap();
    let targets = targets(&log);
    assert!(targets[0].starts_with("shadow0.cascade"));
    assert_eq!(targets.last().map(|t| t.as_str()), Some("screen"));
    let first_main = targets.iter().position(|t| t == "main").unwrap();
    assert!(targets[..first_main].iter().all(|t| t.starts_with("shadow0.cascade")));
}

#[test]
fn test_disabling_shadows_drops_the_cache() {
    let (renderer, _) = shared();
    let scene = scene(&renderer, Light::directional(Vec3::ONE).with_shadows(2, 256));
    let mut path = RenderPath::new(RenderPathConfig { shadows_enabled: true, ..config() });
    path.render(&renderer, &scene, &camera()).unwrap();

    path.set_shadows_enabled(false);
    let stats = path.render(&renderer, &scene, &camera()).unwrap();

    assert!(path.shadows().is_empty());
    assert_eq!(stats.shadow_casters, 0);
}

#[test]
fn test_current_destination_draws_into_root() {
    let (renderer, log) = shared();
    let drawable = lit_quad(&mut *renderer.lock().unwrap());
    let offscreen = {
        let desc = FrameBufferDesc {
            name: "offscreen".to_string(),
            width: 800,
            height: 600,
            color_formats: vec![TextureFormat::R8G8B8A8_UNORM],
            depth_format: Some(DEPTH_FORMAT),
        };
        renderer.lock().unwrap().create_frame_buffer(&desc).unwrap()
    };
    let mut path = RenderPath::new(config());
    path.set_stages(vec![Box::new(RenderPass::new(RenderPassDesc::new("opaque")))]).unwrap();
    path.set_root_frame_buffer(Some(offscreen));

    let drawables = vec![(drawable, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)))];
    let stats = path.render_drawables(&renderer, &drawables, &camera()).unwrap();

    assert_eq!(stats.draw_calls, 1);
    let log = log.lock().unwrap();
    assert_eq!(log.draws[0].target, "offscreen");
    assert!(renderer.try_lock().is_ok());
    assert_eq!(log.commands.last().map(|c| c.as_str()), Some("bind_frame_buffer:screen"));
}

#[test]
fn test_render_drawables_ignores_lights() {
    let (renderer, log) = shared();
    let drawable = lit_quad(&mut *renderer.lock().unwrap());
    let mut path = RenderPath::new(config());

    let drawables = vec![(drawable, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)))];
    let stats = path.render_drawables(&renderer, &drawables, &camera()).unwrap();

    assert_eq!(stats.draw_calls, 2);
    assert!(path.render_data().lights().is_empty());
    assert_eq!(targets(&log.lock().unwrap()), vec!["main", "screen"]);
}

#[test]
fn test_culled_drawables_are_counted() {
    let (renderer, _) = shared();
    let drawable = lit_quad(&mut *renderer.lock().unwrap());
    let mut path = RenderPath::new(config());

    let drawables = vec![
        (Arc::clone(&drawable), Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0))),
        (drawable, Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0))),
    ];
    let stats = path.render_drawables(&renderer, &drawables, &camera()).unwrap();

    assert_eq!(stats.culled, 1);
}

#[test]
fn test_poisoned_renderer_lock_is_an_error() {
    let (renderer, _) = shared();
    let poisoner = Arc::clone(&renderer);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poison the renderer lock");
    })
    .join();
    let mut path = RenderPath::new(config());

    assert!(path.render(&renderer, &Scene::new(), &camera()).is_err());
}
