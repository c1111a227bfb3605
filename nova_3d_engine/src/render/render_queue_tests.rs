//! Tests for RenderDataManager: traversal, culling, instancing merge and sorting

use super::*;
use crate::math::BoundingBox;
use crate::renderer::mock_renderer::MockRenderer;
use crate::renderer::{ShaderProgramDesc, VertexUsage};
use crate::resource::{Material, Mesh};
use crate::scene::Model;

// ============================================================================
// Helpers
// ============================================================================

fn material(renderer: &mut MockRenderer, name: &str) -> Arc<Material> {
    let desc = ShaderProgramDesc::new(&format!("{}.vert", name), &format!("{}.frag", name));
    let program = renderer.create_shader_program(&desc).unwrap();
    Arc::new(Material::new(name, program))
}

fn quad(material: &Arc<Material>) -> Drawable {
    Drawable::model(Model::new(Arc::new(Mesh::create_quad(2.0, 2.0))).with_material(Arc::clone(material)))
}

/// Camera at the origin looking down -Z
fn camera() -> Camera {
    Camera::perspective(60f32.to_radians(), 1.0, 0.1, 100.0)
}

fn place(scene: &mut Scene, name: &str, drawable: Drawable, z: f32) -> NodeKey {
    let key = scene.add_node(name);
    scene.set_drawable(key, Some(Arc::new(drawable)));
    scene.set_local_transform(key, Mat4::from_translation(Vec3::new(0.0, 0.0, z)));
    key
}

fn filled(renderer: &mut MockRenderer, scene: &Scene) -> RenderDataManager {
    let mut manager = RenderDataManager::new();
    manager.fill(renderer, scene, &camera());
    manager.sort();
    manager
}

fn nodes(calls: &[DrawCall]) -> Vec<NodeKey> {
    calls.iter().filter_map(|c| c.source.node).collect()
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_cube_quad_and_light_are_bucketed() {
    let mut renderer = MockRenderer::new();
    let cube_material = material(&mut renderer, "cube");
    let glass = material(&mut renderer, "glass");
    let cube_mesh = Mesh::create_bounding_box(&BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)));

    let mut scene = Scene::new();
    let cube = Drawable::model(Model::new(Arc::new(cube_mesh)).with_material(Arc::clone(&cube_material)));
    place(&mut scene, "cube", cube, -10.0);
    place(&mut scene, "glass", quad(&glass).with_render_layer(RenderLayer::Transparent), -5.0);
    let sun = scene.add_node("sun");
    scene.set_light(sun, Some(Arc::new(Light::directional(Vec3::ONE))));

    let manager = filled(&mut renderer, &scene);

    let opaque = manager.render_data(RenderLayer::Opaque);
    assert_eq!(opaque.len(), 1);
    assert_eq!(opaque[0].material.id(), cube_material.id());
    assert!((opaque[0].distance_to_camera - 10.0).abs() < 1e-4);

    let transparent = manager.render_data(RenderLayer::Transparent);
    assert_eq!(transparent.len(), 1);
    assert_eq!(transparent[0].material.id(), glass.id());
    assert!((transparent[0].distance_to_camera - 5.0).abs() < 1e-4);

    assert_eq!(manager.lights().len(), 1);
    assert!(manager.render_data(RenderLayer::Custom).is_empty());
    assert!(manager.render_data(RenderLayer::Overlay).is_empty());
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_opaque_front_to_back_and_stable() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let mut scene = Scene::new();
    let far = place(&mut scene, "far", quad(&lit), -30.0);
    let near = place(&mut scene, "near", quad(&lit), -10.0);
    let mid_a = place(&mut scene, "mid_a", quad(&lit), -20.0);
    let mid_b = place(&mut scene, "mid_b", quad(&lit), -20.0);

    let manager = filled(&mut renderer, &scene);
    assert_eq!(nodes(manager.render_data(RenderLayer::Opaque)), vec![near, mid_a, mid_b, far]);
}

#[test]
fn test_opaque_same_distance_groups_by_material() {
    let mut renderer = MockRenderer::new();
    let first = material(&mut renderer, "first");
    let second = material(&mut renderer, "second");
    let mut scene = Scene::new();
    let b = place(&mut scene, "b", quad(&second), -10.0);
    let a = place(&mut scene, "a", quad(&first), -10.0);

    let manager = filled(&mut renderer, &scene);
    // lower material id first, whatever the traversal order
    assert_eq!(nodes(manager.render_data(RenderLayer::Opaque)), vec![a, b]);
}

#[test]
fn test_transparent_back_to_front_and_stable() {
    let mut renderer = MockRenderer::new();
    let glass = material(&mut renderer, "glass");
    let transparent = || quad(&glass).with_render_layer(RenderLayer::Transparent);
    let mut scene = Scene::new();
    let near = place(&mut scene, "near", transparent(), -5.0);
    let far = place(&mut scene, "far", transparent(), -15.0);
    let mid_a = place(&mut scene, "mid_a", transparent(), -10.0);
    let mid_b = place(&mut scene, "mid_b", transparent(), -10.0);

    let manager = filled(&mut renderer, &scene);
    let calls = manager.render_data(RenderLayer::Transparent);
    assert_eq!(nodes(calls), vec![far, mid_a, mid_b, near]);
    assert!(calls.windows(2).all(|w| w[0].distance_to_camera >= w[1].distance_to_camera));
}

#[test]
fn test_overlay_keeps_submission_order() {
    let mut renderer = MockRenderer::new();
    let hud = material(&mut renderer, "hud");
    let overlay = || quad(&hud).with_render_layer(RenderLayer::Overlay);
    let mut scene = Scene::new();
    let a = place(&mut scene, "a", overlay(), -5.0);
    let b = place(&mut scene, "b", overlay(), -50.0);
    let c = place(&mut scene, "c", overlay(), -1.0);

    let manager = filled(&mut renderer, &scene);
    assert_eq!(nodes(manager.render_data(RenderLayer::Overlay)), vec![a, b, c]);
}

// ============================================================================
// Instancing
// ============================================================================

#[test]
fn test_same_instance_key_merges_into_one_draw() {
    let mut renderer = MockRenderer::new();
    let bark = material(&mut renderer, "bark");
    let mut scene = Scene::new();
    place(&mut scene, "tree_a", quad(&bark).with_instance_key("tree"), -10.0);
    place(&mut scene, "tree_b", quad(&bark).with_instance_key("tree"), -20.0);

    let mut manager = RenderDataManager::new();
    for _ in 0..2 {
        manager.fill(&mut renderer, &scene, &camera());
        manager.sort();

        assert_eq!(manager.instanced_entry_count(), 1);
        assert_eq!(manager.instance_count("tree"), 2);
        let calls = manager.render_data(RenderLayer::Opaque);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].source.node.is_none());
        assert_eq!(calls[0].command.instance_count, 2);
        assert!((calls[0].distance_to_camera - 15.0).abs() < 1e-4);
    }
}

#[test]
fn test_instance_matrices_fold_view_projection() {
    let mut renderer = MockRenderer::new();
    let bark = material(&mut renderer, "bark");
    let mut scene = Scene::new();
    place(&mut scene, "tree", quad(&bark).with_instance_key("tree"), -10.0);

    let manager = filled(&mut renderer, &scene);
    let entry = &manager.instanced[0].instanced;
    let uploaded: Mat4 = bytemuck::pod_read_unaligned(&entry.instance_data()[..64]);
    let expected = camera().view_projection_matrix() * Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
    assert!(uploaded.abs_diff_eq(expected, 1e-5));
}

#[test]
fn test_unused_instance_keys_are_dropped() {
    let mut renderer = MockRenderer::new();
    let bark = material(&mut renderer, "bark");
    let mut scene = Scene::new();
    let a = place(&mut scene, "tree_a", quad(&bark).with_instance_key("tree"), -10.0);
    let b = place(&mut scene, "tree_b", quad(&bark).with_instance_key("tree"), -20.0);

    let mut manager = filled(&mut renderer, &scene);
    for key in [a, b] {
        scene.node(key).unwrap().drawable().unwrap().set_instance_key(None);
    }
    manager.fill(&mut renderer, &scene, &camera());

    assert_eq!(manager.instanced_entry_count(), 0);
    assert_eq!(manager.instance_count("tree"), 0);
    assert_eq!(manager.render_data(RenderLayer::Opaque).len(), 2);
}

#[test]
fn test_group_splits_keyed_and_plain_children() {
    let mut renderer = MockRenderer::new();
    let bark = material(&mut renderer, "bark");
    let stone = material(&mut renderer, "stone");
    let group = Drawable::group(vec![
        Arc::new(quad(&bark).with_instance_key("tree")),
        Arc::new(quad(&stone)),
    ]);
    let mut scene = Scene::new();
    let node = place(&mut scene, "grove", group, -10.0);

    let manager = filled(&mut renderer, &scene);
    let calls = manager.render_data(RenderLayer::Opaque);
    assert_eq!(calls.len(), 2);
    assert_eq!(manager.instance_count("tree"), 1);
    let direct: Vec<&DrawCall> = calls.iter().filter(|c| c.source.node == Some(node)).collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].material.id(), stone.id());
}

// ============================================================================
// Culling and lights
// ============================================================================

#[test]
fn test_frustum_culling_skips_models_behind_camera() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let mut scene = Scene::new();
    place(&mut scene, "front", quad(&lit), -10.0);
    let behind = place(&mut scene, "behind", quad(&lit), 10.0);
    scene.set_light(behind, Some(Arc::new(Light::point(Vec3::ONE, 5.0))));

    let manager = filled(&mut renderer, &scene);
    assert_eq!(manager.render_data(RenderLayer::Opaque).len(), 1);
    assert_eq!(manager.stats().culled, 1);
    // the culled node's light is still collected
    assert_eq!(manager.lights().len(), 1);

    let mut unculled = RenderDataManager::new();
    unculled.set_frustum_culling(false);
    unculled.fill(&mut renderer, &scene, &camera());
    assert_eq!(unculled.render_data(RenderLayer::Opaque).len(), 2);
}

#[test]
fn test_invisible_drawables_are_skipped() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let mut scene = Scene::new();
    let hidden = place(&mut scene, "hidden", quad(&lit), -10.0);
    scene.node(hidden).unwrap().drawable().unwrap().set_visible(false);

    let manager = filled(&mut renderer, &scene);
    assert!(manager.render_data(RenderLayer::Opaque).is_empty());
    assert_eq!(manager.stats().visited, 1);
}

#[test]
fn test_light_params_flatten_by_kind() {
    let mut renderer = MockRenderer::new();
    let mut scene = Scene::new();
    let sun = scene.add_node("sun");
    scene.set_light(sun, Some(Arc::new(Light::directional(Vec3::new(1.0, 0.5, 0.0)).with_light_mask(0b1))));
    let lamp = scene.add_node("lamp");
    scene.set_light(lamp, Some(Arc::new(Light::point(Vec3::ONE, 8.0))));
    scene.set_local_transform(lamp, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

    let manager = filled(&mut renderer, &scene);
    let params = manager.light_params();
    assert_eq!(params.directional_directions, vec![Vec3::NEG_Z]);
    assert_eq!(params.directional_masks, vec![0b1]);
    assert_eq!(params.point_positions, vec![Vec3::new(1.0, 2.0, 3.0)]);
    assert_eq!(params.point_ranges, vec![8.0]);
}

#[test]
fn test_clear_empties_queues_and_lights() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let mut scene = Scene::new();
    let node = place(&mut scene, "quad", quad(&lit), -10.0);
    scene.set_light(node, Some(Arc::new(Light::directional(Vec3::ONE))));

    let mut manager = filled(&mut renderer, &scene);
    manager.clear();
    assert!(manager.render_data(RenderLayer::Opaque).is_empty());
    assert!(manager.lights().is_empty());
    assert_eq!(manager.stats(), QueueStats::default());
}

#[test]
fn test_fill_drawables_without_scene() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let drawables = vec![
        (Arc::new(quad(&lit)), Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0))),
        (Arc::new(quad(&lit)), Mat4::from_translation(Vec3::new(0.0, 0.0, -6.0))),
    ];

    let mut manager = RenderDataManager::new();
    manager.fill_drawables(&mut renderer, &drawables, &camera());
    manager.sort();
    let calls = manager.render_data(RenderLayer::Opaque);
    assert_eq!(calls.len(), 2);
    assert!(calls[0].distance_to_camera < calls[1].distance_to_camera);
    assert!(manager.lights().is_empty());
}

// ============================================================================
// Failure isolation and group anchors
// ============================================================================

#[test]
fn test_failing_drawable_is_skipped_and_frame_continues() {
    let mut renderer = MockRenderer::new().with_failing_binding(VertexUsage::Normal);
    let lit = material(&mut renderer, "lit");
    let lines = Mesh::create_lines(&[Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]);

    let mut scene = Scene::new();
    place(&mut scene, "quad", quad(&lit), -10.0);
    let line_node = place(
        &mut scene,
        "lines",
        Drawable::model(Model::new(Arc::new(lines)).with_material(Arc::clone(&lit))),
        -12.0,
    );

    let manager = filled(&mut renderer, &scene);
    assert_eq!(nodes(manager.render_data(RenderLayer::Opaque)), vec![line_node]);
    assert_eq!(manager.stats().skipped, 1);
    assert_eq!(manager.stats().draw_calls, 1);
}

#[test]
fn test_group_children_sort_by_their_own_centers() {
    let mut renderer = MockRenderer::new();
    let lit = material(&mut renderer, "lit");
    let boxed = |center: Vec3| {
        let bbox = BoundingBox::new(center - Vec3::ONE, center + Vec3::ONE);
        Arc::new(Drawable::model(
            Model::new(Arc::new(Mesh::create_bounding_box(&bbox))).with_material(Arc::clone(&lit)),
        ))
    };
    let group = Drawable::group(vec![boxed(Vec3::new(0.0, 0.0, -20.0)), boxed(Vec3::new(0.0, 0.0, -5.0))]);

    let mut scene = Scene::new();
    place(&mut scene, "group", group, 0.0);

    let manager = filled(&mut renderer, &scene);
    let calls = manager.render_data(RenderLayer::Opaque);
    assert_eq!(calls.len(), 2);
    assert!((calls[0].distance_to_camera - 5.0).abs() < 1e-3);
    assert!((calls[1].distance_to_camera - 20.0).abs() < 1e-3);
    assert!((calls[0].source.anchor - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-3);
}
