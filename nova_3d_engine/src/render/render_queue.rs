/// RenderDataManager: per-frame render queues built from a scene traversal.
///
/// One frame goes through `clear()` (or `begin()`), traversal with
/// `build_render_queues()` per node, `end_fill()`, `sort()`, then
/// `render_data(layer)` for each layer the stages draw. `fill()` runs the
/// whole sequence up to (not including) the sort.
///
/// Drawables carrying an instance key are not drawn per node: their world
/// matrices are accumulated in one persistent `Instanced` entry per key,
/// drawn once in `end_fill()`.

use std::sync::Arc;
use glam::{Mat4, Vec3};
use rdst::RadixSort;
use rustc_hash::FxHashMap;

use crate::math::Frustum;
use crate::renderer::Renderer;
use crate::render::draw_call::{DrawCall, DrawSource, DrawTarget, RenderInfo, RenderLayer};
use crate::render::frame_params::LightParams;
use crate::scene::{Camera, Drawable, DrawableKind, Instanced, Light, LightKind, Node, NodeKey, Scene};

/// Low bits of the opaque sort score holding the material id
const MATERIAL_MASK: u64 = 0xFFFF;

/// A light found during traversal, with its node's world matrix
#[derive(Clone)]
pub struct LightInstance {
    pub node: NodeKey,
    pub light: Arc<Light>,
    pub world: Mat4,
}

impl LightInstance {
    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub fn direction(&self) -> Vec3 {
        Light::direction(&self.world)
    }
}

/// Counters of the last fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub visited: u32,
    pub culled: u32,
    pub instanced_entries: u32,
    pub instances: u32,
    pub draw_calls: u32,
    /// Drawables left out of the frame because drawing them failed
    pub skipped: u32,
}

struct InstancedEntry {
    key: String,
    instanced: Instanced,
    render_layer: RenderLayer,
    light_mask: u32,
}

pub struct RenderDataManager {
    render_info: RenderInfo,
    queues: [Vec<DrawCall>; RenderLayer::COUNT],
    lights: Vec<LightInstance>,
    instanced: Vec<InstancedEntry>,
    instanced_index: FxHashMap<String, usize>,
    frustum_culling: bool,
    collect_lights: bool,
    frustum: Option<Frustum>,
    view_projection: Mat4,
    stats: QueueStats,
}

impl RenderDataManager {
    pub fn new() -> Self {
        Self {
            render_info: RenderInfo::new(),
            queues: Default::default(),
            lights: Vec::new(),
            instanced: Vec::new(),
            instanced_index: FxHashMap::default(),
            frustum_culling: true,
            collect_lights: true,
            frustum: None,
            view_projection: Mat4::IDENTITY,
            stats: QueueStats::default(),
        }
    }

    // ===== OPTIONS =====

    pub fn set_frustum_culling(&mut self, enabled: bool) {
        self.frustum_culling = enabled;
    }

    pub fn frustum_culling(&self) -> bool {
        self.frustum_culling
    }

    /// Emit only the first pass of material chains
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.render_info.wireframe = wireframe;
    }

    /// Depth-only fill (shadow maps): first passes only
    pub fn set_depth_pass(&mut self, depth_pass: bool) {
        self.render_info.depth_pass = depth_pass;
    }

    pub fn set_collect_lights(&mut self, collect: bool) {
        self.collect_lights = collect;
    }

    // ===== FILL =====

    /// Drop everything queued, keeping instanced entries (emptied)
    pub fn clear(&mut self) {
        self.render_info.draw_calls.clear();
        for queue in &mut self.queues {
            queue.clear();
        }
        self.lights.clear();
        for entry in &mut self.instanced {
            entry.instanced.clear();
        }
        self.stats = QueueStats::default();
    }

    /// Clear and set the viewpoint the next traversal is culled and sorted for
    pub fn begin(&mut self, view_projection: Mat4, camera_position: Vec3) {
        self.clear();
        self.view_projection = view_projection;
        self.render_info.camera_position = camera_position;
        self.frustum = Some(Frustum::from_view_projection(&view_projection));
    }

    /// Traverse `scene` as seen from `camera` and finish the fill
    ///
    /// A drawable that fails to draw (buffer or binding creation) is logged
    /// and left out of this frame; the others are still queued.
    pub fn fill(&mut self, renderer: &mut dyn Renderer, scene: &Scene, camera: &Camera) {
        self.fill_view(renderer, scene, camera.view_projection_matrix(), camera.position());
    }

    /// Same as [`fill`](Self::fill) from an explicit viewpoint
    pub fn fill_view(
        &mut self,
        renderer: &mut dyn Renderer,
        scene: &Scene,
        view_projection: Mat4,
        camera_position: Vec3,
    ) {
        self.begin(view_projection, camera_position);
        scene.visit(|key, node, world| {
            self.build_render_queues(renderer, key, node, world);
            true
        });
        self.end_fill(renderer);
    }

    /// Fill from explicit (drawable, world) pairs instead of a scene; no lights
    pub fn fill_drawables(
        &mut self,
        renderer: &mut dyn Renderer,
        drawables: &[(Arc<Drawable>, Mat4)],
        camera: &Camera,
    ) {
        self.begin(camera.view_projection_matrix(), camera.position());
        for (drawable, world) in drawables {
            self.stats.visited += 1;
            self.queue_drawable(renderer, None, drawable, world);
        }
        self.end_fill(renderer);
    }

    /// Queue one node's light and drawable
    ///
    /// Lights are collected whether or not the drawable is culled.
    pub fn build_render_queues(
        &mut self,
        renderer: &mut dyn Renderer,
        key: NodeKey,
        node: &Node,
        world: &Mat4,
    ) {
        self.stats.visited += 1;

        if self.collect_lights {
            if let Some(light) = node.light() {
                self.lights.push(LightInstance { node: key, light: Arc::clone(light), world: *world });
            }
        }

        if let Some(drawable) = node.drawable() {
            self.queue_drawable(renderer, Some(key), drawable, world);
        }
    }

    fn queue_drawable(
        &mut self,
        renderer: &mut dyn Renderer,
        node: Option<NodeKey>,
        drawable: &Arc<Drawable>,
        world: &Mat4,
    ) {
        if !drawable.is_visible() {
            return;
        }

        let sphere = drawable.bounding_sphere().transformed(world);
        let cullable = matches!(drawable.kind(), DrawableKind::Model(_) | DrawableKind::Lod(_));
        if self.frustum_culling && cullable {
            if let Some(frustum) = &self.frustum {
                if !sphere.is_empty() && !frustum.intersects_sphere(&sphere) {
                    self.stats.culled += 1;
                    return;
                }
            }
        }

        let source = DrawSource {
            node,
            world: *world,
            render_layer: drawable.render_layer(),
            light_mask: drawable.light_mask(),
            anchor: sphere.center,
            skin: None,
        };
        if !self.add_instanced(renderer, drawable, &source) {
            self.draw_or_skip(renderer, drawable, &source);
        }
    }

    /// Queue the calls of one drawable; on failure its partial calls are
    /// dropped and the error is logged
    fn draw_or_skip(&mut self, renderer: &mut dyn Renderer, drawable: &Drawable, source: &DrawSource) {
        let queued = self.render_info.draw_calls.len();
        if let Err(e) = drawable.draw(renderer, &mut DrawTarget::Queue(&mut self.render_info), source) {
            self.render_info.draw_calls.truncate(queued);
            self.stats.skipped += 1;
            crate::engine_error!("nova3d::RenderDataManager",
                "Skipping drawable of node {:?} this frame: {}", source.node, e);
        }
    }

    /// Merge `drawable` into the instanced entry of its key
    ///
    /// Groups with keyed descendants are split: keyed children are merged,
    /// the others are drawn directly.
    ///
    /// # Returns
    ///
    /// true when the drawable was fully handled and must not be drawn
    fn add_instanced(&mut self, renderer: &mut dyn Renderer, drawable: &Arc<Drawable>, source: &DrawSource) -> bool {
        if let Some(key) = drawable.instance_key() {
            let instance_matrix = self.view_projection * source.world;
            let entry = self.instanced_entry(&key, drawable, source);
            entry.instanced.add_instance(source.world, instance_matrix);
            return true;
        }

        let DrawableKind::Group(children) = drawable.kind() else {
            return false;
        };
        if !drawable.has_instance_key() {
            return false;
        }
        for child in children {
            if !child.is_visible() {
                continue;
            }
            let child_source = DrawSource {
                render_layer: child.render_layer(),
                light_mask: child.light_mask(),
                anchor: child.anchor(&source.world).unwrap_or(source.anchor),
                ..source.clone()
            };
            if !self.add_instanced(renderer, child, &child_source) {
                self.draw_or_skip(renderer, child, &child_source);
            }
        }
        true
    }

    fn instanced_entry(&mut self, key: &str, drawable: &Arc<Drawable>, source: &DrawSource) -> &mut InstancedEntry {
        let index = match self.instanced_index.get(key) {
            Some(&index) => index,
            None => {
                self.instanced.push(InstancedEntry {
                    key: key.to_string(),
                    instanced: Instanced::new(Arc::clone(drawable)),
                    render_layer: source.render_layer,
                    light_mask: source.light_mask,
                });
                self.instanced_index.insert(key.to_string(), self.instanced.len() - 1);
                self.instanced.len() - 1
            }
        };

        let entry = &mut self.instanced[index];
        if entry.instanced.instance_count() == 0 {
            // first instance this frame decides what the entry draws
            entry.instanced.set_drawable(Arc::clone(drawable));
            entry.render_layer = source.render_layer;
            entry.light_mask = source.light_mask;
        }
        entry
    }

    /// Draw instanced entries, then bucket every queued call by layer with
    /// its camera distance
    pub fn end_fill(&mut self, renderer: &mut dyn Renderer) {
        self.instanced.retain(|entry| entry.instanced.instance_count() > 0);
        self.instanced_index.clear();
        for (index, entry) in self.instanced.iter().enumerate() {
            self.instanced_index.insert(entry.key.clone(), index);
        }

        for entry in &mut self.instanced {
            let source = DrawSource {
                node: None,
                world: Mat4::IDENTITY,
                render_layer: entry.render_layer,
                light_mask: entry.light_mask,
                anchor: entry.instanced.centroid(),
                skin: None,
            };
            let queued = self.render_info.draw_calls.len();
            if let Err(e) = entry.instanced.draw(renderer, &mut DrawTarget::Queue(&mut self.render_info), &source) {
                self.render_info.draw_calls.truncate(queued);
                self.stats.skipped += 1;
                crate::engine_error!("nova3d::RenderDataManager",
                    "Skipping instanced set '{}' this frame: {}", entry.key, e);
                continue;
            }
            self.stats.instanced_entries += 1;
            self.stats.instances += entry.instanced.instance_count();
        }

        let camera_position = self.render_info.camera_position;
        for mut call in self.render_info.draw_calls.drain(..) {
            call.distance_to_camera = call.source.anchor.distance(camera_position);
            self.queues[call.source.render_layer.index()].push(call);
            self.stats.draw_calls += 1;
        }
    }

    // ===== SORT =====

    /// Opaque front to back (material id as tie-break), transparent back to
    /// front; other layers keep submission order. Equal keys keep traversal
    /// order.
    pub fn sort(&mut self) {
        let opaque = &mut self.queues[RenderLayer::Opaque.index()];
        let keys: Vec<u64> = opaque.iter().map(opaque_score).collect();
        sort_by_keys(opaque, keys);

        let transparent = &mut self.queues[RenderLayer::Transparent.index()];
        let keys: Vec<u64> = transparent
            .iter()
            .map(|call| u64::MAX - distance_bits(call.distance_to_camera))
            .collect();
        sort_by_keys(transparent, keys);
    }

    // ===== ACCESS =====

    pub fn render_data(&self, layer: RenderLayer) -> &[DrawCall] {
        &self.queues[layer.index()]
    }

    pub fn lights(&self) -> &[LightInstance] {
        &self.lights
    }

    /// Lights flattened for material auto-bindings; spot lights are
    /// uploaded with the point lights
    pub fn light_params(&self) -> LightParams {
        let mut params = LightParams::default();
        for instance in &self.lights {
            let light = &instance.light;
            match light.kind {
                LightKind::Directional => {
                    params.directional_directions.push(instance.direction());
                    params.directional_colors.push(light.radiance());
                    params.directional_masks.push(light.light_mask);
                }
                LightKind::Point { range } | LightKind::Spot { range, .. } => {
                    params.point_positions.push(instance.position());
                    params.point_colors.push(light.radiance());
                    params.point_ranges.push(range);
                    params.point_masks.push(light.light_mask);
                }
            }
        }
        params
    }

    /// Number of instanced entries kept (one per live instance key)
    pub fn instanced_entry_count(&self) -> usize {
        self.instanced.len()
    }

    /// Instances accumulated under `key` this frame
    pub fn instance_count(&self, key: &str) -> u32 {
        self.instanced_index
            .get(key)
            .map_or(0, |&i| self.instanced[i].instanced.instance_count())
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn camera_position(&self) -> Vec3 {
        self.render_info.camera_position
    }
}

impl Default for RenderDataManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-preserving bits of a non-negative distance
fn distance_bits(distance: f32) -> u64 {
    distance.max(0.0).to_bits() as u64
}

fn opaque_score(call: &DrawCall) -> u64 {
    (distance_bits(call.distance_to_camera) & !MATERIAL_MASK) | (call.material.id() as u64 & MATERIAL_MASK)
}

/// Stable sort of `calls` by `keys` (radix sort on key + original index)
fn sort_by_keys(calls: &mut Vec<DrawCall>, keys: Vec<u64>) {
    if calls.len() < 2 {
        return;
    }
    let mut packed: Vec<u128> = keys
        .into_iter()
        .enumerate()
        .map(|(index, key)| ((key as u128) << 64) | index as u128)
        .collect();
    packed.radix_sort_unstable();

    let mut slots: Vec<Option<DrawCall>> = calls.drain(..).map(Some).collect();
    calls.extend(packed.into_iter().filter_map(|k| slots[k as u64 as usize].take()));
}

#[cfg(test)]
#[path = "render_queue_tests.rs"]
mod tests;
