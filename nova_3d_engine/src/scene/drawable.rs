/// Drawables: what a scene node renders.
///
/// A [`Drawable`] is a closed set of variants ([`DrawableKind`]) plus the
/// tags every variant carries ([`DrawableProps`]): render layer, light mask,
/// visibility, clickability and an optional instance key. Drawables with
/// the same instance key are merged into one instanced draw per frame.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::math::BoundingSphere;
use crate::renderer::Renderer;
use crate::render::draw_call::{DrawSource, DrawTarget, RenderLayer};
use crate::resource::{Material, Mesh, MeshBatch, MeshSkin, RayQuery};
use crate::scene::instanced::Instanced;

// ===== PROPS =====

/// Tags shared by every drawable variant
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableProps {
    pub render_layer: RenderLayer,
    /// Bit i set: lit by lights in group i
    pub light_mask: u32,
    pub visible: bool,
    pub clickable: bool,
    /// Drawables sharing a key are drawn as one instanced draw
    pub instance_key: Option<String>,
}

impl Default for DrawableProps {
    fn default() -> Self {
        Self {
            render_layer: RenderLayer::Opaque,
            light_mask: u32::MAX,
            visible: true,
            clickable: true,
            instance_key: None,
        }
    }
}

// ===== MODEL =====

/// A mesh (optionally split in parts), its materials and an optional skin
pub struct Model {
    mesh: Arc<Mesh>,
    parts: Vec<Arc<Mesh>>,
    material: Option<Arc<Material>>,
    part_materials: Vec<Option<Arc<Material>>>,
    skin: Option<Arc<MeshSkin>>,
}

impl Model {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            mesh,
            parts: Vec::new(),
            material: None,
            part_materials: Vec::new(),
            skin: None,
        }
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_skin(mut self, skin: Arc<MeshSkin>) -> Self {
        self.skin = Some(skin);
        self
    }

    /// Add a part (usually created with [`Mesh::create_mesh_part`])
    pub fn add_part(&mut self, part: Mesh) -> usize {
        self.parts.push(Arc::new(part));
        self.part_materials.push(None);
        self.parts.len() - 1
    }

    /// Material for one part; parts without one use the model material
    pub fn set_part_material(&mut self, index: usize, material: Arc<Material>) {
        if let Some(slot) = self.part_materials.get_mut(index) {
            *slot = Some(material);
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn parts(&self) -> &[Arc<Mesh>] {
        &self.parts
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        self.material.as_ref()
    }

    pub fn part_material(&self, index: usize) -> Option<&Arc<Material>> {
        self.part_materials.get(index)?.as_ref().or(self.material.as_ref())
    }

    pub fn skin(&self) -> Option<&Arc<MeshSkin>> {
        self.skin.as_ref()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.mesh.bounding_sphere()
    }

    /// Draw the whole mesh, or each part; anything without a material is
    /// skipped
    pub fn draw(
        &self,
        renderer: &mut dyn Renderer,
        target: &mut DrawTarget<'_>,
        source: &DrawSource,
    ) -> Result<()> {
        let mut source = source.clone();
        source.skin = self.skin.clone();

        if self.parts.is_empty() {
            if let Some(material) = &self.material {
                self.mesh.draw(renderer, target.reborrow(), &source, material)?;
            }
            return Ok(());
        }
        for (index, part) in self.parts.iter().enumerate() {
            if let Some(material) = self.part_material(index) {
                part.draw(renderer, target.reborrow(), &source, material)?;
            }
        }
        Ok(())
    }

    /// Closest hit over the mesh, or over each part (reporting the part index)
    pub fn raycast(&self, query: &mut RayQuery) -> bool {
        if self.parts.is_empty() {
            return self.mesh.raycast(query);
        }
        let mut hit = false;
        for (index, part) in self.parts.iter().enumerate() {
            if part.raycast(query) {
                query.part_index = Some(index);
                hit = true;
            }
        }
        hit
    }
}

// ===== LOD MODEL =====

/// Models gated by camera distance
pub struct LodModel {
    /// (max distance, model), ascending by distance
    levels: Vec<(f32, Model)>,
}

impl LodModel {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }

    /// Add a level used up to `max_distance`; levels are kept sorted
    pub fn with_level(mut self, max_distance: f32, model: Model) -> Self {
        let at = self.levels.partition_point(|(d, _)| *d <= max_distance);
        self.levels.insert(at, (max_distance, model));
        self
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Index of the first level whose max distance covers `distance`; the
    /// last level catches everything beyond
    pub fn select_index(&self, distance: f32) -> Option<usize> {
        if self.levels.is_empty() {
            return None;
        }
        let index = self.levels.iter().position(|(max, _)| *max >= distance);
        Some(index.unwrap_or(self.levels.len() - 1))
    }

    pub fn select(&self, distance: f32) -> Option<&Model> {
        self.select_index(distance).map(|i| &self.levels[i].1)
    }

    /// Bounds of the most detailed level
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.levels.first().map(|(_, m)| m.bounding_sphere()).unwrap_or_default()
    }
}

impl Default for LodModel {
    fn default() -> Self {
        Self::new()
    }
}

// ===== DRAWABLE =====

pub enum DrawableKind {
    Model(Model),
    Batch(RwLock<MeshBatch>),
    Instanced(Mutex<Instanced>),
    /// Children treated as one unit for bounds, drawing and picking
    Group(Vec<Arc<Drawable>>),
    Lod(LodModel),
}

pub struct Drawable {
    props: RwLock<DrawableProps>,
    kind: DrawableKind,
}

impl Drawable {
    pub fn new(kind: DrawableKind) -> Self {
        Self { props: RwLock::new(DrawableProps::default()), kind }
    }

    pub fn model(model: Model) -> Self {
        Self::new(DrawableKind::Model(model))
    }

    pub fn batch(batch: MeshBatch) -> Self {
        Self::new(DrawableKind::Batch(RwLock::new(batch)))
    }

    pub fn instanced(instanced: Instanced) -> Self {
        Self::new(DrawableKind::Instanced(Mutex::new(instanced)))
    }

    pub fn group(children: Vec<Arc<Drawable>>) -> Self {
        Self::new(DrawableKind::Group(children))
    }

    pub fn lod(lod: LodModel) -> Self {
        Self::new(DrawableKind::Lod(lod))
    }

    pub fn with_render_layer(self, layer: RenderLayer) -> Self {
        self.props_mut().render_layer = layer;
        self
    }

    pub fn with_light_mask(self, mask: u32) -> Self {
        self.props_mut().light_mask = mask;
        self
    }

    pub fn with_instance_key(self, key: &str) -> Self {
        self.props_mut().instance_key = Some(key.to_string());
        self
    }

    pub fn with_clickable(self, clickable: bool) -> Self {
        self.props_mut().clickable = clickable;
        self
    }

    // ===== PROPS =====

    pub fn kind(&self) -> &DrawableKind {
        &self.kind
    }

    pub fn props(&self) -> DrawableProps {
        self.props.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn render_layer(&self) -> RenderLayer {
        self.props_ref().render_layer
    }

    pub fn light_mask(&self) -> u32 {
        self.props_ref().light_mask
    }

    pub fn is_visible(&self) -> bool {
        self.props_ref().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.props_mut().visible = visible;
    }

    pub fn is_clickable(&self) -> bool {
        self.props_ref().clickable
    }

    pub fn set_clickable(&self, clickable: bool) {
        self.props_mut().clickable = clickable;
    }

    pub fn instance_key(&self) -> Option<String> {
        self.props_ref().instance_key.clone()
    }

    pub fn set_instance_key(&self, key: Option<&str>) {
        self.props_mut().instance_key = key.map(str::to_string);
    }

    fn props_ref(&self) -> RwLockReadGuard<'_, DrawableProps> {
        self.props.read().unwrap_or_else(|e| e.into_inner())
    }

    fn props_mut(&self) -> RwLockWriteGuard<'_, DrawableProps> {
        self.props.write().unwrap_or_else(|e| e.into_inner())
    }

    /// True when this drawable, or a group descendant, has an instance key
    pub fn has_instance_key(&self) -> bool {
        if self.props_ref().instance_key.is_some() {
            return true;
        }
        match &self.kind {
            DrawableKind::Group(children) => children.iter().any(|c| c.has_instance_key()),
            _ => false,
        }
    }

    // ===== BOUNDS =====

    /// Local-space bounding sphere
    pub fn bounding_sphere(&self) -> BoundingSphere {
        match &self.kind {
            DrawableKind::Model(model) => model.bounding_sphere(),
            DrawableKind::Batch(batch) => read_batch(batch).bounding_sphere(),
            DrawableKind::Instanced(instanced) => lock_instanced(instanced).bounding_sphere(),
            DrawableKind::Group(children) => {
                let mut sphere = BoundingSphere::default();
                for child in children {
                    sphere.merge(&child.bounding_sphere());
                }
                sphere
            }
            DrawableKind::Lod(lod) => lod.bounding_sphere(),
        }
    }

    /// Camera distance to this drawable placed at `world`
    pub fn distance(&self, world: &Mat4, camera_position: Vec3) -> f32 {
        self.bounding_sphere().transformed(world).center.distance(camera_position)
    }

    /// World-space center of the bounds at `world`; None for empty bounds
    pub fn anchor(&self, world: &Mat4) -> Option<Vec3> {
        let sphere = self.bounding_sphere().transformed(world);
        (!sphere.is_empty()).then_some(sphere.center)
    }

    // ===== DRAW =====

    /// Emit draw calls; `source` carries the node, transform and tags
    ///
    /// Group children use their own layer, light mask and bounds center;
    /// invisible children are skipped.
    pub fn draw(
        &self,
        renderer: &mut dyn Renderer,
        target: &mut DrawTarget<'_>,
        source: &DrawSource,
    ) -> Result<()> {
        match &self.kind {
            DrawableKind::Model(model) => model.draw(renderer, target, source),
            DrawableKind::Batch(batch) => read_batch(batch).draw(renderer, target.reborrow(), source),
            DrawableKind::Instanced(instanced) => lock_instanced(instanced).draw(renderer, target, source),
            DrawableKind::Group(children) => {
                for child in children {
                    if !child.is_visible() {
                        continue;
                    }
                    let mut child_source = source.clone();
                    child_source.render_layer = child.render_layer();
                    child_source.light_mask = child.light_mask();
                    if let Some(anchor) = child.anchor(&source.world) {
                        child_source.anchor = anchor;
                    }
                    child.draw(renderer, target, &child_source)?;
                }
                Ok(())
            }
            DrawableKind::Lod(lod) => {
                let distance = source.anchor.distance(target.camera_position());
                match lod.select(distance) {
                    Some(model) => model.draw(renderer, target, source),
                    None => Ok(()),
                }
            }
        }
    }

    // ===== PICKING =====

    /// Closest hit in local space; groups report the hit child in
    /// `query.part_index`
    pub fn raycast(&self, query: &mut RayQuery) -> bool {
        match &self.kind {
            DrawableKind::Model(model) => model.raycast(query),
            DrawableKind::Batch(batch) => read_batch(batch).mesh().raycast(query),
            DrawableKind::Instanced(instanced) => lock_instanced(instanced).raycast(query),
            DrawableKind::Group(children) => {
                let mut hit = false;
                for (index, child) in children.iter().enumerate() {
                    if child.raycast(query) {
                        query.part_index = Some(index);
                        hit = true;
                    }
                }
                hit
            }
            DrawableKind::Lod(lod) => match lod.levels.first() {
                Some((_, model)) => model.raycast(query),
                None => false,
            },
        }
    }
}

fn read_batch(batch: &RwLock<MeshBatch>) -> RwLockReadGuard<'_, MeshBatch> {
    batch.read().unwrap_or_else(|e| e.into_inner())
}

fn lock_instanced(instanced: &Mutex<Instanced>) -> MutexGuard<'_, Instanced> {
    instanced.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "drawable_tests.rs"]
mod tests;
