/// Scene: a hierarchy of nodes carrying drawables and lights.
///
/// Uses a SlotMap for O(1) insert/remove with stable keys. Traversal is
/// depth-first pre-order from the roots, in insertion order, with each
/// node's world matrix accumulated from its ancestors.

use std::sync::Arc;
use slotmap::{new_key_type, SlotMap};
use glam::{Mat4, Vec3};

use crate::engine_err;
use crate::error::Result;
use crate::math::{BoundingSphere, Ray};
use crate::resource::RayQuery;
use crate::scene::drawable::Drawable;
use crate::scene::light::Light;

new_key_type! {
    /// Stable key for a Node within a Scene.
    ///
    /// Keys remain valid until their own node is removed.
    pub struct NodeKey;
}

/// A scene node: transform, hierarchy links and optional components
pub struct Node {
    name: String,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    local_transform: Mat4,
    enabled: bool,
    drawable: Option<Arc<Drawable>>,
    light: Option<Arc<Light>>,
}

impl Node {
    fn new(name: &str, parent: Option<NodeKey>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            local_transform: Mat4::IDENTITY,
            enabled: true,
            drawable: None,
            light: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn local_transform(&self) -> Mat4 {
        self.local_transform
    }

    /// Disabled nodes and their subtrees are skipped by traversal
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn drawable(&self) -> Option<&Arc<Drawable>> {
        self.drawable.as_ref()
    }

    pub fn light(&self) -> Option<&Arc<Light>> {
        self.light.as_ref()
    }
}

/// Result of a scene pick
#[derive(Debug, Clone, Copy)]
pub struct PickHit {
    pub node: NodeKey,
    /// World-space distance from the ray origin
    pub distance: f32,
    pub point: Vec3,
    /// World-space normal at the hit
    pub normal: Vec3,
    /// Model part or group child that was hit
    pub part_index: Option<usize>,
    pub primitive_index: Option<u32>,
}

pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
}

impl Scene {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key(), roots: Vec::new() }
    }

    // ===== HIERARCHY =====

    /// Add a root node
    pub fn add_node(&mut self, name: &str) -> NodeKey {
        let key = self.nodes.insert(Node::new(name, None));
        self.roots.push(key);
        key
    }

    /// Add a node under `parent`
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not in the scene.
    pub fn add_child(&mut self, parent: NodeKey, name: &str) -> Result<NodeKey> {
        if !self.nodes.contains_key(parent) {
            return Err(engine_err!("nova3d::Scene", "Parent of node '{}' is not in the scene", name));
        }
        let key = self.nodes.insert(Node::new(name, Some(parent)));
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(key);
        }
        Ok(key)
    }

    /// Remove a node and its whole subtree. Returns false if the key is invalid.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        let Some(parent) = self.nodes.get(key).map(|n| n.parent) else {
            return false;
        };
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.retain(|&c| c != key),
            None => self.roots.retain(|&r| r != key),
        }

        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children);
            }
        }
        true
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// First node named `name`, in traversal order
    pub fn find_node(&self, name: &str) -> Option<NodeKey> {
        let mut found = None;
        self.visit(|key, node, _| {
            if found.is_none() && node.name == name {
                found = Some(key);
            }
            found.is_none()
        });
        found
    }

    // ===== COMPONENTS =====

    pub fn set_local_transform(&mut self, key: NodeKey, transform: Mat4) -> bool {
        self.with_node(key, |node| node.local_transform = transform)
    }

    pub fn set_enabled(&mut self, key: NodeKey, enabled: bool) -> bool {
        self.with_node(key, |node| node.enabled = enabled)
    }

    pub fn set_drawable(&mut self, key: NodeKey, drawable: Option<Arc<Drawable>>) -> bool {
        self.with_node(key, |node| node.drawable = drawable)
    }

    pub fn set_light(&mut self, key: NodeKey, light: Option<Arc<Light>>) -> bool {
        self.with_node(key, |node| node.light = light)
    }

    fn with_node(&mut self, key: NodeKey, apply: impl FnOnce(&mut Node)) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                apply(node);
                true
            }
            None => false,
        }
    }

    /// Product of the local transforms from the root down to `key`
    pub fn world_matrix(&self, key: NodeKey) -> Option<Mat4> {
        let mut node = self.nodes.get(key)?;
        let mut world = node.local_transform;
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(p)) {
            world = parent.local_transform * world;
            node = parent;
        }
        Some(world)
    }

    /// World-space bounding sphere of the node's drawable
    pub fn bounding_sphere(&self, key: NodeKey) -> Option<BoundingSphere> {
        let drawable = self.nodes.get(key)?.drawable.as_ref()?;
        Some(drawable.bounding_sphere().transformed(&self.world_matrix(key)?))
    }

    // ===== TRAVERSAL =====

    /// Depth-first pre-order walk over enabled nodes
    ///
    /// The visitor receives each node with its world matrix. Returning
    /// false skips that node's children; traversal continues with its
    /// siblings.
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeKey, &Node, &Mat4) -> bool,
    {
        let mut stack: Vec<(NodeKey, Mat4)> =
            self.roots.iter().rev().map(|&k| (k, Mat4::IDENTITY)).collect();

        while let Some((key, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if !node.enabled {
                continue;
            }
            let world = parent_world * node.local_transform;
            if visitor(key, node, &world) {
                stack.extend(node.children.iter().rev().map(|&c| (c, world)));
            }
        }
    }

    // ===== PICKING =====

    /// Nearest drawable hit by a world-space ray
    ///
    /// Invisible drawables are ignored, and so are unclickable ones when
    /// `clickable_only` is set.
    pub fn raycast(&self, ray: &Ray, clickable_only: bool) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;

        self.visit(|key, node, world| {
            let Some(drawable) = &node.drawable else {
                return true;
            };
            if !drawable.is_visible() || (clickable_only && !drawable.is_clickable()) {
                return true;
            }
            let sphere = drawable.bounding_sphere().transformed(world);
            if ray.intersects_sphere(&sphere).is_none() {
                return true;
            }

            let inverse = world.inverse();
            let local_ray = ray.transformed(&inverse);
            let mut query = RayQuery::new(local_ray).with_normal();
            if !drawable.raycast(&mut query) {
                return true;
            }

            let point = world.transform_point3(local_ray.point_at(query.min_distance));
            let distance = point.distance(ray.origin);
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(PickHit {
                    node: key,
                    distance,
                    point,
                    normal: inverse.transpose().transform_vector3(query.normal).normalize_or_zero(),
                    part_index: query.part_index,
                    primitive_index: query.primitive_index,
                });
            }
            true
        });
        best
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
