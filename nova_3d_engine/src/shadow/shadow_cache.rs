/// Per-light shadow maps, rebuilt every frame.
///
/// A new map is built from the lights of the frame, reusing the previous
/// frame's [`Shadow`] of a light when its cascade count and map size are
/// unchanged. The new map replaces the old one in one step; shadows of lights
/// that disappeared are dropped with it.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::renderer::Renderer;
use crate::render::frame_params::FrameParams;
use crate::render::render_queue::LightInstance;
use crate::resource::Material;
use crate::scene::{Camera, NodeKey, Scene};
use crate::shadow::shadow::Shadow;

pub struct ShadowCache {
    shadows: FxHashMap<NodeKey, Shadow>,
    /// Shadowed lights in traversal order
    order: Vec<NodeKey>,
    max_cascades: u32,
    max_map_size: u32,
}

impl Default for ShadowCache {
    fn default() -> Self {
        Self {
            shadows: FxHashMap::default(),
            order: Vec::new(),
            max_cascades: u32::MAX,
            max_map_size: u32::MAX,
        }
    }
}

impl ShadowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the cascade count and map size lights ask for
    pub fn with_limits(mut self, max_cascades: u32, max_map_size: u32) -> Self {
        self.set_limits(max_cascades, max_map_size);
        self
    }

    pub fn set_limits(&mut self, max_cascades: u32, max_map_size: u32) {
        self.max_cascades = max_cascades.max(1);
        self.max_map_size = max_map_size.max(1);
    }

    /// Rebuild the shadows of every shadow-casting directional light
    ///
    /// # Returns
    ///
    /// Number of shadow caster draw calls issued
    ///
    /// # Errors
    ///
    /// Returns the first creation or draw error. The cache is left as it was
    /// before the call in that case.
    pub fn update(
        &mut self,
        renderer: &mut dyn Renderer,
        scene: &Scene,
        camera: &Camera,
        lights: &[LightInstance],
        depth_material: &Arc<Material>,
    ) -> Result<u32> {
        let mut previous = std::mem::take(&mut self.shadows);
        let mut next = ShadowCache::new().with_limits(self.max_cascades, self.max_map_size);

        let result = next.build(renderer, scene, camera, lights, depth_material, &mut previous);
        let casters = match result {
            Ok(casters) => casters,
            Err(e) => {
                previous.extend(next.shadows);
                self.shadows = previous;
                return Err(e);
            }
        };

        if !previous.is_empty() {
            crate::engine_debug!("nova3d::ShadowCache", "Released {} stale shadow(s)", previous.len());
        }
        *self = next;
        Ok(casters)
    }

    fn build(
        &mut self,
        renderer: &mut dyn Renderer,
        scene: &Scene,
        camera: &Camera,
        lights: &[LightInstance],
        depth_material: &Arc<Material>,
        previous: &mut FxHashMap<NodeKey, Shadow>,
    ) -> Result<u32> {
        let mut casters = 0;
        for instance in lights {
            let light = &instance.light;
            if !light.is_directional() || !light.casts_shadows || self.shadows.contains_key(&instance.node) {
                continue;
            }
            let cascade_count = light.cascade_count.clamp(1, self.max_cascades);
            let map_size = light.shadow_map_size.clamp(1, self.max_map_size);
            let mut shadow = match previous.remove(&instance.node) {
                Some(shadow) if shadow.cascade_count() == cascade_count && shadow.map_size() == map_size => shadow,
                _ => Shadow::new(renderer, &format!("shadow{}", self.order.len()), cascade_count, map_size)?,
            };
            shadow.update(camera, &instance.world);
            let drawn = shadow.draw(renderer, scene, depth_material);
            self.shadows.insert(instance.node, shadow);
            self.order.push(instance.node);
            casters += drawn?;
        }
        Ok(casters)
    }

    pub fn shadow(&self, light_node: NodeKey) -> Option<&Shadow> {
        self.shadows.get(&light_node)
    }

    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }

    pub fn clear(&mut self) {
        self.shadows.clear();
        self.order.clear();
    }

    /// Publish the first shadowed light's cascades to materials
    pub fn apply_to_frame(&self, frame: &mut FrameParams) {
        let Some(shadow) = self.order.first().and_then(|key| self.shadows.get(key)) else {
            return;
        };
        frame.shadow_matrices = shadow.matrices();
        frame.cascade_distances = shadow.distances();
        frame.shadow_maps = shadow.depth_maps();
    }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
