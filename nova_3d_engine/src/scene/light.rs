/// Light components attached to scene nodes.
///
/// A light's position and direction come from its node: position is the
/// node's world translation and lights shine down the node's -Z axis.

use glam::{Mat4, Vec3};

/// Default cascade count of shadowed directional lights
pub const DEFAULT_CASCADE_COUNT: u32 = 4;

/// Default shadow map edge length in texels
pub const DEFAULT_SHADOW_MAP_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point { range: f32 },
    Spot { range: f32, inner_angle: f32, outer_angle: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Only directional lights cast (cascaded) shadows
    pub casts_shadows: bool,
    pub cascade_count: u32,
    pub shadow_map_size: u32,
    /// Light groups this light belongs to, matched against drawable light masks
    pub light_mask: u32,
}

impl Light {
    pub fn directional(color: Vec3) -> Self {
        Self::with_kind(LightKind::Directional, color)
    }

    pub fn point(color: Vec3, range: f32) -> Self {
        Self::with_kind(LightKind::Point { range }, color)
    }

    pub fn spot(color: Vec3, range: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self::with_kind(LightKind::Spot { range, inner_angle, outer_angle }, color)
    }

    fn with_kind(kind: LightKind, color: Vec3) -> Self {
        Self {
            kind,
            color,
            intensity: 1.0,
            casts_shadows: false,
            cascade_count: DEFAULT_CASCADE_COUNT,
            shadow_map_size: DEFAULT_SHADOW_MAP_SIZE,
            light_mask: u32::MAX,
        }
    }

    /// Enable cascaded shadows with `cascade_count` cascades of `map_size`² texels
    pub fn with_shadows(mut self, cascade_count: u32, map_size: u32) -> Self {
        self.casts_shadows = true;
        self.cascade_count = cascade_count.max(1);
        self.shadow_map_size = map_size;
        self
    }

    pub fn with_light_mask(mut self, mask: u32) -> Self {
        self.light_mask = mask;
        self
    }

    /// True when this light lights drawables tagged with `drawable_mask`
    pub fn lights(&self, drawable_mask: u32) -> bool {
        self.light_mask & drawable_mask != 0
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional)
    }

    /// Color scaled by intensity
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Normalized world direction the light shines in, for a node at `world`
    pub fn direction(world: &Mat4) -> Vec3 {
        (-world.z_axis.truncate()).normalize_or(Vec3::NEG_Z)
    }
}
