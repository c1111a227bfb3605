/// Transient per-frame draw descriptions

use std::sync::Arc;
use glam::{Mat4, Vec3};

use crate::renderer::DrawCommand;
use crate::resource::{Material, MeshSkin};
use crate::render::frame_params::FrameParams;
use crate::scene::NodeKey;

/// Bucket a draw call is sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RenderLayer {
    #[default]
    Opaque = 0,
    Custom = 1,
    Transparent = 2,
    Overlay = 3,
}

impl RenderLayer {
    pub const COUNT: usize = 4;
    pub const ALL: [RenderLayer; 4] = [
        RenderLayer::Opaque,
        RenderLayer::Custom,
        RenderLayer::Transparent,
        RenderLayer::Overlay,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Where a draw call comes from: owning node, transform and drawable tags
#[derive(Clone)]
pub struct DrawSource {
    pub node: Option<NodeKey>,
    pub world: Mat4,
    pub render_layer: RenderLayer,
    pub light_mask: u32,
    /// World-space point the camera distance is measured to
    pub anchor: Vec3,
    pub skin: Option<Arc<MeshSkin>>,
}

impl DrawSource {
    /// Source for a draw with no scene node
    pub fn detached(world: Mat4, render_layer: RenderLayer) -> Self {
        Self {
            node: None,
            world,
            render_layer,
            light_mask: u32::MAX,
            anchor: world.w_axis.truncate(),
            skin: None,
        }
    }
}

/// One draw of one material pass
#[derive(Clone)]
pub struct DrawCall {
    pub command: DrawCommand,
    pub material: Arc<Material>,
    pub source: DrawSource,
    /// Filled by `RenderDataManager::end_fill`
    pub distance_to_camera: f32,
}

/// Collects draw calls while drawables are traversed
#[derive(Default)]
pub struct RenderInfo {
    pub draw_calls: Vec<DrawCall>,
    /// Only the first pass of each material chain is emitted
    pub wireframe: bool,
    /// Depth-only rendering (shadow maps, depth pre-pass): first pass only
    pub depth_pass: bool,
    /// Used for level-of-detail selection while drawing
    pub camera_position: Vec3,
}

impl RenderInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when material chains collapse to their first pass
    pub fn first_pass_only(&self) -> bool {
        self.wireframe || self.depth_pass
    }
}

/// Destination of a drawable's draw calls
pub enum DrawTarget<'a> {
    /// Queue for sorted submission later in the frame
    Queue(&'a mut RenderInfo),
    /// Submit right away with the given frame values
    Immediate(&'a FrameParams),
}

impl DrawTarget<'_> {
    /// Shorter-lived copy of this target, for drawing several children
    pub fn reborrow(&mut self) -> DrawTarget<'_> {
        match self {
            DrawTarget::Queue(info) => DrawTarget::Queue(info),
            DrawTarget::Immediate(frame) => DrawTarget::Immediate(frame),
        }
    }

    pub fn camera_position(&self) -> Vec3 {
        match self {
            DrawTarget::Queue(info) => info.camera_position,
            DrawTarget::Immediate(frame) => frame.camera_position,
        }
    }

    pub fn first_pass_only(&self) -> bool {
        match self {
            DrawTarget::Queue(info) => info.first_pass_only(),
            DrawTarget::Immediate(_) => false,
        }
    }
}
