/// Viewports, clears and draw commands

use std::sync::Arc;
use bitflags::bitflags;
use crate::renderer::{Buffer, IndexFormat, PrimitiveType};

/// Viewport for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X offset
    pub x: f32,
    /// Y offset
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Minimum depth (typically 0.0)
    pub min_depth: f32,
    /// Maximum depth (typically 1.0)
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a `width` x `height` target from the origin
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0.0 { self.width / self.height } else { 1.0 }
    }
}

bitflags! {
    /// Attachments to clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const COLOR_DEPTH = Self::COLOR.bits() | Self::DEPTH.bits();
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// Backend vertex-input binding (a VAO in GL terms)
///
/// Binds one vertex buffer with a given vertex format. Rebuilt when the
/// underlying buffer is reallocated or the format changes.
pub trait VertexBinding: Send + Sync {
    /// Vertex stride in bytes
    fn stride(&self) -> u32;
}

/// A fully resolved draw: buffers, range and instancing
#[derive(Clone)]
pub struct DrawCommand {
    pub vertex_binding: Arc<dyn VertexBinding>,
    pub vertex_buffer: Arc<dyn Buffer>,
    /// Index buffer and its element format (None = non-indexed draw)
    pub index_buffer: Option<(Arc<dyn Buffer>, IndexFormat)>,
    pub primitive: PrimitiveType,
    /// First index (indexed) or first vertex (non-indexed)
    pub first: u32,
    /// Index count (indexed) or vertex count (non-indexed)
    pub count: u32,
    /// Per-instance matrix buffer (None = not instanced)
    pub instance_buffer: Option<Arc<dyn Buffer>>,
    /// Instance count (1 when not instanced)
    pub instance_count: u32,
}

impl DrawCommand {
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn is_instanced(&self) -> bool {
        self.instance_buffer.is_some()
    }
}
