/// Off-screen frame buffers

use std::sync::Arc;
use crate::renderer::{Texture, TextureFormat};

/// Descriptor for creating a frame buffer with its attachments
#[derive(Debug, Clone)]
pub struct FrameBufferDesc {
    /// Debug/lookup name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// One color attachment per entry (may be empty for depth-only targets)
    pub color_formats: Vec<TextureFormat>,
    /// Optional depth (or depth/stencil) attachment
    pub depth_format: Option<TextureFormat>,
}

/// Frame buffer resource
///
/// Owns its attachment textures; they stay alive as long as someone holds
/// either the frame buffer or the texture itself.
pub trait FrameBuffer: Send + Sync {
    fn name(&self) -> &str;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Number of color attachments
    fn color_attachment_count(&self) -> usize;

    /// Color attachment at `index`, if any
    fn color_attachment(&self, index: usize) -> Option<Arc<dyn Texture>>;

    /// Depth attachment, if any
    fn depth_attachment(&self) -> Option<Arc<dyn Texture>>;
}
