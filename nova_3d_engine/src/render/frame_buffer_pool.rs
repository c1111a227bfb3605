/// Name-keyed pool of frame buffers shared by the stages of a RenderPath.
///
/// Textures are published as `"<buffer>.<attachment>"` (`"main.0"`,
/// `"gbuffer.2"`) and `"<buffer>.depth"`. Buffers allocated by stages are
/// released wholesale on resize; buffers registered from outside survive.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::engine_err;
use crate::error::Result;
use crate::renderer::{FrameBuffer, FrameBufferDesc, Renderer, Texture, TextureFormat};

struct PoolEntry {
    frame_buffer: Arc<dyn FrameBuffer>,
    external: bool,
}

/// Attachment named by a pool texture name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Color(usize),
    Depth,
}

/// Split `"<buffer>.<attachment>"`; a bare name has no attachment
pub fn parse_texture_name(name: &str) -> (&str, Option<Attachment>) {
    match name.rsplit_once('.') {
        Some((buffer, "depth")) => (buffer, Some(Attachment::Depth)),
        Some((buffer, index)) => match index.parse::<usize>() {
            Ok(i) => (buffer, Some(Attachment::Color(i))),
            Err(_) => (name, None),
        },
        None => (name, None),
    }
}

#[derive(Default)]
pub struct FrameBufferPool {
    entries: FxHashMap<String, PoolEntry>,
    allocations: u32,
}

impl FrameBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or recreate) the pool-owned frame buffer `name`
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is registered externally or the renderer
    /// fails to create the buffer.
    pub fn allocate(
        &mut self,
        renderer: &mut dyn Renderer,
        name: &str,
        width: u32,
        height: u32,
        color_formats: &[TextureFormat],
        depth_format: Option<TextureFormat>,
    ) -> Result<Arc<dyn FrameBuffer>> {
        if self.entries.get(name).is_some_and(|e| e.external) {
            return Err(engine_err!("nova3d::FrameBufferPool",
                "Frame buffer '{}' is registered externally and cannot be reallocated", name));
        }

        let desc = FrameBufferDesc {
            name: name.to_string(),
            width: width.max(1),
            height: height.max(1),
            color_formats: color_formats.to_vec(),
            depth_format,
        };
        let frame_buffer = renderer.create_frame_buffer(&desc)?;
        self.allocations += 1;
        crate::engine_debug!("nova3d::FrameBufferPool",
            "Allocated frame buffer '{}' ({}x{}, {} color)", name, desc.width, desc.height, color_formats.len());

        self.entries.insert(
            name.to_string(),
            PoolEntry { frame_buffer: Arc::clone(&frame_buffer), external: false },
        );
        Ok(frame_buffer)
    }

    /// Publish a frame buffer created elsewhere under `name`
    pub fn register(&mut self, name: &str, frame_buffer: Arc<dyn FrameBuffer>) {
        self.entries.insert(name.to_string(), PoolEntry { frame_buffer, external: true });
    }

    /// Remove `name`, pool-owned or external
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn FrameBuffer>> {
        self.entries.remove(name).map(|e| e.frame_buffer)
    }

    /// Drop every pool-owned frame buffer
    pub fn release(&mut self) {
        self.entries.retain(|_, entry| entry.external);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.external)
    }

    /// Number of frame buffers created through [`allocate`](Self::allocate)
    pub fn allocation_count(&self) -> u32 {
        self.allocations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Externally registered frame buffers with their names
    pub fn externals(&self) -> impl Iterator<Item = (&str, &Arc<dyn FrameBuffer>)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.external)
            .map(|(name, e)| (name.as_str(), &e.frame_buffer))
    }

    // ===== LOOKUP =====

    /// # Errors
    ///
    /// Returns an error if nothing is registered under `name`.
    pub fn frame_buffer(&self, name: &str) -> Result<Arc<dyn FrameBuffer>> {
        match self.entries.get(name) {
            Some(entry) => Ok(Arc::clone(&entry.frame_buffer)),
            None => Err(engine_err!("nova3d::FrameBufferPool", "Unknown frame buffer '{}'", name)),
        }
    }

    /// Texture published as `"<buffer>.<index>"` or `"<buffer>.depth"`
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed, the buffer is unknown or
    /// it has no such attachment.
    pub fn texture(&self, name: &str) -> Result<Arc<dyn Texture>> {
        let (buffer, attachment) = parse_texture_name(name);
        let Some(attachment) = attachment else {
            return Err(engine_err!("nova3d::FrameBufferPool",
                "Texture name '{}' does not name an attachment", name));
        };
        let frame_buffer = self.frame_buffer(buffer)?;
        let texture = match attachment {
            Attachment::Color(index) => frame_buffer.color_attachment(index),
            Attachment::Depth => frame_buffer.depth_attachment(),
        };
        match texture {
            Some(texture) => Ok(texture),
            None => Err(engine_err!("nova3d::FrameBufferPool",
                "Frame buffer '{}' has no attachment for '{}'", buffer, name)),
        }
    }
}

#[cfg(test)]
#[path = "frame_buffer_pool_tests.rs"]
mod tests;
