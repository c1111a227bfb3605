/// Renderer trait - the GPU abstraction everything above draws through

use std::sync::Arc;

use crate::error::Result;
use crate::renderer::{
    Buffer, BufferDesc, ClearFlags, DrawCommand, FrameBuffer, FrameBufferDesc, ShaderProgram,
    ShaderProgramDesc, StateBlock, Texture, TextureDesc, UniformValue, VertexBinding,
    VertexFormat, Viewport,
};

/// Renderer statistics (since creation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Number of draw commands issued
    pub draw_calls: u32,
    /// Number of instanced draw commands issued
    pub instanced_draw_calls: u32,
    /// Number of frame buffer binds
    pub frame_buffer_binds: u32,
}

// ============================================================================
// Renderer trait
// ============================================================================

/// Main renderer trait
///
/// Factory for GPU resources plus the immediate-mode state the render path
/// drives (frame buffer binding, viewport, clears, program/uniform binding,
/// fixed-function state and draws). Implemented by backend renderers; shared as
/// `Arc<Mutex<dyn Renderer>>`.
pub trait Renderer: Send + Sync {
    /// Create a buffer
    ///
    /// # Arguments
    ///
    /// * `desc` - Buffer descriptor
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a texture
    ///
    /// # Arguments
    ///
    /// * `desc` - Texture descriptor
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Compile and link a shader program
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or linking fails.
    fn create_shader_program(&mut self, desc: &ShaderProgramDesc) -> Result<Arc<dyn ShaderProgram>>;

    /// Create a vertex-input binding of `vertex_buffer` laid out as `format`
    fn create_vertex_binding(
        &mut self,
        format: &VertexFormat,
        vertex_buffer: &Arc<dyn Buffer>,
    ) -> Result<Arc<dyn VertexBinding>>;

    /// Create a frame buffer and its attachment textures
    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Arc<dyn FrameBuffer>>;

    /// Bind a frame buffer (None = default/screen frame buffer)
    ///
    /// # Returns
    ///
    /// The previously bound frame buffer
    fn bind_frame_buffer(
        &mut self,
        frame_buffer: Option<Arc<dyn FrameBuffer>>,
    ) -> Option<Arc<dyn FrameBuffer>>;

    /// Currently bound frame buffer (None = default/screen frame buffer)
    fn current_frame_buffer(&self) -> Option<Arc<dyn FrameBuffer>>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clear attachments of the bound frame buffer
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: u32);

    /// Apply fixed-function state
    fn apply_state(&mut self, state: &StateBlock);

    /// Make `program` current
    fn bind_program(&mut self, program: &Arc<dyn ShaderProgram>);

    /// Write a uniform of the currently bound program
    ///
    /// # Returns
    ///
    /// false if the program has no active uniform called `name`
    fn set_uniform(
        &mut self,
        program: &Arc<dyn ShaderProgram>,
        name: &str,
        value: &UniformValue,
    ) -> bool;

    /// Issue a draw
    fn draw(&mut self, command: &DrawCommand) -> Result<()>;

    /// Size of the default frame buffer (window) in pixels
    fn window_size(&self) -> (u32, u32);

    /// Get statistics about the renderer
    fn stats(&self) -> RendererStats;
}
