/// Renderer module - GPU abstraction traits and value types

// Module declarations
pub mod renderer;
pub mod buffer;
pub mod texture;
pub mod shader;
pub mod frame_buffer;
pub mod state;
pub mod vertex_format;
pub mod command;

#[cfg(test)]
pub mod mock_renderer;

// Re-export everything
pub use renderer::*;
pub use buffer::*;
pub use texture::*;
pub use shader::*;
pub use frame_buffer::*;
pub use state::*;
pub use vertex_format::*;
pub use command::*;
