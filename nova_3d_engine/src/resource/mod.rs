//! Resource module
//!
//! CPU-side geometry and shading resources: render buffers, meshes, batches,
//! materials and the shader program cache.

pub mod render_buffer;
pub mod mesh;
pub mod mesh_batch;
pub mod mesh_skin;
pub mod material;
pub mod shader_cache;

pub use render_buffer::{RenderBuffer, SharedRenderBuffer, DEFAULT_GROW_INCREMENT};
pub use mesh::{Mesh, MeshBounds, RayQuery};
pub use mesh_batch::MeshBatch;
pub use mesh_skin::MeshSkin;
pub use material::{AutoBinding, Material, MaterialBinding, MaterialPasses};
pub use shader_cache::ShaderCache;
