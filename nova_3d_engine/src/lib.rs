/*!
# Nova 3D Engine

Core of a real-time 3D rendering engine.

The crate never talks to a graphics API directly: everything it needs from the
GPU goes through the [`Renderer`](renderer::Renderer) trait, implemented by a
backend crate. On top of it the core provides meshes and materials, a scene
graph, render queues with culling, sorting and instancing, and a stage
pipeline that renders a frame end to end.

## Architecture

- **RenderBuffer / Mesh / MeshBatch**: CPU-side geometry mirrored lazily to GPU buffers
- **Material**: shader program, parameters, render state and optional next pass
- **Drawable**: what a scene node draws (model, batch, instanced, group, LOD)
- **RenderDataManager**: fills per-layer render queues from a scene and sorts them
- **RenderPass / RenderStageGroup**: one step of a frame, reading and writing pool buffers
- **RenderPath**: owns the stages, the frame buffer pool and the shadow cache
- **Shadow**: cascaded shadow maps of directional lights
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod math;
pub mod renderer;
pub mod resource;
pub mod scene;
pub mod render;
pub mod shadow;

// Main nova3d namespace module
pub mod nova3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Renderer trait
    pub use crate::renderer::Renderer;

    // Frame entry point
    pub use crate::render::{FrameStats, PipelineStyle, RenderPath, RenderPathConfig};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod math {
        pub use crate::math::*;
    }

    // GPU abstraction types
    pub mod gpu {
        pub use crate::renderer::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod render {
        pub use crate::render::*;
    }

    pub mod shadow {
        pub use crate::shadow::*;
    }
}

// Re-export math library at crate root
pub use glam;
