//! Render module
//!
//! Per-frame draw calls, the render data manager that fills and sorts them,
//! draw submission, and the stage pipeline (RenderPass, RenderStageGroup,
//! RenderPath) with its frame buffer pool.

pub mod draw_call;
pub mod frame_params;
pub mod submit;
pub mod render_queue;
pub mod frame_buffer_pool;
pub mod render_pass;
pub mod render_path;

pub use draw_call::{DrawCall, DrawSource, DrawTarget, RenderInfo, RenderLayer};
pub use frame_params::{FrameParams, LightParams};
pub use submit::{submit_draw_call, submit_draw_calls, ScopedStateOverride, SubmitOptions};
pub use render_queue::{LightInstance, QueueStats, RenderDataManager};
pub use frame_buffer_pool::{parse_texture_name, Attachment, FrameBufferPool};
pub use render_pass::{
    ClearDesc, Destination, DrawType, RenderPass, RenderPassDesc, RenderStage, RenderStageGroup,
    ResizeContext, StageContext, StageOutput,
};
pub use render_path::{FrameStats, PipelineStyle, RenderPath, RenderPathConfig, ShaderPaths};
