/// GPU buffers backing RenderBuffers and instance matrices

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Per-instance world matrices
    Instance,
    Uniform,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Bytes to allocate
    pub size: u64,
    pub usage: BufferUsage,
    /// Contents are rewritten often (dynamic meshes, batches, instances)
    pub dynamic: bool,
}

/// A backend buffer; released with its last `Arc`
pub trait Buffer: Send + Sync {
    /// Write `data` at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns an error when the write would run past the end of the buffer.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;
}
