/// CPU-side byte store mirrored into a lazily (re)created GPU buffer.
///
/// A RenderBuffer tracks a `capacity` (allocated bytes) and a `size` (bytes in
/// use) separately, and two dirty flags:
/// - content-dirty: the bytes changed since the last upload
/// - pointer-dirty: the backing allocation moved, so vertex bindings built on
///   the old allocation must be rebuilt
///
/// Meshes share RenderBuffers between parts, so they are handed around as
/// [`SharedRenderBuffer`].

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::Result;
use crate::renderer::{Buffer, BufferDesc, BufferUsage, Renderer};

/// Default number of spare bytes reserved whenever a buffer has to grow
pub const DEFAULT_GROW_INCREMENT: usize = 1024;

/// RenderBuffer shared between meshes, mesh parts and batches
pub type SharedRenderBuffer = Arc<Mutex<RenderBuffer>>;

/// Lock a shared buffer; a poisoned lock still yields the bytes
pub(crate) fn lock(buffer: &SharedRenderBuffer) -> MutexGuard<'_, RenderBuffer> {
    buffer.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct RenderBuffer {
    usage: BufferUsage,
    dynamic: bool,
    /// Backing store; `storage.len()` is the capacity
    storage: Vec<u8>,
    size: usize,
    grow_increment: usize,
    content_dirty: bool,
    pointer_dirty: bool,
    gpu: Option<Arc<dyn Buffer>>,
}

impl RenderBuffer {
    pub fn new(usage: BufferUsage, dynamic: bool) -> Self {
        Self {
            usage,
            dynamic,
            storage: Vec::new(),
            size: 0,
            grow_increment: DEFAULT_GROW_INCREMENT,
            content_dirty: false,
            pointer_dirty: false,
            gpu: None,
        }
    }

    pub fn shared(self) -> SharedRenderBuffer {
        Arc::new(Mutex::new(self))
    }

    pub fn with_grow_increment(mut self, grow_increment: usize) -> Self {
        self.grow_increment = grow_increment;
        self
    }

    // ===== ACCESSORS =====

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Allocated bytes
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes in use
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn grow_increment(&self) -> usize {
        self.grow_increment
    }

    pub fn is_content_dirty(&self) -> bool {
        self.content_dirty
    }

    pub fn is_pointer_dirty(&self) -> bool {
        self.pointer_dirty
    }

    /// Bytes in use
    pub fn data(&self) -> &[u8] {
        &self.storage[..self.size]
    }

    /// GPU buffer created by the last [`sync`](Self::sync), if any
    pub fn gpu_buffer(&self) -> Option<&Arc<dyn Buffer>> {
        self.gpu.as_ref()
    }

    // ===== MUTATION =====

    /// Reallocate to exactly `capacity` bytes, keeping the leading contents
    ///
    /// Size is clamped to the new capacity. Sets pointer-dirty when the
    /// allocation moved.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity == self.storage.len() {
            return;
        }
        let keep = self.size.min(capacity);
        let mut storage = vec![0u8; capacity];
        storage[..keep].copy_from_slice(&self.storage[..keep]);

        if storage.as_ptr() != self.storage.as_ptr() {
            self.pointer_dirty = true;
        }
        self.storage = storage;
        self.size = keep;
        self.content_dirty = true;
    }

    /// Set the size in use, growing the allocation when needed
    ///
    /// Growing reserves `size + new_size + grow_increment` bytes.
    pub fn resize(&mut self, new_size: usize) {
        if new_size == self.size {
            return;
        }
        if new_size > self.capacity() {
            self.set_capacity(self.size + new_size + self.grow_increment);
        }
        self.size = new_size;
        self.content_dirty = true;
    }

    /// Replace all contents with a copy of `data` (capacity == size afterwards)
    pub fn set_data(&mut self, data: &[u8]) {
        self.set_data_owned(data.to_vec());
    }

    /// Replace all contents, taking ownership of `data`
    pub fn set_data_owned(&mut self, data: Vec<u8>) {
        self.size = data.len();
        self.storage = data;
        self.content_dirty = true;
        self.pointer_dirty = true;
    }

    /// Append bytes, growing by `len + grow_increment` when full
    ///
    /// # Returns
    ///
    /// Byte offset at which `data` was written (the size before the call)
    pub fn add_data(&mut self, data: &[u8]) -> usize {
        let offset = self.size;
        let end = offset + data.len();
        if end > self.capacity() {
            self.set_capacity(end + self.grow_increment);
        }
        self.storage[offset..end].copy_from_slice(data);
        self.size = end;
        self.content_dirty = true;
        offset
    }

    /// Overwrite bytes in place; size extends to cover the written range
    ///
    /// # Panics
    ///
    /// Panics if `offset + data.len()` exceeds the capacity.
    pub fn update_data(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        assert!(
            end <= self.capacity(),
            "RenderBuffer::update_data out of range: {}..{} exceeds capacity {}",
            offset,
            end,
            self.capacity()
        );
        self.storage[offset..end].copy_from_slice(data);
        self.size = self.size.max(end);
        self.content_dirty = true;
    }

    /// Drop contents but keep the allocation
    pub fn clear(&mut self) {
        if self.size != 0 {
            self.size = 0;
            self.content_dirty = true;
        }
    }

    // ===== GPU SYNC =====

    /// Bring the GPU buffer up to date
    ///
    /// Creates (or recreates, when too small) the GPU buffer and uploads the
    /// bytes in use if content-dirty. Content-dirty is cleared only after a
    /// successful upload.
    ///
    /// # Returns
    ///
    /// true when bindings referring to this buffer must be rebuilt (the GPU
    /// buffer was recreated or the allocation moved)
    pub fn sync(&mut self, renderer: &mut dyn Renderer) -> Result<bool> {
        let mut rebind = self.pointer_dirty;

        let too_small = match &self.gpu {
            Some(gpu) => gpu.size() < self.capacity() as u64,
            None => true,
        };
        if too_small && self.capacity() > 0 {
            let gpu = renderer.create_buffer(BufferDesc {
                size: self.capacity() as u64,
                usage: self.usage,
                dynamic: self.dynamic,
            })?;
            crate::engine_trace!("nova3d::RenderBuffer",
                "Allocated {:?} GPU buffer of {} bytes", self.usage, self.capacity());
            self.gpu = Some(gpu);
            self.content_dirty = true;
            rebind = true;
        }

        if self.content_dirty {
            if let Some(gpu) = &self.gpu {
                if self.size > 0 {
                    gpu.update(0, &self.storage[..self.size])?;
                }
            }
            self.content_dirty = false;
        }

        self.pointer_dirty = false;
        Ok(rebind)
    }
}

#[cfg(test)]
#[path = "render_buffer_tests.rs"]
mod tests;
