//! Vertex and index buffers.
//!
//! Both keep a CPU copy of their contents next to the GPU allocation. Setting
//! data of a different size resizes the CPU copy and recreates the GPU buffer.

use std::sync::Arc;

use parking_lot::Mutex;
use rime_core::buffer::Buffer;

use crate::backend::{GpuBackend, GpuBuffer};
use crate::context::BindContext;
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, BufferId, BufferUsage};

struct BufferState {
    data: Buffer,
    gpu: GpuBuffer,
}

/// Shared storage behind [`VertexBuffer`] and [`IndexBuffer`].
struct GpuDataBuffer {
    id: BufferId,
    label: Option<String>,
    usage: BufferUsage,
    backend: Arc<dyn GpuBackend>,
    state: Mutex<BufferState>,
}

impl GpuDataBuffer {
    fn new(
        backend: Arc<dyn GpuBackend>,
        label: Option<String>,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<Self, GraphicsError> {
        let gpu = create_gpu_buffer(backend.as_ref(), label.as_deref(), usage, data.len())?;
        if !data.is_empty() {
            backend.write_buffer(&gpu, 0, data);
        }
        Ok(Self {
            id: BufferId::next(),
            label,
            usage,
            backend,
            state: Mutex::new(BufferState {
                data: Buffer::from_slice(data),
                gpu,
            }),
        })
    }

    fn set_data(&self, data: &[u8]) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        if state.data.size() != data.len() {
            log::trace!(
                "Buffer {}: resizing {} -> {} bytes",
                self.id,
                state.data.size(),
                data.len()
            );
            state.gpu = create_gpu_buffer(
                self.backend.as_ref(),
                self.label.as_deref(),
                self.usage,
                data.len(),
            )?;
            state.data.allocate(data.len());
        }
        if data.is_empty() {
            return Ok(());
        }
        state.data.write(data, 0)?;
        self.backend.write_buffer(&state.gpu, 0, data);
        Ok(())
    }

    fn size(&self) -> usize {
        self.state.lock().data.size()
    }

    fn data(&self) -> Buffer {
        Buffer::copy(&self.state.lock().data)
    }

    fn gpu(&self) -> GpuBuffer {
        self.state.lock().gpu.clone()
    }
}

fn create_gpu_buffer(
    backend: &dyn GpuBackend,
    label: Option<&str>,
    usage: BufferUsage,
    size: usize,
) -> Result<GpuBuffer, GraphicsError> {
    let mut descriptor = BufferDescriptor::new(size as u64, usage | BufferUsage::COPY_DST);
    if let Some(label) = label {
        descriptor = descriptor.with_label(label);
    }
    backend.create_buffer(&descriptor)
}

/// A buffer of vertex data.
///
/// Created by [`GraphicsDevice::create_vertex_buffer`].
///
/// [`GraphicsDevice::create_vertex_buffer`]: crate::GraphicsDevice::create_vertex_buffer
pub struct VertexBuffer {
    inner: GpuDataBuffer,
}

impl VertexBuffer {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        label: Option<String>,
        data: &[u8],
    ) -> Result<Self, GraphicsError> {
        Ok(Self {
            inner: GpuDataBuffer::new(backend, label, BufferUsage::VERTEX, data)?,
        })
    }

    /// Unique identifier.
    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    /// Debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Replace the contents, resizing when the length changes.
    pub fn set_data(&self, data: &[u8]) -> Result<(), GraphicsError> {
        self.inner.set_data(data)
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Copy of the CPU-side contents.
    pub fn data(&self) -> Buffer {
        self.inner.data()
    }

    /// Make this the current vertex buffer.
    pub fn bind(&self, ctx: &mut BindContext) {
        ctx.bind_vertex_buffer(self.inner.id, &self.inner.gpu());
    }
}

/// A buffer of `u32` indices.
///
/// Created by [`GraphicsDevice::create_index_buffer`].
///
/// [`GraphicsDevice::create_index_buffer`]: crate::GraphicsDevice::create_index_buffer
pub struct IndexBuffer {
    inner: GpuDataBuffer,
}

impl IndexBuffer {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        label: Option<String>,
        indices: &[u32],
    ) -> Result<Self, GraphicsError> {
        Ok(Self {
            inner: GpuDataBuffer::new(
                backend,
                label,
                BufferUsage::INDEX,
                bytemuck::cast_slice(indices),
            )?,
        })
    }

    /// Unique identifier.
    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    /// Debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Replace the indices, resizing when the count changes.
    pub fn set_data(&self, indices: &[u32]) -> Result<(), GraphicsError> {
        self.inner.set_data(bytemuck::cast_slice(indices))
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Number of indices.
    pub fn count(&self) -> usize {
        self.size() / std::mem::size_of::<u32>()
    }

    /// Copy of the CPU-side contents.
    pub fn data(&self) -> Buffer {
        self.inner.data()
    }

    /// Make this the current index buffer.
    pub fn bind(&self, ctx: &mut BindContext) {
        ctx.bind_index_buffer(self.inner.id, &self.inner.gpu());
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("id", &self.inner.id)
            .field("size", &self.size())
            .field("label", &self.inner.label)
            .finish()
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("id", &self.inner.id)
            .field("count", &self.count())
            .field("label", &self.inner.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(VertexBuffer: Send, Sync);
static_assertions::assert_impl_all!(IndexBuffer: Send, Sync);
