//! GPU backend abstraction layer.
//!
//! Every native API sits behind the [`GpuBackend`] trait. Higher layers hold
//! opaque handle enums ([`GpuProgram`], [`GpuBuffer`], [`GpuTexture`]) with
//! one variant per backend, and release them by dropping.
//!
//! # Available Backends
//!
//! - `dummy` (always built): no-op backend for tests and headless tools
//! - `wgpu-backend`: cross-platform backend using wgpu
//!
//! The backend is chosen once at startup from [`GraphicsConfig`] by
//! [`create_backend`].

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub mod dummy;

use std::sync::Arc;

use crate::config::{BackendType, GraphicsConfig};
use crate::error::GraphicsError;
use crate::shader::CompiledStage;
use crate::shader::reflection::{ShaderReflection, UniformBlock};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Handle to a linked shader program.
#[derive(Clone)]
pub enum GpuProgram {
    /// Dummy backend (nothing compiled)
    Dummy,
    /// wgpu backend program
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu_backend::WgpuProgram>),
}

impl std::fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuProgram::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(program) => f.debug_tuple("GpuProgram::Wgpu").field(program).finish(),
        }
    }
}

/// Handle to a GPU buffer resource.
#[derive(Clone)]
pub enum GpuBuffer {
    /// Dummy backend (no GPU allocation)
    Dummy,
    /// wgpu backend buffer
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::Buffer),
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuBuffer::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(buffer) => f.debug_tuple("GpuBuffer::Wgpu").field(buffer).finish(),
        }
    }
}

/// Handle to a GPU texture resource.
#[derive(Clone)]
pub enum GpuTexture {
    /// Dummy backend (no GPU allocation)
    Dummy,
    /// wgpu backend texture
    #[cfg(feature = "wgpu-backend")]
    Wgpu {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        sampler: wgpu::Sampler,
    },
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuTexture::Dummy"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu { texture, view, .. } => f
                .debug_struct("GpuTexture::Wgpu")
                .field("texture", texture)
                .field("view", view)
                .finish_non_exhaustive(),
        }
    }
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// Bind calls describe the state for the next draw; the draw submission
/// loop that consumes that state lives outside this crate.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Link compiled stages into a program with storage for its uniform blocks.
    fn create_program(
        &self,
        label: &str,
        stages: &[CompiledStage],
        reflection: &ShaderReflection,
    ) -> Result<GpuProgram, GraphicsError>;

    /// Make a program current.
    fn bind_program(&self, program: &GpuProgram);

    /// Upload the contents of one uniform block of a program.
    ///
    /// `data` is exactly `block.size()` bytes.
    fn write_uniform_block(&self, program: &GpuProgram, block: &UniformBlock, data: &[u8]);

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Write data to a buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    /// Make a vertex buffer current.
    fn bind_vertex_buffer(&self, buffer: &GpuBuffer);

    /// Make an index buffer current.
    fn bind_index_buffer(&self, buffer: &GpuBuffer);

    /// Create a texture resource.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError>;

    /// Upload one layer of pixel data laid out as `descriptor.format`.
    fn write_texture(
        &self,
        texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        layer: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError>;

    /// Bind a texture to a slot.
    fn bind_texture(&self, texture: &GpuTexture, slot: u32);
}

/// Create the backend selected by `config`.
///
/// [`BackendType::Auto`] falls back to the dummy backend when no GPU backend
/// can be created.
pub fn create_backend(config: &GraphicsConfig) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match config.backend {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
        BackendType::Wgpu => create_wgpu_backend(config),
        BackendType::Auto => match create_wgpu_backend(config) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                log::warn!("Failed to create wgpu backend: {}", e);
                log::info!("Using dummy backend");
                Ok(Arc::new(dummy::DummyBackend::new()))
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend(config: &GraphicsConfig) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    let backend = wgpu_backend::WgpuBackend::with_config(config)?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend(_config: &GraphicsConfig) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Err(GraphicsError::InitializationFailed(
        "wgpu backend not compiled in (enable the `wgpu-backend` feature)".to_string(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}
