//! # Rime Graphics
//!
//! Backend-agnostic render resources: shaders, materials and GPU buffers.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Shader`] - compiled, reflected shader programs (GLSL or WGSL via naga)
//! - [`Material`] / [`MaterialInstance`] - CPU mirrors of the `Material`
//!   uniform block with per-instance overrides
//! - [`Texture`], [`VertexBuffer`], [`IndexBuffer`] - GPU resources with a
//!   CPU copy
//! - [`BindContext`] - the explicit binding state threaded through every
//!   `bind` call
//! - Multiple backend support: wgpu and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use rime_graphics::{GraphicsConfig, GraphicsDevice, ShaderStage};
//!
//! let device = GraphicsDevice::new(GraphicsConfig::from_env())?;
//! let shader = device.load_shader_stages("shaders/lit.glsl", &[
//!     ShaderStage::Vertex,
//!     ShaderStage::Fragment,
//! ]);
//! let material = device.create_material(&shader)?;
//! material.set("Roughness", 0.5f32)?;
//!
//! let instance = device.create_material_instance(&material);
//! instance.set("Albedo", [1.0f32, 0.0, 0.0])?;
//!
//! let mut ctx = device.create_bind_context();
//! instance.bind(&mut ctx)?;
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod materials;
pub mod resources;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use backend::{GpuBackend, create_backend, dummy::DummyBackend};
pub use config::{BackendType, GraphicsConfig, WgpuBackendType};
pub use context::{BindCommand, BindContext, BindState, UploadOrigin};
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::GraphicsError;
pub use materials::{MAX_TEXTURE_SLOTS, Material, MaterialInstance, UniformValue};
pub use resources::{IndexBuffer, Texture, TextureLock, VertexBuffer};
pub use shader::reflection::{ShaderReflection, UniformBlock, UniformDecl, UniformType};
pub use shader::{MATERIAL_BLOCK, Shader, ShaderLanguage, ShaderSource, ShaderStage};
pub use types::{
    BufferDescriptor, BufferUsage, TextureDescriptor, TextureDimension, TextureFormat, TextureWrap,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    rime_core::init();
    log::info!("Rime Graphics v{} initialized", VERSION);
}
