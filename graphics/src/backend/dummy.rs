//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but provides
//! a valid implementation for exercising shaders, materials and resources
//! without requiring GPU hardware.

use crate::error::GraphicsError;
use crate::shader::CompiledStage;
use crate::shader::reflection::{ShaderReflection, UniformBlock};
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::{GpuBackend, GpuBuffer, GpuProgram, GpuTexture};

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend;

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_program(
        &self,
        label: &str,
        stages: &[CompiledStage],
        reflection: &ShaderReflection,
    ) -> Result<GpuProgram, GraphicsError> {
        log::trace!(
            "DummyBackend: creating program {:?} ({} stages, {} uniform blocks)",
            label,
            stages.len(),
            reflection.uniform_blocks().len()
        );
        Ok(GpuProgram::Dummy)
    }

    fn bind_program(&self, _program: &GpuProgram) {
        log::trace!("DummyBackend: binding program");
    }

    fn write_uniform_block(&self, _program: &GpuProgram, block: &UniformBlock, data: &[u8]) {
        log::trace!(
            "DummyBackend: writing uniform block {:?} ({} bytes)",
            block.name(),
            data.len()
        );
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(GpuBuffer::Dummy)
    }

    fn write_buffer(&self, _buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        log::trace!(
            "DummyBackend: writing {} bytes at offset {}",
            data.len(),
            offset
        );
    }

    fn bind_vertex_buffer(&self, _buffer: &GpuBuffer) {
        log::trace!("DummyBackend: binding vertex buffer");
    }

    fn bind_index_buffer(&self, _buffer: &GpuBuffer) {
        log::trace!("DummyBackend: binding index buffer");
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.dimension
        );
        Ok(GpuTexture::Dummy)
    }

    fn write_texture(
        &self,
        _texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        layer: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if data.len() != descriptor.layer_size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture layer data is {} bytes, expected {}",
                data.len(),
                descriptor.layer_size()
            )));
        }
        log::trace!(
            "DummyBackend: writing texture {:?} layer {} ({} bytes)",
            descriptor.label,
            layer,
            data.len()
        );
        Ok(())
    }

    fn bind_texture(&self, _texture: &GpuTexture, slot: u32) {
        log::trace!("DummyBackend: binding texture to slot {}", slot);
    }
}
