//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12 and GL. wgpu has no global binding state, so bind
//! calls update a [`WgpuBindState`] that the draw submission loop reads
//! when it encodes the next draw.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use rime_core::texture::{TextureFormat, TextureWrap, expand_rgb_to_rgba};

use crate::config::GraphicsConfig;
use crate::error::GraphicsError;
use crate::shader::reflection::{ShaderReflection, UniformBlock};
use crate::shader::{CompiledStage, ShaderStage};
use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureDimension};

use super::{GpuBackend, GpuBuffer, GpuProgram, GpuTexture};

/// A linked program: one shader module per stage plus its uniform buffers.
pub struct WgpuProgram {
    label: String,
    stages: Vec<WgpuStage>,
    uniforms: HashMap<(u32, u32), wgpu::Buffer>,
}

/// One compiled stage of a [`WgpuProgram`].
pub struct WgpuStage {
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Entry point name.
    pub entry_point: String,
    /// Compiled module.
    pub module: wgpu::ShaderModule,
}

impl WgpuProgram {
    /// Program label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Compiled stages.
    pub fn stages(&self) -> &[WgpuStage] {
        &self.stages
    }

    /// Uniform buffer backing the block at `(group, binding)`.
    pub fn uniform_buffer(&self, group: u32, binding: u32) -> Option<&wgpu::Buffer> {
        self.uniforms.get(&(group, binding))
    }
}

impl std::fmt::Debug for WgpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuProgram")
            .field("label", &self.label)
            .field("stages", &self.stages.len())
            .field("uniforms", &self.uniforms.len())
            .finish()
    }
}

/// Resources bound for the next draw.
#[derive(Default)]
pub struct WgpuBindState {
    /// Current program.
    pub program: Option<Arc<WgpuProgram>>,
    /// Current vertex buffer.
    pub vertex_buffer: Option<wgpu::Buffer>,
    /// Current index buffer.
    pub index_buffer: Option<wgpu::Buffer>,
    /// Texture views and their samplers by slot.
    pub textures: BTreeMap<u32, (wgpu::TextureView, wgpu::Sampler)>,
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_state: Mutex<WgpuBindState>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend with default configuration.
    pub fn new() -> Result<Self, GraphicsError> {
        Self::with_config(&GraphicsConfig::default())
    }

    /// Create a new wgpu backend from a graphics configuration.
    pub fn with_config(config: &GraphicsConfig) -> Result<Self, GraphicsError> {
        let backends = config.wgpu_backend.to_wgpu_backends();

        let mut flags = wgpu::InstanceFlags::default();
        if config.validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }
        if config.debug {
            flags |= wgpu::InstanceFlags::DEBUG;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}"))
        })?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Rime Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            bind_state: Mutex::new(WgpuBindState::default()),
        })
    }

    /// Get the wgpu adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Run `f` with the resources bound for the next draw.
    pub fn with_bind_state<R>(&self, f: impl FnOnce(&WgpuBindState) -> R) -> R {
        f(&self.bind_state.lock())
    }

    fn create_sampler(&self, wrap: TextureWrap) -> wgpu::Sampler {
        let address_mode = match wrap {
            TextureWrap::Repeat => wgpu::AddressMode::Repeat,
            TextureWrap::Clamp => wgpu::AddressMode::ClampToEdge,
        };
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Rime Sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        })
    }

    fn create_module(
        &self,
        label: &str,
        stage: &CompiledStage,
    ) -> Result<wgpu::ShaderModule, GraphicsError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&stage.wgsl)),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GraphicsError::ShaderCompilationFailed {
                path: label.to_string(),
                message: error.to_string(),
            });
        }
        Ok(module)
    }
}

fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        result |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }
    result
}

// RGB8 has no GPU equivalent; it is uploaded as RGBA8.
fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgb8 | TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

fn gpu_bytes_per_pixel(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Rgb8 | TextureFormat::Rgba8 => 4,
        TextureFormat::Rgba16Float => 8,
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_program(
        &self,
        label: &str,
        stages: &[CompiledStage],
        reflection: &ShaderReflection,
    ) -> Result<GpuProgram, GraphicsError> {
        let stages = stages
            .iter()
            .map(|stage| {
                Ok(WgpuStage {
                    stage: stage.stage,
                    entry_point: stage.entry_point.clone(),
                    module: self.create_module(label, stage)?,
                })
            })
            .collect::<Result<Vec<_>, GraphicsError>>()?;

        let uniforms = reflection
            .uniform_blocks()
            .values()
            .map(|block| {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(block.name()),
                    size: block.size() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                ((block.group(), block.binding()), buffer)
            })
            .collect();

        Ok(GpuProgram::Wgpu(Arc::new(WgpuProgram {
            label: label.to_string(),
            stages,
            uniforms,
        })))
    }

    fn bind_program(&self, program: &GpuProgram) {
        if let GpuProgram::Wgpu(program) = program {
            self.bind_state.lock().program = Some(Arc::clone(program));
        }
    }

    fn write_uniform_block(&self, program: &GpuProgram, block: &UniformBlock, data: &[u8]) {
        let GpuProgram::Wgpu(program) = program else {
            return;
        };
        match program.uniform_buffer(block.group(), block.binding()) {
            Some(buffer) => self.queue.write_buffer(buffer, 0, data),
            None => log::warn!(
                "Program {:?} has no uniform buffer for block {:?}",
                program.label(),
                block.name()
            ),
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: convert_buffer_usage(descriptor.usage),
            mapped_at_creation: false,
        });
        Ok(GpuBuffer::Wgpu(buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let GpuBuffer::Wgpu(buffer) = buffer else {
            return;
        };
        // Queue writes must be a multiple of COPY_BUFFER_ALIGNMENT.
        let padded_len = data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        if padded_len == data.len() {
            self.queue.write_buffer(buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len, 0);
            self.queue.write_buffer(buffer, offset, &padded);
        }
    }

    fn bind_vertex_buffer(&self, buffer: &GpuBuffer) {
        if let GpuBuffer::Wgpu(buffer) = buffer {
            self.bind_state.lock().vertex_buffer = Some(buffer.clone());
        }
    }

    fn bind_index_buffer(&self, buffer: &GpuBuffer) {
        if let GpuBuffer::Wgpu(buffer) = buffer {
            self.bind_state.lock().index_buffer = Some(buffer.clone());
        }
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: descriptor.dimension.layers(),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: convert_texture_format(descriptor.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view_dimension = match descriptor.dimension {
            TextureDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(view_dimension),
            ..Default::default()
        });

        let sampler = self.create_sampler(descriptor.wrap);

        Ok(GpuTexture::Wgpu {
            texture,
            view,
            sampler,
        })
    }

    fn write_texture(
        &self,
        texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        layer: u32,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let GpuTexture::Wgpu { texture, .. } = texture else {
            return Ok(());
        };
        if data.len() != descriptor.layer_size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture layer data is {} bytes, expected {}",
                data.len(),
                descriptor.layer_size()
            )));
        }

        let expanded;
        let pixels = if descriptor.format == TextureFormat::Rgb8 {
            expanded = expand_rgb_to_rgba(data);
            expanded.as_slice()
        } else {
            data
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(descriptor.width * gpu_bytes_per_pixel(descriptor.format)),
                rows_per_image: Some(descriptor.height),
            },
            wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn bind_texture(&self, texture: &GpuTexture, slot: u32) {
        if let GpuTexture::Wgpu { view, sampler, .. } = texture {
            self.bind_state
                .lock()
                .textures
                .insert(slot, (view.clone(), sampler.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_texture_format() {
        assert_eq!(
            convert_texture_format(TextureFormat::Rgb8),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            convert_texture_format(TextureFormat::Rgba16Float),
            wgpu::TextureFormat::Rgba16Float
        );
        assert_eq!(gpu_bytes_per_pixel(TextureFormat::Rgb8), 4);
    }

    #[test]
    fn test_convert_buffer_usage() {
        let usage = convert_buffer_usage(BufferUsage::VERTEX | BufferUsage::COPY_DST);
        assert!(usage.contains(wgpu::BufferUsages::VERTEX));
        assert!(usage.contains(wgpu::BufferUsages::COPY_DST));
        assert!(!usage.contains(wgpu::BufferUsages::INDEX));
    }
}
