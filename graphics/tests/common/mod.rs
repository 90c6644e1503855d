//! Common utilities for integration tests.
//!
//! Tests are parameterized over [`Backend`]; a [`TestContext`] is only
//! created when the backend is compiled in and a device can be opened.

#![allow(dead_code)]

use std::sync::Arc;

use rime_graphics::{
    BackendType, BindContext, GraphicsConfig, GraphicsDevice, Material, Shader, ShaderSource,
    ShaderStage, Texture, TextureDescriptor, TextureFormat, WgpuBackendType,
};

// ============================================================================
// Shader Sources
// ============================================================================

/// WGSL shader with a `Material` block and one albedo texture.
///
/// Layout: `Roughness` f32 at offset 0, `Albedo` vec3 at offset 16, size 32.
pub const MATERIAL_WGSL: &str = r#"
struct Material {
    Roughness: f32,
    Albedo: vec3<f32>,
}

@group(0) @binding(0) var<uniform> material: Material;
@group(0) @binding(1) var albedo_map: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(albedo_map, albedo_sampler, in.uv);
    return vec4<f32>(base.rgb * material.Albedo, material.Roughness);
}
"#;

/// GLSL shader holding both stages behind `#ifdef` blocks.
///
/// Same `Material` layout as [`MATERIAL_WGSL`] under std140.
pub const MATERIAL_GLSL: &str = r#"#version 450
layout(std140, set = 0, binding = 0) uniform Material {
    float Roughness;
    vec3 Albedo;
};

#ifdef VERTEX
layout(location = 0) in vec3 a_Position;
void main() {
    gl_Position = vec4(a_Position, 1.0);
}
#endif

#ifdef FRAGMENT
layout(location = 0) out vec4 o_Color;
void main() {
    o_Color = vec4(Albedo, Roughness);
}
#endif
"#;

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (no actual GPU operations).
    Dummy,
    /// WebGPU backend (via wgpu).
    WebGpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            // Dummy backend is always available
            Backend::Dummy => true,
            // WebGpu backend (wgpu) is available when the feature is enabled
            #[cfg(feature = "wgpu-backend")]
            Backend::WebGpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::WebGpu => false,
        }
    }

    /// Get the backend name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
            Backend::WebGpu => "webgpu",
        }
    }

    /// Configuration selecting this backend.
    pub fn to_config(self) -> GraphicsConfig {
        match self {
            Backend::Dummy => GraphicsConfig::dummy(),
            Backend::WebGpu => GraphicsConfig::new()
                .with_backend(BackendType::Wgpu)
                .with_wgpu_backend(WgpuBackendType::Auto),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context holding a device for one backend.
pub struct TestContext {
    /// The backend being tested.
    pub backend: Backend,
    /// Graphics device for creating resources.
    pub device: Arc<GraphicsDevice>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        if !backend.is_available() {
            return None;
        }
        let device = GraphicsDevice::new(backend.to_config()).ok()?;
        Some(Self { backend, device })
    }

    /// A fresh binding context.
    pub fn bind_context(&self) -> BindContext {
        self.device.create_bind_context()
    }

    /// Compile [`MATERIAL_WGSL`].
    pub fn material_shader(&self) -> Arc<Shader> {
        let shader = self.device.create_shader(
            "material_wgsl",
            &[
                ShaderSource::wgsl(ShaderStage::Vertex, MATERIAL_WGSL, "vs_main"),
                ShaderSource::wgsl(ShaderStage::Fragment, MATERIAL_WGSL, "fs_main"),
            ],
        );
        assert!(shader.is_ready(), "{:?}", shader.diagnostic());
        shader
    }

    /// Compile [`MATERIAL_GLSL`].
    pub fn material_shader_glsl(&self) -> Arc<Shader> {
        let shader = self.device.create_shader(
            "material_glsl",
            &[
                ShaderSource::glsl(ShaderStage::Vertex, MATERIAL_GLSL),
                ShaderSource::glsl(ShaderStage::Fragment, MATERIAL_GLSL),
            ],
        );
        assert!(shader.is_ready(), "{:?}", shader.diagnostic());
        shader
    }

    /// A material for [`MATERIAL_WGSL`].
    pub fn material(&self) -> Arc<Material> {
        self.device
            .create_material(&self.material_shader())
            .expect("Failed to create material")
    }

    /// A 2x2 RGBA texture filled with `value`.
    pub fn solid_texture(&self, value: u8) -> Arc<Texture> {
        let texture = self
            .device
            .create_texture(&TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8))
            .expect("Failed to create texture");
        texture.set_data(&[value; 16]).expect("Failed to set texture data");
        texture
    }
}

/// Read an `f32` at `offset` from uploaded uniform bytes.
pub fn read_f32(data: &[u8], offset: usize) -> f32 {
    bytemuck::pod_read_unaligned(&data[offset..offset + 4])
}

/// Read a `vec3<f32>` at `offset` from uploaded uniform bytes.
pub fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    bytemuck::pod_read_unaligned(&data[offset..offset + 12])
}
