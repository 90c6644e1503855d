//! Graphics device.
//!
//! The [`GraphicsDevice`] is the entry point for creating shaders, materials
//! and GPU resources. It owns the backend selected by [`GraphicsConfig`].

use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rime_core::texture::{TextureFormat, extract_cube_faces, flip_vertical};

use crate::backend::{self, GpuBackend};
use crate::config::GraphicsConfig;
use crate::context::BindContext;
use crate::error::GraphicsError;
use crate::materials::{Material, MaterialInstance};
use crate::resources::{IndexBuffer, Texture, VertexBuffer};
use crate::shader::{Shader, ShaderSource, ShaderStage};
use crate::types::TextureDescriptor;

/// Limits enforced when creating resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

/// A graphics device for creating shaders, materials and GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be shared across threads.
/// Binding is not done through the device: each render thread creates its
/// own [`BindContext`] with [`GraphicsDevice::create_bind_context`].
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(GraphicsConfig::default())?;
///
/// let shader = device.load_shader_stages("shaders/lit.glsl", &[
///     ShaderStage::Vertex,
///     ShaderStage::Fragment,
/// ]);
/// let material = device.create_material(&shader)?;
/// material.set_texture("albedo_map", device.load_texture("textures/brick.png")?)?;
///
/// let mut ctx = device.create_bind_context();
/// material.bind(&mut ctx)?;
/// ```
pub struct GraphicsDevice {
    backend: Arc<dyn GpuBackend>,
    config: GraphicsConfig,
    capabilities: DeviceCapabilities,
    // Track allocated resources (weak references for cleanup/debugging)
    shaders: RwLock<Vec<Weak<Shader>>>,
    materials: RwLock<Vec<Weak<Material>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
    vertex_buffers: RwLock<Vec<Weak<VertexBuffer>>>,
    index_buffers: RwLock<Vec<Weak<IndexBuffer>>>,
}

impl GraphicsDevice {
    /// Create a device with the backend selected by `config`.
    pub fn new(config: GraphicsConfig) -> Result<Arc<Self>, GraphicsError> {
        let backend = backend::create_backend(&config)?;
        Ok(Self::with_backend(backend, config))
    }

    /// Create a device around an existing backend.
    pub fn with_backend(backend: Arc<dyn GpuBackend>, config: GraphicsConfig) -> Arc<Self> {
        log::info!("GraphicsDevice: created on {}", backend.name());
        Arc::new(Self {
            backend,
            config,
            capabilities: DeviceCapabilities::default(),
            shaders: RwLock::new(Vec::new()),
            materials: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
            vertex_buffers: RwLock::new(Vec::new()),
            index_buffers: RwLock::new(Vec::new()),
        })
    }

    /// The backend all resources are created on.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Configuration the device was created with.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Resource limits.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Create a binding context for a render thread.
    pub fn create_bind_context(&self) -> BindContext {
        BindContext::new(Arc::clone(&self.backend))
    }

    /// Compile a shader from in-memory sources.
    ///
    /// Compilation errors are logged and produce a shader that is not ready.
    pub fn create_shader(&self, label: &str, sources: &[ShaderSource]) -> Arc<Shader> {
        let shader = Arc::new(Shader::compile(self.backend.as_ref(), label, sources));
        self.shaders.write().push(Arc::downgrade(&shader));
        shader
    }

    /// Load and compile a single-stage shader file.
    pub fn load_shader(&self, stage: ShaderStage, path: impl AsRef<Path>) -> Arc<Shader> {
        self.load_shader_stages(path, &[stage])
    }

    /// Load a shader file and compile it once per stage.
    ///
    /// GLSL files hold every stage behind `#ifdef VERTEX` / `#ifdef FRAGMENT`
    /// blocks; WGSL files use `vs_main`, `fs_main` and `cs_main` entry points.
    pub fn load_shader_stages(&self, path: impl AsRef<Path>, stages: &[ShaderStage]) -> Arc<Shader> {
        let path = path.as_ref();
        let label = path.display().to_string();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Could not read file. (Path):{}", path.display());
                let shader = Arc::new(Shader::failed(&label, e.to_string()));
                self.shaders.write().push(Arc::downgrade(&shader));
                return shader;
            }
        };

        let sources: Vec<ShaderSource> = stages
            .iter()
            .map(|stage| ShaderSource::from_file_text(*stage, path, text.as_str()))
            .collect();
        self.create_shader(&label, &sources)
    }

    /// Create a material for `shader`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NoMaterialBlock`] if the shader declares no
    /// `Material` uniform block.
    pub fn create_material(&self, shader: &Arc<Shader>) -> Result<Arc<Material>, GraphicsError> {
        let material = Material::new(Arc::clone(shader))?;
        self.materials.write().push(Arc::downgrade(&material));

        log::trace!("GraphicsDevice: created material {:?}", material.label());
        Ok(material)
    }

    /// Create an instance of `material`.
    pub fn create_material_instance(&self, material: &Arc<Material>) -> Arc<MaterialInstance> {
        MaterialInstance::new(material)
    }

    /// Create an empty texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or exceed device limits.
    pub fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        self.check_texture_size(descriptor)?;
        let texture = Arc::new(Texture::new(
            Arc::clone(&self.backend),
            descriptor.clone(),
            self.capabilities.max_texture_dimension,
        )?);
        self.track_texture(&texture, descriptor);
        Ok(texture)
    }

    /// Load a 2D texture from an image file.
    ///
    /// The image is flipped vertically when
    /// [`GraphicsConfig::flip_images_on_load`] is set.
    pub fn load_texture(&self, path: impl AsRef<Path>) -> Result<Arc<Texture>, GraphicsError> {
        let path = path.as_ref();
        let mut image = decode_image(path)?;
        if self.config.flip_images_on_load {
            image.flip();
        }

        let descriptor = TextureDescriptor::new_2d(image.width, image.height, image.format)
            .with_label(path.display().to_string());
        self.check_texture_size(&descriptor)?;

        let texture = Arc::new(Texture::from_pixels(
            Arc::clone(&self.backend),
            descriptor.clone(),
            &image.pixels,
            Some(path),
            self.capabilities.max_texture_dimension,
        )?);
        self.track_texture(&texture, &descriptor);
        Ok(texture)
    }

    /// Load a cube texture from a horizontal (4x3) or vertical (3x4) cross.
    ///
    /// Faces are uploaded in +X, -X, +Y, -Y, +Z, -Z order. Each face is
    /// flipped vertically when [`GraphicsConfig::flip_images_on_load`] is set.
    pub fn load_texture_cube(&self, path: impl AsRef<Path>) -> Result<Arc<Texture>, GraphicsError> {
        let path = path.as_ref();
        let image = decode_image(path)?;
        let bpp = image.format.bytes_per_pixel();

        let cube = extract_cube_faces(&image.pixels, image.width as usize, image.height as usize, bpp)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "{} is {}x{}, not a cube cross",
                    path.display(),
                    image.width,
                    image.height
                ))
            })?;

        let mut pixels = Vec::with_capacity(cube.size * cube.size * bpp * 6);
        for mut face in cube.faces {
            if self.config.flip_images_on_load {
                flip_vertical(&mut face, cube.size, cube.size, bpp);
            }
            pixels.extend_from_slice(&face);
        }

        let descriptor = TextureDescriptor::new_cube(cube.size as u32, image.format)
            .with_label(path.display().to_string());
        self.check_texture_size(&descriptor)?;

        let texture = Arc::new(Texture::from_pixels(
            Arc::clone(&self.backend),
            descriptor.clone(),
            &pixels,
            Some(path),
            self.capabilities.max_texture_dimension,
        )?);
        self.track_texture(&texture, &descriptor);
        Ok(texture)
    }

    /// Create a vertex buffer holding `data`.
    pub fn create_vertex_buffer(&self, data: &[u8]) -> Result<Arc<VertexBuffer>, GraphicsError> {
        self.check_buffer_size(data.len())?;
        let buffer = Arc::new(VertexBuffer::new(Arc::clone(&self.backend), None, data)?);
        self.vertex_buffers.write().push(Arc::downgrade(&buffer));

        log::trace!("GraphicsDevice: created vertex buffer, size={}", data.len());
        Ok(buffer)
    }

    /// Create an index buffer holding `indices`.
    pub fn create_index_buffer(&self, indices: &[u32]) -> Result<Arc<IndexBuffer>, GraphicsError> {
        self.check_buffer_size(std::mem::size_of_val(indices))?;
        let buffer = Arc::new(IndexBuffer::new(Arc::clone(&self.backend), None, indices)?);
        self.index_buffers.write().push(Arc::downgrade(&buffer));

        log::trace!("GraphicsDevice: created index buffer, count={}", indices.len());
        Ok(buffer)
    }

    /// Get the number of live shaders created by this device.
    pub fn shader_count(&self) -> usize {
        live_count(&self.shaders)
    }

    /// Get the number of live materials created by this device.
    pub fn material_count(&self) -> usize {
        live_count(&self.materials)
    }

    /// Get the number of live textures created by this device.
    pub fn texture_count(&self) -> usize {
        live_count(&self.textures)
    }

    /// Get the number of live vertex and index buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        live_count(&self.vertex_buffers) + live_count(&self.index_buffers)
    }

    /// Clean up dead weak references to released resources.
    pub fn cleanup_dead_resources(&self) {
        self.shaders.write().retain(|w| w.strong_count() > 0);
        self.materials.write().retain(|w| w.strong_count() > 0);
        self.textures.write().retain(|w| w.strong_count() > 0);
        self.vertex_buffers.write().retain(|w| w.strong_count() > 0);
        self.index_buffers.write().retain(|w| w.strong_count() > 0);
    }

    fn check_texture_size(&self, descriptor: &TextureDescriptor) -> Result<(), GraphicsError> {
        descriptor.validate(self.capabilities.max_texture_dimension)
    }

    fn check_buffer_size(&self, size: usize) -> Result<(), GraphicsError> {
        if size as u64 > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                size, self.capabilities.max_buffer_size
            )));
        }
        Ok(())
    }

    fn track_texture(&self, texture: &Arc<Texture>, descriptor: &TextureDescriptor) {
        self.textures.write().push(Arc::downgrade(texture));
        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}, {:?}",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.dimension
        );
    }
}

fn live_count<T>(list: &RwLock<Vec<Weak<T>>>) -> usize {
    list.read().iter().filter(|w| w.strong_count() > 0).count()
}

struct DecodedImage {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<u8>,
}

impl DecodedImage {
    fn flip(&mut self) {
        flip_vertical(
            &mut self.pixels,
            self.width as usize,
            self.height as usize,
            self.format.bytes_per_pixel(),
        );
    }
}

/// Decode an image file into 8-bit RGB or RGBA pixels.
fn decode_image(path: &Path) -> Result<DecodedImage, GraphicsError> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => GraphicsError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => GraphicsError::ImageDecode(format!("{}: {other}", path.display())),
    })?;

    let (width, height) = (image.width(), image.height());
    let has_alpha = image.color().has_alpha();
    let format = TextureFormat::from_channels(if has_alpha { 4 } else { 3 })
        .unwrap_or(TextureFormat::Rgba8);
    let pixels = match format {
        TextureFormat::Rgb8 => image.into_rgb8().into_raw(),
        _ => image.into_rgba8().into_raw(),
    };

    log::debug!(
        "Decoded image {} ({}x{}, {:?})",
        path.display(),
        width,
        height,
        format
    );
    Ok(DecodedImage {
        width,
        height,
        format,
        pixels,
    })
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureDimension;

    fn create_test_device() -> Arc<GraphicsDevice> {
        GraphicsDevice::new(GraphicsConfig::dummy()).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rime-device-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_device_backend() {
        let device = create_test_device();
        assert_eq!(device.backend().name(), "Dummy Backend");
    }

    #[test]
    fn test_create_texture() {
        let device = create_test_device();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(512, 256, TextureFormat::Rgba8))
            .unwrap();
        assert_eq!(texture.width(), 512);
        assert_eq!(texture.height(), 256);
        assert_eq!(device.texture_count(), 1);
    }

    #[test]
    fn test_create_texture_zero_size() {
        let device = create_test_device();
        let result = device.create_texture(&TextureDescriptor::new_2d(0, 512, TextureFormat::Rgba8));
        assert!(result.is_err());
    }

    #[test]
    fn test_resource_cleanup() {
        let device = create_test_device();
        {
            let _buffer = device.create_vertex_buffer(&[0; 64]).unwrap();
            let _indices = device.create_index_buffer(&[0, 1, 2]).unwrap();
            assert_eq!(device.buffer_count(), 2);
        }
        // Buffers dropped
        device.cleanup_dead_resources();
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_missing_shader_file_is_not_ready() {
        let device = create_test_device();
        let shader = device.load_shader(ShaderStage::Fragment, temp_path("missing.glsl"));
        assert!(!shader.is_ready());
        assert!(shader.diagnostic().is_some());
        assert_eq!(device.shader_count(), 1);
    }

    #[test]
    fn test_load_wgsl_shader_file() {
        let path = temp_path("unlit.wgsl");
        std::fs::write(
            &path,
            "struct Material { Tint: vec4<f32> }\n\
             @group(0) @binding(0) var<uniform> material: Material;\n\
             @fragment fn fs_main() -> @location(0) vec4<f32> { return material.Tint; }\n",
        )
        .unwrap();

        let device = create_test_device();
        let shader = device.load_shader(ShaderStage::Fragment, &path);
        std::fs::remove_file(&path).unwrap();

        assert!(shader.is_ready(), "{:?}", shader.diagnostic());
        let material = device.create_material(&shader).unwrap();
        assert_eq!(material.block().size(), 16);
        assert_eq!(device.material_count(), 1);
    }

    #[test]
    fn test_create_material_without_block() {
        let device = create_test_device();
        let shader = device.create_shader(
            "plain",
            &[ShaderSource::wgsl(
                ShaderStage::Fragment,
                "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
                "fs_main",
            )],
        );
        assert!(matches!(
            device.create_material(&shader),
            Err(GraphicsError::NoMaterialBlock { .. })
        ));
    }

    #[test]
    fn test_load_texture_flips_rows() {
        let path = temp_path("gradient.png");
        let mut image = image::RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        image.save(&path).unwrap();

        let device = create_test_device();
        let texture = device.load_texture(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(texture.format(), TextureFormat::Rgba8);
        assert_eq!(texture.data().as_bytes(), &[0, 0, 255, 255, 255, 0, 0, 255]);
        assert_eq!(texture.path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_rgb_texture_keeps_rgb() {
        let path = temp_path("rgb.png");
        image::RgbImage::new(2, 2).save(&path).unwrap();

        let device = GraphicsDevice::new(GraphicsConfig::dummy().with_flip_images_on_load(false))
            .unwrap();
        let texture = device.load_texture(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(texture.format(), TextureFormat::Rgb8);
        assert_eq!(texture.data().size(), 12);
    }

    #[test]
    fn test_load_texture_cube_from_cross() {
        let path = temp_path("cross.png");
        image::RgbaImage::new(8, 6).save(&path).unwrap();

        let device = create_test_device();
        let cube = device.load_texture_cube(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cube.dimension(), TextureDimension::Cube);
        assert_eq!(cube.width(), 2);
        assert_eq!(cube.data().size(), 2 * 2 * 4 * 6);
    }

    #[test]
    fn test_load_texture_cube_rejects_non_cross() {
        let path = temp_path("square.png");
        image::RgbaImage::new(4, 4).save(&path).unwrap();

        let device = create_test_device();
        let result = device.load_texture_cube(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_load_missing_texture() {
        let device = create_test_device();
        assert!(matches!(
            device.load_texture(temp_path("missing.png")),
            Err(GraphicsError::Io { .. })
        ));
    }
}
