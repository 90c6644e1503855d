//! Material definition.
//!
//! A [`Material`] is the CPU mirror of a shader's `Material` uniform block
//! plus the textures bound next to it. It is the shared base state for every
//! [`MaterialInstance`] built from it: writing a field here updates every
//! instance that has not overridden that field.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rime_core::buffer::Buffer;

use crate::context::{BindContext, UploadOrigin};
use crate::error::GraphicsError;
use crate::resources::Texture;
use crate::shader::reflection::{ResourceDecl, UniformBlock, UniformDecl};
use crate::shader::{MATERIAL_BLOCK, Shader};
use crate::types::{InstanceId, MaterialId};

use super::instance::MaterialInstance;
use super::value::UniformValue;

/// Number of texture slots a material or instance can hold.
///
/// Matches the per-stage sampled texture limit every backend supports.
pub const MAX_TEXTURE_SLOTS: u32 = 16;

struct MaterialState {
    storage: Buffer,
    textures: Vec<Option<Arc<Texture>>>,
}

/// Shared material parameters for one shader.
///
/// # Thread Safety
///
/// `Material` is `Send + Sync` so it can be built on an asset thread. All
/// mutation goes through `&self`; binding happens on the render thread.
pub struct Material {
    id: MaterialId,
    label: String,
    shader: Arc<Shader>,
    block: Arc<UniformBlock>,
    state: RwLock<MaterialState>,
    instances: Mutex<Vec<(InstanceId, Weak<MaterialInstance>)>>,
}

impl Material {
    /// Create a material for `shader` with zeroed parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NoMaterialBlock`] if the shader has no
    /// `Material` uniform block (including shaders that failed to compile).
    pub fn new(shader: Arc<Shader>) -> Result<Arc<Self>, GraphicsError> {
        let block = shader
            .reflection()
            .find_uniform_block(MATERIAL_BLOCK)
            .cloned()
            .ok_or_else(|| GraphicsError::NoMaterialBlock {
                shader: shader.label().to_string(),
            })?;

        let mut storage = Buffer::new();
        storage.allocate(block.size());
        storage.zero_initialize();

        log::trace!(
            "Material: created for shader {:?} ({} bytes)",
            shader.label(),
            block.size()
        );

        Ok(Arc::new(Self {
            id: MaterialId::next(),
            label: shader.label().to_string(),
            shader,
            block,
            state: RwLock::new(MaterialState {
                storage,
                textures: Vec::new(),
            }),
            instances: Mutex::new(Vec::new()),
        }))
    }

    /// Unique identifier.
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Debug label (the shader label).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The shader this material feeds.
    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// Layout of the material block.
    pub fn block(&self) -> &Arc<UniformBlock> {
        &self.block
    }

    /// Look up a field of the material block.
    pub fn find_uniform_decl(&self, name: &str) -> Option<&UniformDecl> {
        self.block.field(name)
    }

    /// Look up a texture or sampler binding of the shader.
    pub fn find_resource_decl(&self, name: &str) -> Option<&ResourceDecl> {
        self.shader.reflection().resource(name)
    }

    /// Write a typed value into a field and propagate it to instances.
    pub fn set<T: UniformValue>(&self, name: &str, value: T) -> Result<(), GraphicsError> {
        let decl = self.typed_decl::<T>(name)?;
        self.write_field(decl, bytemuck::bytes_of(&value))
    }

    /// Write raw bytes into a field and propagate them to instances.
    ///
    /// `bytes` must be exactly the field's size.
    pub fn set_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), GraphicsError> {
        let decl = self.decl(name)?;
        check_field_size(&self.block, decl, bytes)?;
        self.write_field(decl, bytes)
    }

    /// Read a typed field value.
    pub fn get<T: UniformValue>(&self, name: &str) -> Result<T, GraphicsError> {
        let decl = self.typed_decl::<T>(name)?;
        Ok(self.state.read().storage.read(decl.offset)?)
    }

    /// Copy of the current material block contents.
    pub fn uniform_data(&self) -> Buffer {
        Buffer::copy(&self.state.read().storage)
    }

    /// Bind a texture by resource name.
    pub fn set_texture(&self, name: &str, texture: Arc<Texture>) -> Result<(), GraphicsError> {
        let slot = texture_slot(&self.block, self.find_resource_decl(name), name)?;
        self.set_texture_slot(slot, Some(texture))
    }

    /// Bind or clear a texture by slot.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `slot` is not below
    /// [`MAX_TEXTURE_SLOTS`].
    pub fn set_texture_slot(
        &self,
        slot: u32,
        texture: Option<Arc<Texture>>,
    ) -> Result<(), GraphicsError> {
        set_slot(&mut self.state.write().textures, slot, texture)
    }

    /// Texture bound to `slot`.
    pub fn texture(&self, slot: u32) -> Option<Arc<Texture>> {
        self.state
            .read()
            .textures
            .get(slot as usize)
            .cloned()
            .flatten()
    }

    /// Number of live instances built from this material.
    pub fn instance_count(&self) -> usize {
        self.instances
            .lock()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .count()
    }

    /// Bind the shader, upload the material block and bind textures.
    pub fn bind(&self, ctx: &mut BindContext) -> Result<(), GraphicsError> {
        rime_core::profiling::profile_scope!("material_bind");

        self.shader.bind(ctx)?;
        {
            let state = self.state.read();
            self.shader.upload_block(
                ctx,
                &self.block,
                state.storage.as_bytes(),
                UploadOrigin::Material(self.id),
            )?;
        }
        self.bind_textures(ctx);
        Ok(())
    }

    /// Bind the material's textures in slot order.
    pub fn bind_textures(&self, ctx: &mut BindContext) {
        let textures: Vec<(u32, Arc<Texture>)> = self
            .state
            .read()
            .textures
            .iter()
            .enumerate()
            .filter_map(|(slot, texture)| Some((slot as u32, texture.clone()?)))
            .collect();
        for (slot, texture) in textures {
            texture.bind(ctx, slot);
        }
    }

    /// Current bytes of one field.
    pub(crate) fn field_bytes(&self, decl: &UniformDecl) -> Result<Vec<u8>, GraphicsError> {
        Ok(self.state.read().storage.slice(decl.offset, decl.size)?.to_vec())
    }

    pub(crate) fn register_instance(&self, id: InstanceId, instance: Weak<MaterialInstance>) {
        self.instances.lock().push((id, instance));
    }

    pub(crate) fn unregister_instance(&self, id: InstanceId) {
        self.instances.lock().retain(|(other, _)| *other != id);
    }

    fn decl(&self, name: &str) -> Result<&UniformDecl, GraphicsError> {
        self.find_uniform_decl(name)
            .ok_or_else(|| GraphicsError::UniformNotFound {
                block: self.block.name().to_string(),
                name: name.to_string(),
            })
    }

    fn typed_decl<T: UniformValue>(&self, name: &str) -> Result<&UniformDecl, GraphicsError> {
        let decl = self.decl(name)?;
        check_field_type::<T>(decl)?;
        Ok(decl)
    }

    fn write_field(&self, decl: &UniformDecl, bytes: &[u8]) -> Result<(), GraphicsError> {
        self.state.write().storage.write(bytes, decl.offset)?;

        rime_core::profiling::profile_scope!("material_propagate");
        let live: Vec<Arc<MaterialInstance>> = {
            let mut instances = self.instances.lock();
            instances.retain(|(_, w)| w.strong_count() > 0);
            instances.iter().filter_map(|(_, w)| w.upgrade()).collect()
        };
        for instance in live {
            instance.on_material_value_updated(decl);
        }
        Ok(())
    }
}

pub(crate) fn check_field_type<T: UniformValue>(decl: &UniformDecl) -> Result<(), GraphicsError> {
    if T::fits(decl) {
        return Ok(());
    }
    Err(GraphicsError::TypeMismatch {
        name: decl.name.clone(),
        expected: decl.ty.to_string(),
        actual: T::uniform_type().to_string(),
    })
}

pub(crate) fn check_field_size(
    block: &UniformBlock,
    decl: &UniformDecl,
    bytes: &[u8],
) -> Result<(), GraphicsError> {
    if bytes.len() == decl.size {
        return Ok(());
    }
    Err(GraphicsError::LayoutMismatch {
        block: format!("{}.{}", block.name(), decl.name),
        expected: decl.size,
        actual: bytes.len(),
    })
}

/// Slot of a texture resource. Slots are bindings within the material
/// block's group.
pub(crate) fn texture_slot(
    block: &UniformBlock,
    decl: Option<&ResourceDecl>,
    name: &str,
) -> Result<u32, GraphicsError> {
    match decl {
        Some(decl) if !decl.is_texture() => Err(GraphicsError::InvalidParameter(format!(
            "resource '{name}' is not a texture"
        ))),
        Some(decl) if decl.group != block.group() => {
            Err(GraphicsError::InvalidParameter(format!(
                "texture '{name}' is in group {}, material block is in group {}",
                decl.group,
                block.group()
            )))
        }
        Some(decl) => Ok(decl.binding),
        None => Err(GraphicsError::ResourceNotFound(name.to_string())),
    }
}

pub(crate) fn set_slot(
    textures: &mut Vec<Option<Arc<Texture>>>,
    slot: u32,
    texture: Option<Arc<Texture>>,
) -> Result<(), GraphicsError> {
    if slot >= MAX_TEXTURE_SLOTS {
        return Err(GraphicsError::InvalidParameter(format!(
            "texture slot {slot} out of range, maximum is {}",
            MAX_TEXTURE_SLOTS - 1
        )));
    }
    let slot = slot as usize;
    if textures.len() <= slot {
        if texture.is_none() {
            return Ok(());
        }
        textures.resize(slot + 1, None);
    }
    textures[slot] = texture;
    Ok(())
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("block_size", &self.block.size())
            .field("instances", &self.instance_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Material: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::device::DeviceCapabilities;
    use crate::shader::{ShaderSource, ShaderStage};
    use crate::types::TextureDescriptor;
    use rime_core::texture::TextureFormat;

    const WGSL: &str = r#"
struct Material {
    Roughness: f32,
    Albedo: vec3<f32>,
}
@group(0) @binding(0) var<uniform> material: Material;
@group(0) @binding(1) var albedo_map: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let base = textureSample(albedo_map, albedo_sampler, vec2<f32>(0.5, 0.5));
    return base * vec4<f32>(material.Albedo, material.Roughness);
}
"#;

    fn material() -> Arc<Material> {
        let shader = Shader::compile(
            &DummyBackend::new(),
            "pbr",
            &[ShaderSource::wgsl(ShaderStage::Fragment, WGSL, "fs_main")],
        );
        Material::new(Arc::new(shader)).unwrap()
    }

    #[test]
    fn test_storage_matches_block() {
        let material = material();
        let data = material.uniform_data();
        assert_eq!(data.size(), material.block().size());
        assert_eq!(data.size(), 32);
        assert!(data.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_set_and_get() {
        let material = material();
        material.set("Roughness", 0.5f32).unwrap();
        material.set("Albedo", [1.0f32, 0.0, 0.0]).unwrap();

        assert_eq!(material.get::<f32>("Roughness").unwrap(), 0.5);
        assert_eq!(material.get::<[f32; 3]>("Albedo").unwrap(), [1.0, 0.0, 0.0]);

        let data = material.uniform_data();
        assert_eq!(data.read::<f32>(0).unwrap(), 0.5);
        assert_eq!(data.read::<[f32; 3]>(16).unwrap(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_set_type_mismatch() {
        let material = material();
        assert!(matches!(
            material.set("Roughness", [1.0f32, 2.0]),
            Err(GraphicsError::TypeMismatch { .. })
        ));
        assert!(matches!(
            material.set("Metallic", 1.0f32),
            Err(GraphicsError::UniformNotFound { .. })
        ));
    }

    #[test]
    fn test_set_bytes_checks_size() {
        let material = material();
        material
            .set_bytes("Roughness", bytemuck::bytes_of(&0.25f32))
            .unwrap();
        assert_eq!(material.get::<f32>("Roughness").unwrap(), 0.25);
        assert!(matches!(
            material.set_bytes("Roughness", &[0u8; 8]),
            Err(GraphicsError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn test_find_decls() {
        let material = material();
        assert_eq!(material.find_uniform_decl("Albedo").unwrap().offset, 16);
        assert!(material.find_uniform_decl("Missing").is_none());
        assert_eq!(material.find_resource_decl("albedo_map").unwrap().binding, 1);
        assert!(material.find_resource_decl("normal_map").is_none());
    }

    #[test]
    fn test_material_needs_material_block() {
        let shader = Shader::compile(
            &DummyBackend::new(),
            "unlit",
            &[ShaderSource::wgsl(
                ShaderStage::Fragment,
                "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
                "fs_main",
            )],
        );
        assert!(matches!(
            Material::new(Arc::new(shader)),
            Err(GraphicsError::NoMaterialBlock { .. })
        ));
    }

    #[test]
    fn test_clearing_unset_slot_is_noop() {
        let mut slots = Vec::new();
        set_slot(&mut slots, 3, None).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_texture_slot_out_of_range() {
        let material = material();
        assert!(matches!(
            material.set_texture_slot(u32::MAX, None),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            material.set_texture_slot(MAX_TEXTURE_SLOTS, None),
            Err(GraphicsError::InvalidParameter(_))
        ));
        material.set_texture_slot(MAX_TEXTURE_SLOTS - 1, None).unwrap();
        assert!(material.texture(MAX_TEXTURE_SLOTS - 1).is_none());
    }

    #[test]
    fn test_set_bytes_error_names_field() {
        let material = material();
        let err = material.set_bytes("Albedo", &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::LayoutMismatch { ref block, expected: 12, actual: 4 }
                if block == "Material.Albedo"
        ));
    }

    #[test]
    fn test_texture_outside_material_group_rejected() {
        const SPLIT_WGSL: &str = r#"
struct Material {
    Roughness: f32,
}
@group(0) @binding(0) var<uniform> material: Material;
@group(0) @binding(1) var albedo_map: texture_2d<f32>;
@group(1) @binding(1) var shadow_map: texture_2d<f32>;
@group(0) @binding(2) var linear_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let uv = vec2<f32>(0.5, 0.5);
    let base = textureSample(albedo_map, linear_sampler, uv);
    let shadow = textureSample(shadow_map, linear_sampler, uv);
    return base * shadow * material.Roughness;
}
"#;
        let backend = DummyBackend::new();
        let shader = Shader::compile(
            &backend,
            "split",
            &[ShaderSource::wgsl(ShaderStage::Fragment, SPLIT_WGSL, "fs_main")],
        );
        assert!(shader.is_ready(), "{:?}", shader.diagnostic());
        let material = Material::new(Arc::new(shader)).unwrap();

        let texture = Arc::new(
            Texture::new(
                Arc::new(DummyBackend::new()),
                TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8),
                DeviceCapabilities::default().max_texture_dimension,
            )
            .unwrap(),
        );
        material.set_texture("albedo_map", Arc::clone(&texture)).unwrap();
        assert!(matches!(
            material.set_texture("shadow_map", texture),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(material.texture(1).is_some());
    }
}
