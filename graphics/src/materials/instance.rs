//! Material instances.
//!
//! A [`MaterialInstance`] starts as a copy of its [`Material`]'s storage.
//! Fields written on the instance become overrides and are no longer touched
//! by the material; every other field follows the material as it changes.
//! Textures work the same way: an instance slot left empty falls back to the
//! material's texture at bind time.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use rime_core::buffer::Buffer;

use crate::context::{BindContext, UploadOrigin};
use crate::error::GraphicsError;
use crate::resources::Texture;
use crate::shader::reflection::UniformDecl;
use crate::types::InstanceId;

use super::material::{Material, check_field_size, check_field_type, set_slot, texture_slot};
use super::value::UniformValue;

struct InstanceState {
    storage: Buffer,
    overridden: HashSet<String>,
    textures: Vec<Option<Arc<Texture>>>,
}

/// Per-object parameters layered over a shared [`Material`].
pub struct MaterialInstance {
    id: InstanceId,
    material: Arc<Material>,
    state: RwLock<InstanceState>,
}

impl MaterialInstance {
    /// Create an instance holding a copy of the material's current values.
    pub fn new(material: &Arc<Material>) -> Arc<Self> {
        let instance = Arc::new(Self {
            id: InstanceId::next(),
            material: Arc::clone(material),
            state: RwLock::new(InstanceState {
                storage: material.uniform_data(),
                overridden: HashSet::new(),
                textures: Vec::new(),
            }),
        });
        material.register_instance(instance.id, Arc::downgrade(&instance));

        log::trace!(
            "MaterialInstance: {} created from material {:?}",
            instance.id,
            material.label()
        );
        instance
    }

    /// Unique identifier.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The material this instance layers over.
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Override a field with a typed value.
    pub fn set<T: UniformValue>(&self, name: &str, value: T) -> Result<(), GraphicsError> {
        let decl = self.decl(name)?;
        check_field_type::<T>(decl)?;
        self.write_override(decl, bytemuck::bytes_of(&value))
    }

    /// Override a field with raw bytes of exactly the field's size.
    pub fn set_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), GraphicsError> {
        let decl = self.decl(name)?;
        check_field_size(self.material.block(), decl, bytes)?;
        self.write_override(decl, bytes)
    }

    /// Read a typed field value as this instance sees it.
    pub fn get<T: UniformValue>(&self, name: &str) -> Result<T, GraphicsError> {
        let decl = self.decl(name)?;
        check_field_type::<T>(decl)?;
        Ok(self.state.read().storage.read(decl.offset)?)
    }

    /// Whether `name` has been written on this instance.
    pub fn is_overridden(&self, name: &str) -> bool {
        self.state.read().overridden.contains(name)
    }

    /// Drop an override so the field follows the material again.
    ///
    /// The field is immediately re-synced with the material's value.
    pub fn clear_override(&self, name: &str) -> Result<(), GraphicsError> {
        let decl = self.decl(name)?;
        let removed = self.state.write().overridden.remove(name);
        if removed {
            self.on_material_value_updated(decl);
        }
        Ok(())
    }

    /// Copy of this instance's uniform storage.
    pub fn uniform_data(&self) -> Buffer {
        Buffer::copy(&self.state.read().storage)
    }

    /// Called by the material after it wrote `decl`.
    ///
    /// Overridden fields are left alone.
    pub fn on_material_value_updated(&self, decl: &UniformDecl) {
        if self.is_overridden(&decl.name) {
            return;
        }
        let bytes = match self.material.field_bytes(decl) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("MaterialInstance {}: cannot read {:?}: {e}", self.id, decl.name);
                return;
            }
        };

        let mut state = self.state.write();
        if state.overridden.contains(&decl.name) {
            return;
        }
        if let Err(e) = state.storage.write(&bytes, decl.offset) {
            log::warn!("MaterialInstance {}: cannot sync {:?}: {e}", self.id, decl.name);
        }
    }

    /// Bind a texture on this instance by resource name.
    pub fn set_texture(&self, name: &str, texture: Arc<Texture>) -> Result<(), GraphicsError> {
        let slot = texture_slot(
            self.material.block(),
            self.material.find_resource_decl(name),
            name,
        )?;
        self.set_texture_slot(slot, Some(texture))
    }

    /// Bind or clear an instance texture by slot.
    ///
    /// Slots at or above [`MAX_TEXTURE_SLOTS`] are rejected with
    /// [`GraphicsError::InvalidParameter`].
    ///
    /// [`MAX_TEXTURE_SLOTS`]: super::MAX_TEXTURE_SLOTS
    pub fn set_texture_slot(
        &self,
        slot: u32,
        texture: Option<Arc<Texture>>,
    ) -> Result<(), GraphicsError> {
        set_slot(&mut self.state.write().textures, slot, texture)
    }

    /// Texture used for `slot`: the instance's own, else the material's.
    pub fn texture(&self, slot: u32) -> Option<Arc<Texture>> {
        let own = self
            .state
            .read()
            .textures
            .get(slot as usize)
            .cloned()
            .flatten();
        own.or_else(|| self.material.texture(slot))
    }

    /// Bind for drawing.
    ///
    /// Binds the shader, uploads this instance's storage, binds the
    /// material's textures and then the instance's own, so instance textures
    /// win on shared slots.
    pub fn bind(&self, ctx: &mut BindContext) -> Result<(), GraphicsError> {
        rime_core::profiling::profile_scope!("material_instance_bind");

        let shader = self.material.shader();
        shader.bind(ctx)?;
        {
            let state = self.state.read();
            shader.upload_block(
                ctx,
                self.material.block(),
                state.storage.as_bytes(),
                UploadOrigin::Instance(self.id),
            )?;
        }

        self.material.bind_textures(ctx);

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
        Ok(())
    }

    fn decl(&self, name: &str) -> Result<&UniformDecl, GraphicsError> {
        self.material
            .find_uniform_decl(name)
            .ok_or_else(|| GraphicsError::UniformNotFound {
                block: self.material.block().name().to_string(),
                name: name.to_string(),
            })
    }

    fn write_override(&self, decl: &UniformDecl, bytes: &[u8]) -> Result<(), GraphicsError> {
        let mut state = self.state.write();
        state.storage.write(bytes, decl.offset)?;
        state.overridden.insert(decl.name.clone());
        Ok(())
    }
}

impl Drop for MaterialInstance {
    fn drop(&mut self) {
        self.material.unregister_instance(self.id);
    }
}

impl std::fmt::Debug for MaterialInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialInstance")
            .field("id", &self.id)
            .field("material", &self.material.id())
            .field("overrides", &self.state.read().overridden.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(MaterialInstance: Send, Sync);
