//! Texture resource.
//!
//! A [`Texture`] keeps its image on the CPU and mirrors it to the GPU. The
//! image can be replaced wholesale with [`Texture::set_data`] or edited in
//! place through a [`TextureLock`], which uploads when it is unlocked.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rime_core::buffer::Buffer;
use rime_core::texture::TextureFormat;

use crate::backend::{GpuBackend, GpuTexture};
use crate::context::BindContext;
use crate::error::GraphicsError;
use crate::types::{TextureDescriptor, TextureDimension, TextureId};

struct TextureState {
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
    image: Buffer,
    locked: bool,
}

/// A 2D or cube texture.
///
/// Created by [`GraphicsDevice::create_texture`] or loaded from an image
/// file with [`GraphicsDevice::load_texture`] and
/// [`GraphicsDevice::load_texture_cube`].
///
/// [`GraphicsDevice::create_texture`]: crate::GraphicsDevice::create_texture
/// [`GraphicsDevice::load_texture`]: crate::GraphicsDevice::load_texture
/// [`GraphicsDevice::load_texture_cube`]: crate::GraphicsDevice::load_texture_cube
pub struct Texture {
    id: TextureId,
    backend: Arc<dyn GpuBackend>,
    path: Option<PathBuf>,
    max_dimension: u32,
    state: Mutex<TextureState>,
}

impl Texture {
    /// Create an empty texture with a zeroed image.
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        descriptor: TextureDescriptor,
        max_dimension: u32,
    ) -> Result<Self, GraphicsError> {
        let mut image = Buffer::new();
        image.allocate(descriptor.data_size());
        Self::with_image(backend, descriptor, image, None, max_dimension)
    }

    /// Create a texture from decoded pixels and upload them.
    pub(crate) fn from_pixels(
        backend: Arc<dyn GpuBackend>,
        descriptor: TextureDescriptor,
        pixels: &[u8],
        path: Option<&Path>,
        max_dimension: u32,
    ) -> Result<Self, GraphicsError> {
        check_data_size(&descriptor, pixels.len())?;
        let texture = Self::with_image(
            backend,
            descriptor,
            Buffer::from_slice(pixels),
            path.map(Path::to_path_buf),
            max_dimension,
        )?;
        {
            let state = texture.state.lock();
            texture.upload(&state)?;
        }
        Ok(texture)
    }

    fn with_image(
        backend: Arc<dyn GpuBackend>,
        descriptor: TextureDescriptor,
        image: Buffer,
        path: Option<PathBuf>,
        max_dimension: u32,
    ) -> Result<Self, GraphicsError> {
        descriptor.validate(max_dimension)?;
        let gpu = backend.create_texture(&descriptor)?;
        Ok(Self {
            id: TextureId::next(),
            backend,
            path,
            max_dimension,
            state: Mutex::new(TextureState {
                descriptor,
                gpu,
                image,
                locked: false,
            }),
        })
    }

    /// Unique identifier.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// File the texture was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Largest width or height this texture can be resized to.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Current descriptor.
    pub fn descriptor(&self) -> TextureDescriptor {
        self.state.lock().descriptor.clone()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.state.lock().descriptor.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.state.lock().descriptor.height
    }

    /// Pixel format of the CPU image.
    pub fn format(&self) -> TextureFormat {
        self.state.lock().descriptor.format
    }

    /// 2D or cube.
    pub fn dimension(&self) -> TextureDimension {
        self.state.lock().descriptor.dimension
    }

    /// Whether a [`TextureLock`] is outstanding.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Copy of the CPU image.
    pub fn data(&self) -> Buffer {
        Buffer::copy(&self.state.lock().image)
    }

    /// Replace the whole image and upload it.
    ///
    /// `data` must be exactly `width * height * bytes_per_pixel` bytes per
    /// layer.
    pub fn set_data(&self, data: &[u8]) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(GraphicsError::TextureLocked(self.name(&state)));
        }
        check_data_size(&state.descriptor, data.len())?;
        state.image.write(data, 0)?;
        self.upload(&state)
    }

    /// Lock the CPU image for editing.
    ///
    /// Edits become visible to the GPU when the guard is unlocked. Dropping
    /// the guard without unlocking keeps the edits on the CPU only.
    pub fn lock(&self) -> Result<TextureLock<'_>, GraphicsError> {
        let mut state = self.state.lock();
        if state.locked {
            return Err(GraphicsError::TextureLocked(self.name(&state)));
        }
        state.locked = true;
        Ok(TextureLock {
            texture: self,
            image: std::mem::take(&mut state.image),
            original: None,
            width: state.descriptor.width,
            height: state.descriptor.height,
            finished: false,
        })
    }

    /// Bind to a texture slot.
    pub fn bind(&self, ctx: &mut BindContext, slot: u32) {
        let gpu = self.state.lock().gpu.clone();
        ctx.bind_texture(slot, self.id, &gpu);
    }

    fn upload(&self, state: &TextureState) -> Result<(), GraphicsError> {
        let layer_size = state.descriptor.layer_size();
        if layer_size == 0 {
            return Ok(());
        }
        for layer in 0..state.descriptor.dimension.layers() {
            let offset = layer as usize * layer_size;
            let data = state.image.slice(offset, layer_size)?;
            self.backend
                .write_texture(&state.gpu, &state.descriptor, layer, data)?;
        }
        Ok(())
    }

    /// Return the image from a lock. `original` is the image as it was
    /// before the lock resized it, restored whenever the new size is not
    /// committed.
    fn unlock(
        &self,
        image: Buffer,
        original: Option<Buffer>,
        width: u32,
        height: u32,
        upload: bool,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        state.locked = false;
        let resized = state.descriptor.width != width || state.descriptor.height != height;
        if !upload {
            state.image = match original {
                Some(original) if resized => original,
                _ => image,
            };
            return Ok(());
        }
        if !resized {
            state.image = image;
            return self.upload(&state);
        }

        let mut descriptor = state.descriptor.clone();
        descriptor.width = width;
        descriptor.height = height;
        let gpu = match descriptor
            .validate(self.max_dimension)
            .and_then(|()| self.backend.create_texture(&descriptor))
        {
            Ok(gpu) => gpu,
            Err(e) => {
                log::warn!("Texture {}: resize to {width}x{height} failed: {e}", self.id);
                let size = state.descriptor.data_size();
                state.image = original.unwrap_or_else(|| {
                    let mut image = Buffer::new();
                    image.allocate(size);
                    image
                });
                return Err(e);
            }
        };

        state.descriptor = descriptor;
        state.gpu = gpu;
        state.image = image;
        self.upload(&state)
    }

    fn name(&self, state: &TextureState) -> String {
        match (&state.descriptor.label, &self.path) {
            (Some(label), _) => label.clone(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => self.id.to_string(),
        }
    }
}

fn check_data_size(descriptor: &TextureDescriptor, len: usize) -> Result<(), GraphicsError> {
    if len == descriptor.data_size() {
        return Ok(());
    }
    Err(GraphicsError::InvalidParameter(format!(
        "texture data is {len} bytes, expected {} ({}x{} {:?} x{})",
        descriptor.data_size(),
        descriptor.width,
        descriptor.height,
        descriptor.format,
        descriptor.dimension.layers()
    )))
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("descriptor", &state.descriptor)
            .field("locked", &state.locked)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

/// Exclusive CPU access to a texture image.
///
/// Dereferences to the image [`Buffer`].
pub struct TextureLock<'a> {
    texture: &'a Texture,
    image: Buffer,
    original: Option<Buffer>,
    width: u32,
    height: u32,
    finished: bool,
}

impl TextureLock<'_> {
    /// Width the image will have after unlocking.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height the image will have after unlocking.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reallocate the image for new dimensions. The contents are zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] and leaves the image
    /// untouched if a side is zero or above [`Texture::max_dimension`], or
    /// if a cube texture would get non-square faces.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        let mut descriptor = self.texture.descriptor();
        descriptor.width = width;
        descriptor.height = height;
        descriptor.validate(self.texture.max_dimension)?;

        if self.original.is_none() {
            self.original = Some(std::mem::take(&mut self.image));
        }
        self.image.allocate(descriptor.data_size());
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Release the lock and upload the image.
    pub fn unlock(mut self) -> Result<(), GraphicsError> {
        self.finished = true;
        let image = std::mem::take(&mut self.image);
        self.texture
            .unlock(image, self.original.take(), self.width, self.height, true)
    }
}

impl Deref for TextureLock<'_> {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        &self.image
    }
}

impl DerefMut for TextureLock<'_> {
    fn deref_mut(&mut self) -> &mut Buffer {
        &mut self.image
    }
}

impl Drop for TextureLock<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::debug!("Texture {}: lock dropped without unlock", self.texture.id);
        let image = std::mem::take(&mut self.image);
        let original = self.original.take();
        // Never fails without an upload.
        let _ = self
            .texture
            .unlock(image, original, self.width, self.height, false);
    }
}
