//! Texture types and descriptors.

use rime_core::texture::{TextureFormat, TextureWrap};

use crate::error::GraphicsError;

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// A single 2D image.
    #[default]
    D2,
    /// Six square 2D faces.
    Cube,
}

impl TextureDimension {
    /// Number of array layers backing this shape.
    pub const fn layers(self) -> u32 {
        match self {
            Self::D2 => 1,
            Self::Cube => 6,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width in pixels (face width for cube maps).
    pub width: u32,
    /// Height in pixels (face height for cube maps).
    pub height: u32,
    /// Pixel format of the CPU data.
    pub format: TextureFormat,
    /// Coordinate wrapping mode.
    pub wrap: TextureWrap,
    /// 2D or cube.
    pub dimension: TextureDimension,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            wrap: TextureWrap::default(),
            dimension: TextureDimension::D2,
        }
    }

    /// Create a cube texture descriptor with square faces of `size` pixels.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width: size,
            height: size,
            format,
            wrap: TextureWrap::Clamp,
            dimension: TextureDimension::Cube,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the wrap mode.
    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    /// Bytes in one layer of CPU data.
    pub fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Bytes of CPU data for the whole texture.
    pub fn data_size(&self) -> usize {
        self.layer_size() * self.dimension.layers() as usize
    }

    /// Check the extent is creatable: non-zero, at most `max_dimension` on
    /// each side, and square for cube maps.
    pub fn validate(&self, max_dimension: u32) -> Result<(), GraphicsError> {
        if self.width == 0 || self.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dimension}"
            )));
        }
        if self.dimension == TextureDimension::Cube && self.width != self.height {
            return Err(GraphicsError::InvalidParameter(format!(
                "cube faces must be square, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}
