//! Graphics error types.

use std::path::PathBuf;

use rime_core::buffer::BufferError;

/// Errors that can occur in the graphics system.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A shader stage failed to parse, validate or translate.
    #[error("shader compilation failed: {message}, shader path {path}")]
    ShaderCompilationFailed { path: String, message: String },
    /// The shader failed to compile and cannot be bound.
    #[error("shader '{label}' is not ready")]
    ShaderNotReady { label: String },
    /// No uniform block with this name exists in the shader.
    #[error("uniform block '{0}' not found")]
    UniformBlockNotFound(String),
    /// No field with this name exists in the block.
    #[error("uniform '{name}' not found in block '{block}'")]
    UniformNotFound { block: String, name: String },
    /// No texture or sampler binding with this name exists.
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),
    /// The shader declares no material block, so no material can be built from it.
    #[error("shader '{shader}' has no material uniform block")]
    NoMaterialBlock { shader: String },
    /// Uploaded or declared data does not match the reflected block layout.
    #[error("layout mismatch for '{block}': expected {expected} bytes, got {actual}")]
    LayoutMismatch {
        block: String,
        expected: usize,
        actual: usize,
    },
    /// A value's type does not match the reflected field type.
    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    /// A texture image is already locked for CPU access.
    #[error("texture '{0}' is already locked")]
    TextureLocked(String),
    /// Checked CPU buffer access failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// Reading an asset from disk failed.
    #[error("could not read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An image file could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(String),
}

impl GraphicsError {
    /// Whether this is one of the lookup failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UniformBlockNotFound(_) | Self::UniformNotFound { .. } | Self::ResourceNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");

        let err = GraphicsError::LayoutMismatch {
            block: "Material".to_string(),
            expected: 32,
            actual: 16,
        };
        assert_eq!(
            err.to_string(),
            "layout mismatch for 'Material': expected 32 bytes, got 16"
        );
    }

    #[test]
    fn test_buffer_error_conversion() {
        let err: GraphicsError = BufferError::OutOfBounds {
            offset: 12,
            len: 8,
            size: 16,
        }
        .into();
        assert!(matches!(err, GraphicsError::Buffer(_)));
        assert_eq!(
            err.to_string(),
            "access of 8 bytes at offset 12 exceeds buffer size 16"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(GraphicsError::ResourceNotFound("albedo".into()).is_not_found());
        assert!(!GraphicsError::ImageDecode("bad".into()).is_not_found());
    }
}
