//! Startup configuration for the graphics system.
//!
//! [`GraphicsConfig`] selects the GPU backend and its debug switches. It is
//! built with chained `with_*` calls or read from the environment:
//!
//! | Variable          | Values                                        |
//! |-------------------|-----------------------------------------------|
//! | `RIME_BACKEND`    | `auto`, `wgpu`, `dummy`, `vulkan`, `metal`, `dx12`, `gl` |
//! | `RIME_VALIDATION` | `1`/`true` to enable API validation           |

use std::str::FromStr;

use crate::error::GraphicsError;

/// Which GPU backend implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Try the wgpu backend, fall back to dummy if no GPU is available.
    #[default]
    Auto,
    /// Require the wgpu backend.
    Wgpu,
    /// No-op backend for tests and headless tools.
    Dummy,
}

/// Native API wgpu should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WgpuBackendType {
    /// Let wgpu pick the primary API for the platform.
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

#[cfg(feature = "wgpu-backend")]
impl WgpuBackendType {
    /// Convert to the wgpu backend mask.
    pub fn to_wgpu_backends(self) -> wgpu::Backends {
        match self {
            Self::Auto => wgpu::Backends::PRIMARY,
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Metal => wgpu::Backends::METAL,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Gl => wgpu::Backends::GL,
        }
    }
}

/// Graphics system configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsConfig {
    /// Backend implementation.
    pub backend: BackendType,
    /// Native API for the wgpu backend.
    pub wgpu_backend: WgpuBackendType,
    /// Enable API validation layers.
    pub validation: bool,
    /// Enable debug labels and markers.
    pub debug: bool,
    /// Flip images vertically when loading textures from disk.
    pub flip_images_on_load: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            wgpu_backend: WgpuBackendType::Auto,
            validation: cfg!(debug_assertions),
            debug: cfg!(debug_assertions),
            flip_images_on_load: true,
        }
    }
}

impl GraphicsConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the dummy backend.
    pub fn dummy() -> Self {
        Self::default().with_backend(BackendType::Dummy)
    }

    /// Set the backend implementation.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set the native API used by wgpu.
    pub fn with_wgpu_backend(mut self, wgpu_backend: WgpuBackendType) -> Self {
        self.wgpu_backend = wgpu_backend;
        self
    }

    /// Enable or disable API validation.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Enable or disable debug labels.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable vertical flipping of loaded images.
    pub fn with_flip_images_on_load(mut self, flip: bool) -> Self {
        self.flip_images_on_load = flip;
        self
    }

    /// Build a configuration from `RIME_BACKEND` and `RIME_VALIDATION`.
    ///
    /// Unset variables keep their defaults. Unrecognised values are
    /// reported and ignored.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("RIME_BACKEND").ok().as_deref(),
            std::env::var("RIME_VALIDATION").ok().as_deref(),
        )
    }

    fn from_vars(backend: Option<&str>, validation: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(value) = backend {
            match value.parse::<BackendSelection>() {
                Ok(selection) => {
                    config.backend = selection.backend;
                    config.wgpu_backend = selection.wgpu_backend;
                }
                Err(e) => log::warn!("Ignoring RIME_BACKEND: {}", e),
            }
        }
        if let Some(value) = validation {
            config.validation = matches!(value.trim(), "1" | "true" | "TRUE" | "on");
        }
        config
    }
}

/// A parsed backend name: `wgpu` implies its native API when one is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackendSelection {
    backend: BackendType,
    wgpu_backend: WgpuBackendType,
}

impl FromStr for BackendSelection {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wgpu = |wgpu_backend| BackendSelection {
            backend: BackendType::Wgpu,
            wgpu_backend,
        };
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self {
                backend: BackendType::Auto,
                wgpu_backend: WgpuBackendType::Auto,
            }),
            "dummy" => Ok(Self {
                backend: BackendType::Dummy,
                wgpu_backend: WgpuBackendType::Auto,
            }),
            "wgpu" => Ok(wgpu(WgpuBackendType::Auto)),
            "vulkan" => Ok(wgpu(WgpuBackendType::Vulkan)),
            "metal" => Ok(wgpu(WgpuBackendType::Metal)),
            "dx12" => Ok(wgpu(WgpuBackendType::Dx12)),
            "gl" | "opengl" => Ok(wgpu(WgpuBackendType::Gl)),
            other => Err(GraphicsError::InvalidParameter(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl FromStr for BackendType {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<BackendSelection>().map(|selection| selection.backend)
    }
}
