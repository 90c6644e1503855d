//! Shader programs.
//!
//! A [`Shader`] is compiled once from one source per stage. Compilation goes
//! through naga: GLSL stages are parsed with the stage macro (`VERTEX`,
//! `FRAGMENT` or `COMPUTE`) defined, so one file can hold several stages
//! behind `#ifdef` blocks. Every stage is validated, reflected and handed
//! to the backend as WGSL.
//!
//! A shader that fails to compile is not an error value. It is kept in a
//! failed state so callers holding it keep working: [`Shader::is_ready`]
//! returns `false`, [`Shader::diagnostic`] holds the compiler message, and
//! binding it reports [`GraphicsError::ShaderNotReady`].
//!
//! # Example
//!
//! ```ignore
//! let shader = device.create_shader("lit", &[
//!     ShaderSource::glsl(ShaderStage::Vertex, LIT_GLSL),
//!     ShaderSource::glsl(ShaderStage::Fragment, LIT_GLSL),
//! ]);
//! let block = shader.uniform_block(MATERIAL_BLOCK)?;
//! ```

mod compile;
pub mod reflection;

use std::path::Path;
use std::sync::Arc;

pub use compile::CompiledStage;

use crate::backend::{GpuBackend, GpuProgram};
use crate::context::{BindContext, UploadOrigin};
use crate::error::GraphicsError;
use crate::types::ShaderId;
use reflection::{ResourceDecl, ShaderReflection, UniformBlock};

/// Name of the uniform block that backs material parameters.
pub const MATERIAL_BLOCK: &str = "Material";

/// Shader stage in the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment shader.
    Fragment,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    /// Preprocessor macro defined while compiling this stage from GLSL.
    pub fn define(self) -> &'static str {
        match self {
            Self::Vertex => "VERTEX",
            Self::Fragment => "FRAGMENT",
            Self::Compute => "COMPUTE",
        }
    }

    /// Entry point assumed for WGSL files loaded from disk.
    pub fn wgsl_entry_point(self) -> &'static str {
        match self {
            Self::Vertex => "vs_main",
            Self::Fragment => "fs_main",
            Self::Compute => "cs_main",
        }
    }

    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
            Self::Compute => naga::ShaderStage::Compute,
        }
    }
}

/// Source language of a shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    Glsl,
    Wgsl,
}

impl ShaderLanguage {
    /// Language implied by a file extension: `.wgsl` is WGSL, anything else GLSL.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wgsl") => Self::Wgsl,
            _ => Self::Glsl,
        }
    }
}

/// Source text for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// The shader stage.
    pub stage: ShaderStage,
    /// Source language.
    pub language: ShaderLanguage,
    /// Shader source text.
    pub source: String,
    /// Entry point function name.
    pub entry_point: String,
    /// File the source was read from, for diagnostics.
    pub path: Option<String>,
}

impl ShaderSource {
    /// GLSL source; the entry point is always `main`.
    pub fn glsl(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            language: ShaderLanguage::Glsl,
            source: source.into(),
            entry_point: "main".to_string(),
            path: None,
        }
    }

    /// WGSL source with an explicit entry point.
    pub fn wgsl(
        stage: ShaderStage,
        source: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            language: ShaderLanguage::Wgsl,
            source: source.into(),
            entry_point: entry_point.into(),
            path: None,
        }
    }

    /// Source text read from `path`, in the language its extension implies.
    pub fn from_file_text(stage: ShaderStage, path: &Path, text: impl Into<String>) -> Self {
        let source = match ShaderLanguage::from_path(path) {
            ShaderLanguage::Glsl => Self::glsl(stage, text),
            ShaderLanguage::Wgsl => Self::wgsl(stage, text, stage.wgsl_entry_point()),
        };
        source.with_path(path.display().to_string())
    }

    /// Record the file this source came from.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Path for diagnostics, `<inline>` when the source was not read from disk.
    pub fn display_path(&self) -> &str {
        self.path.as_deref().unwrap_or("<inline>")
    }
}

/// A compiled, reflected shader program.
pub struct Shader {
    id: ShaderId,
    label: String,
    stages: Vec<CompiledStage>,
    reflection: ShaderReflection,
    program: Option<GpuProgram>,
    diagnostic: Option<String>,
}

impl Shader {
    /// Compile `sources` into a program on `backend`.
    ///
    /// Never fails: a compilation error is logged and yields a shader in
    /// the failed state.
    pub fn compile(backend: &dyn GpuBackend, label: &str, sources: &[ShaderSource]) -> Self {
        rime_core::profiling::profile_scope_dynamic!(label);

        match Self::try_compile(backend, label, sources) {
            Ok(shader) => {
                log::debug!(
                    "Compiled shader {:?}: {} stages, {} uniform blocks, {} resources",
                    label,
                    shader.stages.len(),
                    shader.reflection.uniform_blocks().len(),
                    shader.reflection.resources().len()
                );
                shader
            }
            Err(GraphicsError::ShaderCompilationFailed { path, message }) => {
                log::error!("Shader compilation failed {}, Shader Path {}", message, path);
                Self::failed(label, format!("{message}, shader path {path}"))
            }
            Err(e) => {
                log::error!("Shader compilation failed {}, Shader Path {}", e, label);
                Self::failed(label, e.to_string())
            }
        }
    }

    /// A shader in the failed state carrying `message`.
    pub fn failed(label: &str, message: impl Into<String>) -> Self {
        Self {
            id: ShaderId::next(),
            label: label.to_string(),
            stages: Vec::new(),
            reflection: ShaderReflection::new(),
            program: None,
            diagnostic: Some(message.into()),
        }
    }

    fn try_compile(
        backend: &dyn GpuBackend,
        label: &str,
        sources: &[ShaderSource],
    ) -> Result<Self, GraphicsError> {
        if sources.is_empty() {
            return Err(GraphicsError::ShaderCompilationFailed {
                path: label.to_string(),
                message: "no shader stages".to_string(),
            });
        }

        let mut stages = Vec::with_capacity(sources.len());
        let mut reflection = ShaderReflection::new();
        for source in sources {
            let (stage, stage_reflection) =
                compile::compile_stage(source).map_err(|message| {
                    GraphicsError::ShaderCompilationFailed {
                        path: source.display_path().to_string(),
                        message,
                    }
                })?;
            reflection.merge(stage_reflection)?;
            stages.push(stage);
        }

        let program = backend.create_program(label, &stages, &reflection)?;

        Ok(Self {
            id: ShaderId::next(),
            label: label.to_string(),
            stages,
            reflection,
            program: Some(program),
            diagnostic: None,
        })
    }

    /// Unique identifier.
    pub fn id(&self) -> ShaderId {
        self.id
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the shader compiled and can be bound.
    pub fn is_ready(&self) -> bool {
        self.program.is_some()
    }

    /// Compiler message of a failed shader.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Compiled stages (empty when failed).
    pub fn stages(&self) -> &[CompiledStage] {
        &self.stages
    }

    /// Backend program handle.
    pub fn program(&self) -> Option<&GpuProgram> {
        self.program.as_ref()
    }

    /// Merged reflection of all stages.
    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    /// Look up a uniform block by name.
    pub fn uniform_block(&self, name: &str) -> Result<&Arc<UniformBlock>, GraphicsError> {
        self.reflection.uniform_block(name)
    }

    /// Texture and sampler bindings by name.
    pub fn resources(&self) -> &std::collections::BTreeMap<String, ResourceDecl> {
        self.reflection.resources()
    }

    /// Make this program current.
    pub fn bind(&self, ctx: &mut BindContext) -> Result<(), GraphicsError> {
        let program = self.ready_program()?;
        ctx.bind_program(self.id, program);
        Ok(())
    }

    /// Upload `data` to the uniform block named `block`.
    ///
    /// `data` must be exactly the block's size.
    pub fn set_uniform_buffer_data(
        &self,
        ctx: &mut BindContext,
        block: &str,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let block = Arc::clone(self.uniform_block(block)?);
        self.upload_block(ctx, &block, data, UploadOrigin::Direct)
    }

    pub(crate) fn upload_block(
        &self,
        ctx: &mut BindContext,
        block: &UniformBlock,
        data: &[u8],
        origin: UploadOrigin,
    ) -> Result<(), GraphicsError> {
        let program = self.ready_program()?;
        if data.len() != block.size() {
            log::error!(
                "Uniform block {:?} of shader {:?} expects {} bytes, got {}",
                block.name(),
                self.label,
                block.size(),
                data.len()
            );
            return Err(GraphicsError::LayoutMismatch {
                block: block.name().to_string(),
                expected: block.size(),
                actual: data.len(),
            });
        }
        ctx.upload_uniform_block(self.id, program, block, data, origin);
        Ok(())
    }

    fn ready_program(&self) -> Result<&GpuProgram, GraphicsError> {
        self.program.as_ref().ok_or_else(|| GraphicsError::ShaderNotReady {
            label: self.label.clone(),
        })
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("ready", &self.is_ready())
            .field("stages", &self.stages.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
