//! Per-stage compilation through naga.
//!
//! Each stage is parsed (GLSL or WGSL), validated, checked for its entry
//! point, reflected and written out as WGSL for the GPU backends.

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::reflection::ShaderReflection;
use super::{ShaderLanguage, ShaderSource, ShaderStage};

/// A stage that passed validation, ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Entry point name in `wgsl`.
    pub entry_point: String,
    /// Validated WGSL.
    pub wgsl: String,
}

/// Compile one stage, returning the compiler message on failure.
pub(crate) fn compile_stage(
    source: &ShaderSource,
) -> Result<(CompiledStage, ShaderReflection), String> {
    let module = parse(source)?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    let info = validator
        .validate(&module)
        .map_err(|e| format!("Validation error: {}", e.emit_to_string(&source.source)))?;

    let naga_stage = source.stage.to_naga();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == source.entry_point && ep.stage == naga_stage)
    {
        return Err(format!(
            "no {:?} entry point named '{}'",
            source.stage, source.entry_point
        ));
    }

    let reflection = ShaderReflection::from_module(&module).map_err(|e| e.to_string())?;

    let wgsl = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
        .map_err(|e| format!("WGSL generation error: {e}"))?;

    Ok((
        CompiledStage {
            stage: source.stage,
            entry_point: source.entry_point.clone(),
            wgsl,
        },
        reflection,
    ))
}

fn parse(source: &ShaderSource) -> Result<naga::Module, String> {
    match source.language {
        ShaderLanguage::Wgsl => naga::front::wgsl::parse_str(&source.source)
            .map_err(|e| format!("WGSL parse error:\n{}", e.emit_to_string(&source.source))),
        ShaderLanguage::Glsl => {
            let mut defines = naga::FastHashMap::default();
            defines.insert(source.stage.define().to_string(), String::new());
            let options = naga::front::glsl::Options {
                stage: source.stage.to_naga(),
                defines,
            };
            naga::front::glsl::Frontend::default()
                .parse(&options, &source.source)
                .map_err(|errors| format!("GLSL parse error:\n{errors}"))
        }
    }
}
