//! Shader reflection: uniform block layouts and resource bindings.
//!
//! Reflection is read straight off the validated naga module, so every
//! offset and size here is the one the GPU will use. GLSL blocks follow the
//! std140 rules applied by naga's GLSL frontend, WGSL structs follow WGSL's
//! uniform layout rules.
//!
//! ```text
//! layout(std140, set = 0, binding = 0) uniform Material {
//!     float Roughness;   // offset 0,  size 4
//!     vec3  Albedo;      // offset 16, size 12
//! };                     // block size 32
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use naga::{AddressSpace, ScalarKind, TypeInner};

use crate::error::GraphicsError;

/// Scalar component kind of a uniform field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Float,
}

/// Reflected type of a uniform field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// A single scalar.
    Scalar(ScalarType),
    /// A vector of 2 to 4 components.
    Vector { scalar: ScalarType, size: u8 },
    /// A column-major float matrix.
    Matrix { columns: u8, rows: u8 },
    /// A fixed-size array.
    Array {
        element: Box<UniformType>,
        count: u32,
        stride: u32,
    },
    /// A nested struct, written as raw bytes.
    Struct { name: Option<String> },
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::Float => "f32",
        };
        f.write_str(name)
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Vector { scalar, size } => write!(f, "vec{size}<{scalar}>"),
            Self::Matrix { columns, rows } => write!(f, "mat{columns}x{rows}<f32>"),
            Self::Array { element, count, .. } => write!(f, "array<{element}, {count}>"),
            Self::Struct { name } => write!(f, "struct {}", name.as_deref().unwrap_or("<anonymous>")),
        }
    }
}

/// A named field inside a uniform block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformDecl {
    /// Field name as declared in the shader.
    pub name: String,
    /// Byte offset within the block.
    pub offset: usize,
    /// Byte size of the field.
    pub size: usize,
    /// Field type.
    pub ty: UniformType,
}

impl UniformDecl {
    /// Byte range of the field within its block.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Layout of one uniform buffer binding.
///
/// Blocks are immutable once reflected and shared between every material
/// built from the same shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    name: String,
    variable: Option<String>,
    group: u32,
    binding: u32,
    size: usize,
    fields: Vec<UniformDecl>,
}

impl UniformBlock {
    /// Build a block, checking that fields neither overlap nor exceed `size`.
    pub fn new(
        name: impl Into<String>,
        group: u32,
        binding: u32,
        size: usize,
        mut fields: Vec<UniformDecl>,
    ) -> Result<Self, GraphicsError> {
        let name = name.into();
        fields.sort_by_key(|field| field.offset);

        let mut end = 0;
        for field in &fields {
            if field.offset < end {
                return Err(GraphicsError::InvalidParameter(format!(
                    "field '{}' of block '{name}' overlaps the previous field",
                    field.name
                )));
            }
            end = field.offset + field.size;
            if end > size {
                return Err(GraphicsError::LayoutMismatch {
                    block: format!("{name}.{}", field.name),
                    expected: size,
                    actual: end,
                });
            }
        }

        Ok(Self {
            name,
            variable: None,
            group,
            binding,
            size,
            fields,
        })
    }

    /// Record the shader variable this block is bound through.
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// Block name (the struct type name, or the variable name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader variable name, if the block has one.
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// Bind group (descriptor set).
    pub fn group(&self) -> u32 {
        self.group
    }

    /// Binding index within the group.
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Total byte size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields ordered by offset.
    pub fn fields(&self) -> &[UniformDecl] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&UniformDecl> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn matches(&self, name: &str) -> bool {
        self.name == name || self.variable.as_deref() == Some(name)
    }

    fn same_layout(&self, other: &UniformBlock) -> bool {
        self.size == other.size && self.fields == other.fields
    }
}

/// View dimension of a texture binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

/// Kind of a non-buffer resource binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A sampled or depth texture.
    Texture { dimension: TextureViewDimension },
    /// A sampler.
    Sampler { comparison: bool },
}

/// A texture or sampler binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDecl {
    /// Variable name.
    pub name: String,
    /// Bind group (descriptor set).
    pub group: u32,
    /// Binding slot within the group.
    pub binding: u32,
    /// Texture or sampler.
    pub kind: ResourceKind,
}

impl ResourceDecl {
    /// Whether this binding takes a texture.
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, ResourceKind::Texture { .. })
    }
}

/// Everything a shader program exposes for binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    blocks: BTreeMap<String, Arc<UniformBlock>>,
    resources: BTreeMap<String, ResourceDecl>,
}

impl ShaderReflection {
    /// Create an empty reflection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflect the uniform blocks and resource bindings of a naga module.
    pub fn from_module(module: &naga::Module) -> Result<Self, GraphicsError> {
        rime_core::profiling::profile_scope!("shader_reflect");

        let mut reflection = Self::new();
        let ctx = module.to_ctx();

        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let ty = &module.types[var.ty];
            let var_name = var.name.clone().unwrap_or_default();

            match var.space {
                AddressSpace::Uniform => {
                    let block = match &ty.inner {
                        TypeInner::Struct { members, span } => {
                            let fields = members
                                .iter()
                                .enumerate()
                                .map(|(index, member)| UniformDecl {
                                    name: member.name.clone().unwrap_or_else(|| format!("_{index}")),
                                    offset: member.offset as usize,
                                    size: module.types[member.ty].inner.size(ctx) as usize,
                                    ty: uniform_type(module, &module.types[member.ty].inner),
                                })
                                .collect();
                            let name = ty.name.clone().unwrap_or_else(|| var_name.clone());
                            UniformBlock::new(
                                name,
                                binding.group,
                                binding.binding,
                                *span as usize,
                                fields,
                            )?
                        }
                        inner => {
                            let size = inner.size(ctx) as usize;
                            let field = UniformDecl {
                                name: var_name.clone(),
                                offset: 0,
                                size,
                                ty: uniform_type(module, inner),
                            };
                            UniformBlock::new(
                                var_name.clone(),
                                binding.group,
                                binding.binding,
                                size,
                                vec![field],
                            )?
                        }
                    };
                    let block = if var_name.is_empty() {
                        block
                    } else {
                        block.with_variable(var_name)
                    };
                    reflection.insert_block(block)?;
                }
                AddressSpace::Handle => {
                    let kind = match &ty.inner {
                        TypeInner::Image { dim, arrayed, .. } => ResourceKind::Texture {
                            dimension: view_dimension(*dim, *arrayed),
                        },
                        TypeInner::Sampler { comparison } => ResourceKind::Sampler {
                            comparison: *comparison,
                        },
                        _ => continue,
                    };
                    reflection.insert_resource(ResourceDecl {
                        name: var_name,
                        group: binding.group,
                        binding: binding.binding,
                        kind,
                    })?;
                }
                _ => {}
            }
        }

        Ok(reflection)
    }

    /// Look up a uniform block by block name or variable name.
    pub fn uniform_block(&self, name: &str) -> Result<&Arc<UniformBlock>, GraphicsError> {
        self.find_uniform_block(name)
            .ok_or_else(|| GraphicsError::UniformBlockNotFound(name.to_string()))
    }

    /// Look up a uniform block, returning `None` when absent.
    pub fn find_uniform_block(&self, name: &str) -> Option<&Arc<UniformBlock>> {
        self.blocks
            .get(name)
            .or_else(|| self.blocks.values().find(|block| block.matches(name)))
    }

    /// All uniform blocks keyed by block name.
    pub fn uniform_blocks(&self) -> &BTreeMap<String, Arc<UniformBlock>> {
        &self.blocks
    }

    /// All texture and sampler bindings keyed by name.
    pub fn resources(&self) -> &BTreeMap<String, ResourceDecl> {
        &self.resources
    }

    /// Look up a resource binding by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.get(name)
    }

    /// Fold another stage's reflection into this one.
    ///
    /// A block or resource seen by both stages must be declared identically.
    pub fn merge(&mut self, other: ShaderReflection) -> Result<(), GraphicsError> {
        for (_, block) in other.blocks {
            self.insert_shared_block(block)?;
        }
        for (_, resource) in other.resources {
            self.insert_resource(resource)?;
        }
        Ok(())
    }

    fn insert_block(&mut self, block: UniformBlock) -> Result<(), GraphicsError> {
        self.insert_shared_block(Arc::new(block))
    }

    fn insert_shared_block(&mut self, block: Arc<UniformBlock>) -> Result<(), GraphicsError> {
        if let Some(existing) = self.blocks.get(block.name()) {
            if !existing.same_layout(&block) {
                log::error!(
                    "Uniform block '{}' declared with different layouts ({} vs {} bytes)",
                    block.name(),
                    existing.size(),
                    block.size()
                );
                return Err(GraphicsError::LayoutMismatch {
                    block: block.name().to_string(),
                    expected: existing.size(),
                    actual: block.size(),
                });
            }
            return Ok(());
        }
        self.blocks.insert(block.name().to_string(), block);
        Ok(())
    }

    fn insert_resource(&mut self, resource: ResourceDecl) -> Result<(), GraphicsError> {
        if let Some(existing) = self.resources.get(&resource.name) {
            if *existing != resource {
                return Err(GraphicsError::InvalidParameter(format!(
                    "resource '{}' is bound differently across stages",
                    resource.name
                )));
            }
            return Ok(());
        }
        self.resources.insert(resource.name.clone(), resource);
        Ok(())
    }
}

fn scalar_type(kind: ScalarKind) -> ScalarType {
    match kind {
        ScalarKind::Bool => ScalarType::Bool,
        ScalarKind::Sint | ScalarKind::AbstractInt => ScalarType::Int,
        ScalarKind::Uint => ScalarType::UInt,
        ScalarKind::Float | ScalarKind::AbstractFloat => ScalarType::Float,
    }
}

fn uniform_type(module: &naga::Module, inner: &TypeInner) -> UniformType {
    match inner {
        TypeInner::Scalar(scalar) => UniformType::Scalar(scalar_type(scalar.kind)),
        TypeInner::Vector { size, scalar } => UniformType::Vector {
            scalar: scalar_type(scalar.kind),
            size: *size as u8,
        },
        TypeInner::Matrix { columns, rows, .. } => UniformType::Matrix {
            columns: *columns as u8,
            rows: *rows as u8,
        },
        TypeInner::Array { base, size, stride } => UniformType::Array {
            element: Box::new(uniform_type(module, &module.types[*base].inner)),
            count: match size {
                naga::ArraySize::Constant(count) => count.get(),
                _ => 0,
            },
            stride: *stride,
        },
        _ => UniformType::Struct {
            name: module
                .types
                .iter()
                .find(|(_, ty)| ty.inner == *inner)
                .and_then(|(_, ty)| ty.name.clone()),
        },
    }
}

fn view_dimension(dim: naga::ImageDimension, arrayed: bool) -> TextureViewDimension {
    match (dim, arrayed) {
        (naga::ImageDimension::D1, _) => TextureViewDimension::D1,
        (naga::ImageDimension::D2, false) => TextureViewDimension::D2,
        (naga::ImageDimension::D2, true) => TextureViewDimension::D2Array,
        (naga::ImageDimension::D3, _) => TextureViewDimension::D3,
        (naga::ImageDimension::Cube, false) => TextureViewDimension::Cube,
        (naga::ImageDimension::Cube, true) => TextureViewDimension::CubeArray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGSL_MATERIAL: &str = r#"
struct Material {
    Roughness: f32,
    Albedo: vec3<f32>,
}

@group(0) @binding(0) var<uniform> material: Material;
@group(0) @binding(1) var albedo_map: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;
@group(0) @binding(3) var environment: texture_cube<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let base = textureSample(albedo_map, albedo_sampler, vec2<f32>(0.5, 0.5));
    let env = textureSample(environment, albedo_sampler, vec3<f32>(0.0, 1.0, 0.0));
    return base * env * vec4<f32>(material.Albedo, material.Roughness);
}
"#;

    fn reflect(source: &str) -> ShaderReflection {
        let module = naga::front::wgsl::parse_str(source).unwrap();
        ShaderReflection::from_module(&module).unwrap()
    }

    #[test]
    fn test_reflect_wgsl_material_block() {
        let reflection = reflect(WGSL_MATERIAL);
        let block = reflection.uniform_block("Material").unwrap();

        assert_eq!(block.size(), 32);
        assert_eq!(block.group(), 0);
        assert_eq!(block.binding(), 0);
        assert_eq!(block.variable(), Some("material"));

        let roughness = block.field("Roughness").unwrap();
        assert_eq!(roughness.offset, 0);
        assert_eq!(roughness.size, 4);
        assert_eq!(roughness.ty, UniformType::Scalar(ScalarType::Float));

        let albedo = block.field("Albedo").unwrap();
        assert_eq!(albedo.offset, 16);
        assert_eq!(albedo.size, 12);
        assert_eq!(
            albedo.ty,
            UniformType::Vector {
                scalar: ScalarType::Float,
                size: 3
            }
        );
    }

    #[test]
    fn test_lookup_by_variable_name() {
        let reflection = reflect(WGSL_MATERIAL);
        let by_var = reflection.uniform_block("material").unwrap();
        assert_eq!(by_var.name(), "Material");
        assert!(reflection.uniform_block("Lights").is_err());
    }

    #[test]
    fn test_reflect_resources() {
        let reflection = reflect(WGSL_MATERIAL);
        let resources = reflection.resources();
        assert_eq!(resources.len(), 3);

        let albedo = reflection.resource("albedo_map").unwrap();
        assert_eq!(albedo.binding, 1);
        assert_eq!(
            albedo.kind,
            ResourceKind::Texture {
                dimension: TextureViewDimension::D2
            }
        );
        assert!(albedo.is_texture());

        let env = reflection.resource("environment").unwrap();
        assert_eq!(
            env.kind,
            ResourceKind::Texture {
                dimension: TextureViewDimension::Cube
            }
        );

        let sampler = reflection.resource("albedo_sampler").unwrap();
        assert_eq!(sampler.kind, ResourceKind::Sampler { comparison: false });
    }

    #[test]
    fn test_reflect_glsl_std140_block() {
        let source = r#"#version 450
layout(std140, set = 0, binding = 0) uniform Material {
    float Roughness;
    vec3 Albedo;
    mat4 Transform;
};
layout(location = 0) out vec4 o_Color;
void main() {
    o_Color = Transform * vec4(Albedo, Roughness);
}
"#;
        let options = naga::front::glsl::Options::from(naga::ShaderStage::Fragment);
        let module = naga::front::glsl::Frontend::default()
            .parse(&options, source)
            .unwrap();
        let reflection = ShaderReflection::from_module(&module).unwrap();
        let block = reflection.uniform_block("Material").unwrap();

        assert_eq!(block.field("Roughness").unwrap().offset, 0);
        assert_eq!(block.field("Albedo").unwrap().offset, 16);
        let transform = block.field("Transform").unwrap();
        assert_eq!(transform.offset, 32);
        assert_eq!(transform.size, 64);
        assert_eq!(transform.ty, UniformType::Matrix { columns: 4, rows: 4 });
        assert_eq!(block.size(), 96);
    }

    #[test]
    fn test_reflect_scalar_uniform() {
        let source = r#"
@group(1) @binding(0) var<uniform> time: f32;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(time);
}
"#;
        let reflection = reflect(source);
        let block = reflection.uniform_block("time").unwrap();
        assert_eq!(block.group(), 1);
        assert_eq!(block.size(), 4);
        assert_eq!(block.field("time").unwrap().offset, 0);
    }

    #[test]
    fn test_block_rejects_overlap() {
        let field = |name: &str, offset| UniformDecl {
            name: name.to_string(),
            offset,
            size: 8,
            ty: UniformType::Vector {
                scalar: ScalarType::Float,
                size: 2,
            },
        };
        assert!(UniformBlock::new("B", 0, 0, 16, vec![field("a", 0), field("b", 4)]).is_err());
        assert!(matches!(
            UniformBlock::new("B", 0, 0, 12, vec![field("a", 0), field("b", 8)]),
            Err(GraphicsError::LayoutMismatch { .. })
        ));
        assert!(UniformBlock::new("B", 0, 0, 16, vec![field("a", 0), field("b", 8)]).is_ok());
    }

    #[test]
    fn test_merge_identical_blocks() {
        let mut vertex = reflect(WGSL_MATERIAL);
        let fragment = reflect(WGSL_MATERIAL);
        vertex.merge(fragment).unwrap();
        assert_eq!(vertex.uniform_blocks().len(), 1);
    }

    #[test]
    fn test_merge_conflicting_blocks() {
        let mut first = reflect(WGSL_MATERIAL);
        let second = reflect(
            r#"
struct Material { Roughness: f32 }
@group(0) @binding(0) var<uniform> material: Material;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(material.Roughness);
}
"#,
        );
        assert!(matches!(
            first.merge(second),
            Err(GraphicsError::LayoutMismatch { expected: 32, .. })
        ));
    }
}
