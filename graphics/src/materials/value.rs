//! Typed values that can be written into uniform fields.

use bytemuck::Pod;

use crate::shader::reflection::{ScalarType, UniformDecl, UniformType};

/// A plain value with a known uniform type.
///
/// The bytes of the value are copied into the field as-is, so
/// `size_of::<Self>()` must equal the reflected field size.
pub trait UniformValue: Pod {
    /// Uniform type this value represents.
    fn uniform_type() -> UniformType;

    /// Whether this value can be written into `decl`.
    fn fits(decl: &UniformDecl) -> bool {
        decl.ty == Self::uniform_type() && decl.size == std::mem::size_of::<Self>()
    }
}

macro_rules! impl_scalar {
    ($ty:ty, $scalar:expr) => {
        impl UniformValue for $ty {
            fn uniform_type() -> UniformType {
                UniformType::Scalar($scalar)
            }
        }
    };
}

macro_rules! impl_vector {
    ($ty:ty, $scalar:expr, $size:expr) => {
        impl UniformValue for $ty {
            fn uniform_type() -> UniformType {
                UniformType::Vector {
                    scalar: $scalar,
                    size: $size,
                }
            }
        }
    };
}

impl_scalar!(f32, ScalarType::Float);
impl_scalar!(i32, ScalarType::Int);
impl_scalar!(u32, ScalarType::UInt);

impl_vector!([f32; 2], ScalarType::Float, 2);
impl_vector!([f32; 3], ScalarType::Float, 3);
impl_vector!([f32; 4], ScalarType::Float, 4);
impl_vector!([i32; 2], ScalarType::Int, 2);
impl_vector!([i32; 3], ScalarType::Int, 3);
impl_vector!([i32; 4], ScalarType::Int, 4);
impl_vector!([u32; 2], ScalarType::UInt, 2);
impl_vector!([u32; 3], ScalarType::UInt, 3);
impl_vector!([u32; 4], ScalarType::UInt, 4);
impl_vector!(glam::Vec2, ScalarType::Float, 2);
impl_vector!(glam::Vec3, ScalarType::Float, 3);
impl_vector!(glam::Vec4, ScalarType::Float, 4);
impl_vector!(glam::IVec4, ScalarType::Int, 4);
impl_vector!(glam::UVec4, ScalarType::UInt, 4);

// Uniform matrices store each column padded to 16 bytes.
impl UniformValue for [[f32; 4]; 4] {
    fn uniform_type() -> UniformType {
        UniformType::Matrix {
            columns: 4,
            rows: 4,
        }
    }
}

impl UniformValue for [[f32; 4]; 3] {
    fn uniform_type() -> UniformType {
        UniformType::Matrix {
            columns: 3,
            rows: 3,
        }
    }
}

impl UniformValue for [[f32; 2]; 2] {
    fn uniform_type() -> UniformType {
        UniformType::Matrix {
            columns: 2,
            rows: 2,
        }
    }
}

impl UniformValue for glam::Mat4 {
    fn uniform_type() -> UniformType {
        UniformType::Matrix {
            columns: 4,
            rows: 4,
        }
    }
}
