//! Material system.
//!
//! Materials come in two levels:
//!
//! - [`Material`] - CPU storage for a shader's `Material` uniform block plus
//!   its textures, shared by many objects
//! - [`MaterialInstance`] - per-object copy that can override single fields
//!
//! Writes to a material propagate to every live instance, except for the
//! fields that instance has overridden.
//!
//! # Example
//!
//! ```ignore
//! let material = device.create_material(&shader)?;
//! material.set("Roughness", 0.5f32)?;
//!
//! let red = device.create_material_instance(&material);
//! red.set("Albedo", [1.0f32, 0.0, 0.0])?;
//!
//! red.bind(&mut ctx)?;
//! ```

mod instance;
mod material;
mod value;

pub use instance::MaterialInstance;
pub use material::{MAX_TEXTURE_SLOTS, Material};
pub use value::UniformValue;
