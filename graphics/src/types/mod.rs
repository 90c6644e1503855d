//! Common types and descriptors for graphics resources.
//!
//! Usage flags, descriptor structs and the identifiers recorded by the
//! bind context.

mod buffer;
mod ids;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use ids::{BufferId, InstanceId, MaterialId, ShaderId, TextureId};
pub use texture::{TextureDescriptor, TextureDimension};

pub use rime_core::texture::{TextureFormat, TextureWrap};
