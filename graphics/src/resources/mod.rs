//! GPU resources.
//!
//! Resource objects created by [`GraphicsDevice`]:
//! - [`VertexBuffer`] / [`IndexBuffer`] - geometry buffers with a CPU copy
//! - [`Texture`] - 2D or cube texture with a lockable CPU image
//!
//! Resources are shared with [`Arc`] and can be sent across threads. Binding
//! always goes through a [`BindContext`].
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc
//! [`BindContext`]: crate::BindContext

mod buffer;
mod texture;

pub use buffer::{IndexBuffer, VertexBuffer};
pub use texture::{Texture, TextureLock};
