//! # Rime Core
//!
//! GPU-agnostic building blocks for the Rime renderer: owned byte buffers,
//! CPU-side texture data helpers and profiling macros.

pub mod buffer;
pub mod profiling;
pub mod texture;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core version once at startup.
pub fn init() {
    log::info!("Rime Core v{} initialized", VERSION);
}
