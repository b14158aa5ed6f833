// src/lib.rs
//! matstream: material / shader-item binding and texture streaming
//! prediction for a real-time renderer.
//!
//! - [`Material`]: shared, reference-counted binding of a shader item with
//!   sub-materials, layers and streaming prediction zones
//! - [`MaterialManager`]: default material, global debug views, registry
//! - [`render`]: the backend traits the core calls into
//! - [`texture_slots`]: texture slot semantics table

pub mod config;
pub mod context;
pub mod debug_view;
pub mod error;
pub mod flags;
pub mod frame;
pub mod layer;
pub mod manager;
pub mod material;
pub mod material_name;
pub mod mesh;
pub mod params;
pub mod registry;
pub mod render;
pub mod shader_item;
pub mod streaming;
pub mod surface;
pub mod texture_slots;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::MaterialConfig;
pub use context::{MaterialContext, MaterialContextBuilder};
pub use error::{Error, Result};
pub use flags::{CopyFlags, MaterialFlags};
pub use layer::MaterialLayer;
pub use manager::MaterialManager;
pub use material::Material;
pub use registry::MaterialHandle;
pub use shader_item::ShaderItem;
pub use streaming::{RoundCounters, StreamingRounds, UpdateKind};
pub use texture_slots::TextureSlot;

/// Install the `env_logger` backend for the `log` macros. `RUST_LOG`
/// overrides the default level. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .format_target(false)
        .try_init();
}
