//! herd-engine
//!
//! The resource manager and instanced-draw batching core of a small wgpu game client. It
//! loads meshes and textures once, packs them into shared GPU buffers and one texture
//! atlas, and tracks how many live copies of every mesh the game currently has, so the
//! render loop can draw each mesh with all of its instances in a single call.
//!
//! High-level modules
//! - `config`: engine configuration and its defaults
//! - `context`: owns the registry, transform store and atlas, and keeps them in lockstep
//! - `data_structures`: buffers, mesh records, instances, transforms and the atlas
//! - `error`: the error type shared by every fallible operation
//! - `resources`: asset sources and the OBJ, GLB and image loaders
//! - `render`: draw commands, GPU buffer mirrors and draw helpers
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use config::EngineConfig;
pub use context::{Context, InstanceHandle};
pub use data_structures::{
    atlas::{AtlasRect, TextureAtlas, UvRect},
    instance::Instance,
    model::{MeshData, SubRange},
    registry::ModelRegistry,
    transforms::{EncodedTransforms, InstanceKey, TransformEncoding, TransformStore},
};
pub use error::{EngineError, Result};
pub use render::DrawCommand;
pub use resources::{AssetSource, DirAssets, MemoryAssets};

/// Install the platform logger: `env_logger` natively, the browser console on the web.
///
/// Calling it more than once is harmless.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("logger already initialized: {e}");
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("logger already initialized: {e}");
        }
    }
}
