//! Error types shared by the loaders, the registry and the transform store.

use thiserror::Error;

/// Everything that can go wrong while loading, batching or flushing.
///
/// `Format`, `AssetNotFound` and `AssetDecode` concern a single asset and leave the rest of
/// the engine usable. The remaining variants signal a bookkeeping bug in the caller: the
/// engine refuses the operation and keeps its state unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed mesh source: {0}")]
    Format(String),

    #[error("invalid geometry for mesh `{name}`: {reason}")]
    InvalidGeometry { name: String, reason: String },

    #[error("mesh `{0}` is not registered")]
    UnknownMesh(String),

    #[error("cannot remove {requested} instance(s) of `{name}`, only {available} live")]
    InsufficientInstances {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("failed to decode image `{name}`: {reason}")]
    AssetDecode { name: String, reason: String },

    #[error("{transforms} transform(s) tracked but {instances} instance(s) registered")]
    InstanceCountMismatch { transforms: usize, instances: usize },

    #[error("mesh `{name}` tracks {transforms} transform(s) but has {instances} instance(s)")]
    MeshInstanceMismatch {
        name: String,
        transforms: usize,
        instances: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
