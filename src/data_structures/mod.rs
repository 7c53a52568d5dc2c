//! Engine data structures: buffers, meshes, instances, transforms and the atlas.
//!
//! - `atlas` packs every texture into one shared image
//! - `buffer` is the doubling CPU buffer the registry appends geometry to
//! - `instance` holds per-instance transformation data and the instance-ID vertex layout
//! - `model` contains parsed mesh data, registry records and the vertex layout
//! - `registry` stores all geometry and tracks live instance counts
//! - `texture` wraps GPU textures
//! - `transforms` flattens per-instance transforms for the GPU

pub mod atlas;
pub mod buffer;
pub mod instance;
pub mod model;
pub mod registry;
pub mod texture;
pub mod transforms;
