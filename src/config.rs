//! Engine configuration.
//!
//! Every field has a sensible default. Hosts adjust a `EngineConfig::default()` by
//! assigning fields before handing it to [`Context::new`](crate::context::Context::new),
//! or derive one from the device limits via [`EngineConfig::for_limits`].

use crate::data_structures::transforms::TransformEncoding;

/// Initial vertex buffer capacity in floats.
pub const MIN_VERTEX_CAPACITY: usize = 256;
/// Initial index buffer capacity in indices.
pub const MIN_INDEX_CAPACITY: usize = 126;
/// Atlas width used when the host did not report its texture limits.
pub const DEFAULT_MAX_ATLAS_WIDTH: u32 = 2048;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub min_vertex_capacity: usize,
    pub min_index_capacity: usize,
    /// Widest row the atlas packer may produce.
    pub max_atlas_width: u32,
    pub transform_encoding: TransformEncoding,
}

impl EngineConfig {
    /// Default configuration with the atlas bounded by the device's 2D texture limit.
    pub fn for_limits(limits: &wgpu::Limits) -> Self {
        Self {
            max_atlas_width: limits.max_texture_dimension_2d.max(1),
            ..Default::default()
        }
    }

    /// Switch the transform texture to byte packing, e.g. when
    /// [`supports_float_transforms`](crate::render::supports_float_transforms) says no.
    pub fn with_transform_encoding(mut self, encoding: TransformEncoding) -> Self {
        self.transform_encoding = encoding;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_vertex_capacity: MIN_VERTEX_CAPACITY,
            min_index_capacity: MIN_INDEX_CAPACITY,
            max_atlas_width: DEFAULT_MAX_ATLAS_WIDTH,
            transform_encoding: TransformEncoding::Float,
        }
    }
}
