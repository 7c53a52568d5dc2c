//! Per-instance transform store.
//!
//! Game objects register their transform under the mesh they render. Once per frame
//! [`TransformStore::flush`] flattens every live transform into one buffer laid out as a
//! texture: 4 RGBA texels (one matrix column each) per row, one row per instance, rows in
//! the same order as the registry's instance IDs.

use std::collections::HashMap;

use crate::{
    data_structures::{instance::Instance, registry::ModelRegistry},
    error::{EngineError, Result},
};

/// Handle of one tracked transform, unique for the lifetime of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey(u64);

/// How [`EncodedTransforms::data`] stores each matrix scalar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformEncoding {
    /// Native `f32` texels (`Rgba32Float`).
    Float,
    /// One byte per scalar (`Rgba8Unorm`): `clamp(v / scale, -1, 1)` mapped onto `0..=255`.
    Byte { scale: f32 },
}

impl TransformEncoding {
    pub const DEFAULT_BYTE_SCALE: f32 = 64.0;

    pub fn byte_default() -> Self {
        Self::Byte {
            scale: Self::DEFAULT_BYTE_SCALE,
        }
    }

    pub fn bytes_per_scalar(&self) -> usize {
        match self {
            Self::Float => 4,
            Self::Byte { .. } => 1,
        }
    }
}

/// Quantize one scalar for [`TransformEncoding::Byte`].
pub fn encode_byte(value: f32, scale: f32) -> u8 {
    let normalized = (value / scale).clamp(-1.0, 1.0);
    ((normalized * 0.5 + 0.5) * 255.0).round() as u8
}

/// Inverse of [`encode_byte`], up to quantization error.
pub fn decode_byte(byte: u8, scale: f32) -> f32 {
    (byte as f32 / 255.0 * 2.0 - 1.0) * scale
}

/// The flushed transforms, ready to be written into the transform texture.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedTransforms {
    pub encoding: TransformEncoding,
    pub instance_count: usize,
    pub data: Vec<u8>,
}

impl EncodedTransforms {
    /// Texture width in texels: one RGBA texel per matrix column.
    pub const WIDTH: u32 = 4;

    pub fn height(&self) -> u32 {
        self.instance_count as u32
    }

    pub fn bytes_per_row(&self) -> u32 {
        Self::WIDTH * 4 * self.encoding.bytes_per_scalar() as u32
    }

    /// Scale the shader multiplies decoded bytes by; `1.0` for float data.
    pub fn scale(&self) -> f32 {
        match self.encoding {
            TransformEncoding::Float => 1.0,
            TransformEncoding::Byte { scale } => scale,
        }
    }

    /// Scalar `i` decoded back to `f32`.
    pub fn value(&self, i: usize) -> f32 {
        match self.encoding {
            TransformEncoding::Float => {
                bytemuck::pod_read_unaligned::<f32>(&self.data[i * 4..i * 4 + 4])
            }
            TransformEncoding::Byte { scale } => decode_byte(self.data[i], scale),
        }
    }
}

#[derive(Debug)]
pub struct TransformStore {
    objects: HashMap<String, Vec<(InstanceKey, Instance)>>,
    encoding: TransformEncoding,
    next_key: u64,
}

impl TransformStore {
    pub fn new(encoding: TransformEncoding) -> Self {
        Self {
            objects: HashMap::new(),
            encoding,
            next_key: 0,
        }
    }

    pub fn encoding(&self) -> TransformEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TransformEncoding) {
        self.encoding = encoding;
    }

    /// Start tracking `transform` as the newest instance of `mesh`.
    pub fn add_instance(&mut self, mesh: &str, transform: Instance) -> InstanceKey {
        let key = InstanceKey(self.next_key);
        self.next_key += 1;
        self.objects
            .entry(mesh.to_string())
            .or_default()
            .push((key, transform));
        key
    }

    /// Stop tracking `key`. Returns `false` (and logs) when it was not tracked under `mesh`;
    /// a repeated destroy must not take down the frame.
    pub fn remove_instance(&mut self, mesh: &str, key: InstanceKey) -> bool {
        let Some(list) = self.objects.get_mut(mesh) else {
            log::warn!("no transforms tracked for mesh `{mesh}`, ignoring removal of {key:?}");
            return false;
        };
        match list.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => {
                log::warn!("transform {key:?} of mesh `{mesh}` is not tracked, ignoring removal");
                false
            }
        }
    }

    /// Replace the transform of a live instance. Returns `false` when `key` is unknown.
    pub fn set_transform(&mut self, mesh: &str, key: InstanceKey, transform: Instance) -> bool {
        let entry = self
            .objects
            .get_mut(mesh)
            .and_then(|list| list.iter_mut().find(|(k, _)| *k == key));
        match entry {
            Some((_, current)) => {
                *current = transform;
                true
            }
            None => false,
        }
    }

    pub fn transform(&self, mesh: &str, key: InstanceKey) -> Option<&Instance> {
        self.objects
            .get(mesh)?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, t)| t)
    }

    /// Live transforms of `mesh`, in flush order.
    pub fn count(&self, mesh: &str) -> usize {
        self.objects.get(mesh).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }

    /// Flatten every transform, in registry order, into the configured encoding.
    ///
    /// Fails when the store and the registry disagree about how many instances exist: the
    /// instance IDs would then point at the wrong matrices.
    pub fn flush(&self, registry: &ModelRegistry) -> Result<EncodedTransforms> {
        let transforms = self.total();
        let instances = registry.total_instances();
        if transforms != instances {
            log::error!("transform store drifted: {transforms} transform(s), {instances} instance(s)");
            return Err(EngineError::InstanceCountMismatch {
                transforms,
                instances,
            });
        }

        let mut scalars = Vec::with_capacity(transforms * 16);
        for mesh in registry.meshes() {
            let list = self.objects.get(&mesh.name).map_or(&[][..], Vec::as_slice);
            if list.len() != mesh.instance_count as usize {
                log::error!(
                    "mesh `{}` drifted: {} transform(s), {} instance(s)",
                    mesh.name,
                    list.len(),
                    mesh.instance_count
                );
                return Err(EngineError::MeshInstanceMismatch {
                    name: mesh.name.clone(),
                    transforms: list.len(),
                    instances: mesh.instance_count as usize,
                });
            }
            for (_, transform) in list {
                scalars.extend_from_slice(&transform.to_columns());
            }
        }

        let data: Vec<u8> = match self.encoding {
            TransformEncoding::Float => bytemuck::cast_slice(&scalars).to_vec(),
            TransformEncoding::Byte { scale } => {
                scalars.iter().map(|&v| encode_byte(v, scale)).collect()
            }
        };
        Ok(EncodedTransforms {
            encoding: self.encoding,
            instance_count: transforms,
            data,
        })
    }
}
