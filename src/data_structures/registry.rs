//! Geometry and instance registry.
//!
//! The [`ModelRegistry`] owns one vertex buffer and one index buffer shared by every mesh.
//! Each mesh is stored once, however many game objects use it; what changes at runtime is
//! its live instance count. Whenever any count changes the registry rebuilds, in
//! registration order:
//!
//! - the instance offsets and the instance-ID buffer (`0..total`),
//! - the duplicated draw index buffer, holding `instance_count` copies of each mesh's
//!   indices back to back.
//!
//! The rebuild is global rather than a per-mesh patch, since shifting one mesh's region
//! would move every region after it anyway.

use std::collections::HashMap;

use crate::{
    config::EngineConfig,
    data_structures::{
        buffer::GrowableBuffer,
        model::{MeshData, MeshRecord, VERTEX_FLOATS},
    },
    error::{EngineError, Result},
    render::DrawCommand,
};

#[derive(Debug)]
pub struct ModelRegistry {
    vertices: GrowableBuffer<f32>,
    indices: GrowableBuffer<u32>,
    duplicated: GrowableBuffer<u32>,
    instance_ids: Vec<u32>,
    // Insertion order is the iteration order everything else relies on.
    meshes: Vec<MeshRecord>,
    slots: HashMap<String, usize>,
    revision: u64,
}

impl ModelRegistry {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            vertices: GrowableBuffer::new(config.min_vertex_capacity),
            indices: GrowableBuffer::new(config.min_index_capacity),
            duplicated: GrowableBuffer::new(config.min_index_capacity),
            instance_ids: Vec::new(),
            meshes: Vec::new(),
            slots: HashMap::new(),
            revision: 0,
        }
    }

    /// Register `mesh` under `name`, appending its geometry to the shared buffers.
    ///
    /// Loading a name twice is a no-op: meshes are pooled and never unloaded. The new
    /// record starts without instances.
    pub fn load_mesh(&mut self, name: &str, mesh: &MeshData) -> Result<()> {
        if self.slots.contains_key(name) {
            log::debug!("mesh `{name}` already loaded, keeping the existing geometry");
            return Ok(());
        }
        validate(name, mesh)?;

        let base_vertex = (self.vertices.len() / VERTEX_FLOATS) as u32;
        let vertex_range = self.vertices.extend_from_slice(&mesh.vertices);
        let global: Vec<u32> = mesh.indices.iter().map(|i| i + base_vertex).collect();
        let index_range = self.indices.extend_from_slice(&global);

        let record = MeshRecord {
            name: name.to_string(),
            vertex_start: vertex_range.start as u32,
            vertex_len: vertex_range.len() as u32,
            index_start: index_range.start as u32,
            index_len: index_range.len() as u32,
            instance_count: 0,
            instance_offset: self.instance_ids.len() as u32,
            duplicated_start: self.duplicated.len() as u32,
            duplicated_len: 0,
            sub_ranges: mesh.sub_ranges.clone(),
        };
        log::debug!(
            "loaded mesh `{}`: {} vertices, {} indices, {} sub-range(s)",
            name,
            mesh.vertex_count(),
            mesh.indices.len(),
            record.sub_ranges.len()
        );
        self.slots.insert(name.to_string(), self.meshes.len());
        self.meshes.push(record);
        Ok(())
    }

    pub fn add_instances(&mut self, name: &str, count: u32) -> Result<()> {
        let slot = self.slot(name)?;
        self.meshes[slot].instance_count += count;
        self.rebuild();
        Ok(())
    }

    pub fn remove_instances(&mut self, name: &str, count: u32) -> Result<()> {
        let slot = self.slot(name)?;
        let available = self.meshes[slot].instance_count;
        if count > available {
            log::error!("cannot remove {count} instance(s) of `{name}`, only {available} live");
            return Err(EngineError::InsufficientInstances {
                name: name.to_string(),
                requested: count,
                available,
            });
        }
        self.meshes[slot].instance_count -= count;
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        self.duplicated.clear();
        self.instance_ids.clear();
        for mesh in self.meshes.iter_mut() {
            let first = self.instance_ids.len() as u32;
            mesh.instance_offset = first;
            self.instance_ids.extend(first..first + mesh.instance_count);

            let start = mesh.index_start as usize;
            let end = start + mesh.index_len as usize;
            mesh.duplicated_start = self.duplicated.len() as u32;
            for _ in 0..mesh.instance_count {
                self.duplicated.extend_from_slice(&self.indices.as_slice()[start..end]);
            }
            mesh.duplicated_len = self.duplicated.len() as u32 - mesh.duplicated_start;
        }
        self.revision += 1;
        log::trace!(
            "rebuilt instance buffers: {} instance(s), {} duplicated indices",
            self.instance_ids.len(),
            self.duplicated.len()
        );
    }

    fn slot(&self, name: &str) -> Result<usize> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownMesh(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn record(&self, name: &str) -> Result<&MeshRecord> {
        Ok(&self.meshes[self.slot(name)?])
    }

    /// Number of deduplicated indices of one copy of the mesh.
    pub fn index_count(&self, name: &str) -> Result<u32> {
        Ok(self.record(name)?.index_len)
    }

    pub fn instance_count(&self, name: &str) -> Result<u32> {
        Ok(self.record(name)?.instance_count)
    }

    /// Where this mesh's copies start in the duplicated draw index buffer.
    pub fn draw_index_offset(&self, name: &str) -> Result<u32> {
        Ok(self.record(name)?.duplicated_start)
    }

    pub fn duplicated_index_len(&self, name: &str) -> Result<u32> {
        Ok(self.record(name)?.duplicated_len)
    }

    pub fn instance_offset(&self, name: &str) -> Result<u32> {
        Ok(self.record(name)?.instance_offset)
    }

    /// All records in registration order.
    pub fn meshes(&self) -> impl Iterator<Item = &MeshRecord> {
        self.meshes.iter()
    }

    pub fn total_instances(&self) -> usize {
        self.instance_ids.len()
    }

    /// Draw parameters of every mesh that currently has live instances, in registry order.
    pub fn draw_commands(&self) -> impl Iterator<Item = DrawCommand<'_>> {
        self.meshes
            .iter()
            .filter(|mesh| mesh.instance_count > 0)
            .map(DrawCommand::from)
    }

    pub fn for_each_drawable_mesh<F>(&self, mut f: F)
    where
        F: FnMut(&DrawCommand<'_>),
    {
        self.draw_commands().for_each(|command| f(&command));
    }

    pub fn vertices(&self) -> &GrowableBuffer<f32> {
        &self.vertices
    }

    pub fn indices(&self) -> &GrowableBuffer<u32> {
        &self.indices
    }

    pub fn duplicated_indices(&self) -> &GrowableBuffer<u32> {
        &self.duplicated
    }

    pub fn instance_ids(&self) -> &[u32] {
        &self.instance_ids
    }

    /// Bumped by every instance rebuild.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

fn validate(name: &str, mesh: &MeshData) -> Result<()> {
    let invalid = |reason: String| EngineError::InvalidGeometry {
        name: name.to_string(),
        reason,
    };
    if mesh.vertices.len() % VERTEX_FLOATS != 0 {
        return Err(invalid(format!(
            "{} floats is not a whole number of {VERTEX_FLOATS}-float vertices",
            mesh.vertices.len()
        )));
    }
    let vertex_count = mesh.vertex_count() as u32;
    if let Some(index) = mesh.indices.iter().find(|&&i| i >= vertex_count) {
        return Err(invalid(format!(
            "index {index} out of range for {vertex_count} vertices"
        )));
    }
    let index_count = mesh.indices.len() as u32;
    if let Some(sub) = mesh
        .sub_ranges
        .iter()
        .find(|s| s.index_offset + s.index_count > index_count)
    {
        return Err(invalid(format!(
            "sub-range `{}` ends past the {index_count} indices",
            sub.material
        )));
    }
    Ok(())
}
