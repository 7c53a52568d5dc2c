//! Draw submission.
//!
//! This module turns the CPU-side batching state into GPU work. The render loop keeps one
//! [`GpuBuffers`] and one [`TransformTexture`] alive, syncs them once per frame and then
//! calls [`draw_instanced`] (or [`draw_duplicated`] where instancing is unavailable).
//!
//! # Key types
//!
//! - [`DrawCommand<'a>`] holds everything needed to draw one mesh with all its instances
//! - [`GpuBuffers`] mirrors the registry's shared buffers on the GPU
//! - [`TransformTexture`] holds the flushed per-instance matrices
//!

use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::data_structures::{
    model::{MeshRecord, SubRange},
    registry::ModelRegistry,
    texture::Texture,
    transforms::{EncodedTransforms, TransformEncoding},
};

/// Draw parameters of one mesh, borrowed from its registry record.
///
/// Index ranges refer to the shared index buffer, whose indices are already offset by the
/// mesh's vertex base, so every draw uses a base vertex of 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand<'a> {
    pub name: &'a str,
    pub base_vertex: u32,
    pub index_start: u32,
    pub index_count: u32,
    pub duplicated_start: u32,
    pub duplicated_len: u32,
    pub instance_offset: u32,
    pub instance_count: u32,
    pub sub_ranges: &'a [SubRange],
}

impl<'a> DrawCommand<'a> {
    /// Instanced index ranges: the whole mesh, or one per sub-range.
    pub fn index_ranges(&self) -> Vec<(Range<u32>, Option<&'a SubRange>)> {
        if self.sub_ranges.is_empty() {
            return vec![(self.index_start..self.index_start + self.index_count, None)];
        }
        self.sub_ranges
            .iter()
            .map(|sub| {
                let start = self.index_start + sub.index_offset;
                (start..start + sub.index_count, Some(sub))
            })
            .collect()
    }

    /// Ranges of the duplicated index buffer, one per copy, tagged with the copy they
    /// belong to. Meshes with several textures yield every copy of every sub-range.
    pub fn duplicated_ranges(&self) -> Vec<(u32, Range<u32>, Option<&'a SubRange>)> {
        if self.sub_ranges.is_empty() {
            return (0..self.instance_count)
                .map(|copy| {
                    let start = self.duplicated_start + copy * self.index_count;
                    (copy, start..start + self.index_count, None)
                })
                .collect();
        }
        let mut ranges = Vec::with_capacity(self.sub_ranges.len() * self.instance_count as usize);
        for sub in self.sub_ranges {
            for copy in 0..self.instance_count {
                let start = self.duplicated_start + copy * self.index_count + sub.index_offset;
                ranges.push((copy, start..start + sub.index_count, Some(sub)));
            }
        }
        ranges
    }

    /// Instance IDs of this mesh inside the instance-ID buffer.
    pub fn instances(&self) -> Range<u32> {
        self.instance_offset..self.instance_offset + self.instance_count
    }
}

impl<'a> From<&'a MeshRecord> for DrawCommand<'a> {
    fn from(record: &'a MeshRecord) -> Self {
        DrawCommand {
            name: &record.name,
            base_vertex: record.base_vertex(),
            index_start: record.index_start,
            index_count: record.index_len,
            duplicated_start: record.duplicated_start,
            duplicated_len: record.duplicated_len,
            instance_offset: record.instance_offset,
            instance_count: record.instance_count,
            sub_ranges: &record.sub_ranges,
        }
    }
}

/// One GPU buffer mirroring a CPU-side buffer.
#[derive(Debug)]
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    usage: wgpu::BufferUsages,
    capacity: u64,
    uploaded: u64,
}

impl GpuBuffer {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        capacity: u64,
        data: &[u8],
    ) -> Self {
        let capacity = capacity.max(data.len() as u64).max(4).next_multiple_of(4);
        let mut contents = vec![0u8; capacity as usize];
        contents[..data.len()].copy_from_slice(data);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: &contents,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            buffer,
            label,
            usage,
            capacity,
            uploaded: data.len() as u64,
        }
    }

    /// Upload what was appended since the last call, recreating the buffer when the CPU
    /// side outgrew it.
    fn append(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, capacity: u64, data: &[u8]) {
        if capacity > self.capacity || data.len() as u64 > self.capacity {
            log::debug!("growing GPU buffer `{}` to {capacity} bytes", self.label);
            *self = Self::new(device, self.label, self.usage, capacity, data);
            return;
        }
        let len = data.len() as u64;
        if len > self.uploaded {
            queue.write_buffer(&self.buffer, self.uploaded, &data[self.uploaded as usize..]);
        }
        self.uploaded = len;
    }

    /// Rewrite the whole contents.
    fn replace(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, capacity: u64, data: &[u8]) {
        if data.len() as u64 > self.capacity {
            log::debug!("growing GPU buffer `{}` to {capacity} bytes", self.label);
            *self = Self::new(device, self.label, self.usage, capacity, data);
            return;
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, data);
        }
        self.uploaded = data.len() as u64;
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Size of the GPU allocation in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// The registry's shared buffers on the GPU.
#[derive(Debug)]
pub struct GpuBuffers {
    pub vertex: GpuBuffer,
    pub index: GpuBuffer,
    pub duplicated: GpuBuffer,
    pub instance_ids: GpuBuffer,
    revision: u64,
}

fn bytes_of<T>(elements: usize) -> u64 {
    (elements * std::mem::size_of::<T>()) as u64
}

fn id_capacity(ids: &[u32]) -> u64 {
    bytes_of::<u32>(ids.len().next_power_of_two())
}

impl GpuBuffers {
    pub fn new(device: &wgpu::Device, registry: &ModelRegistry) -> Self {
        let vertices = registry.vertices();
        let indices = registry.indices();
        let duplicated = registry.duplicated_indices();
        let ids = registry.instance_ids();
        Self {
            vertex: GpuBuffer::new(
                device,
                "shared vertex buffer",
                wgpu::BufferUsages::VERTEX,
                bytes_of::<f32>(vertices.capacity()),
                vertices.as_bytes(),
            ),
            index: GpuBuffer::new(
                device,
                "shared index buffer",
                wgpu::BufferUsages::INDEX,
                bytes_of::<u32>(indices.capacity()),
                indices.as_bytes(),
            ),
            duplicated: GpuBuffer::new(
                device,
                "duplicated index buffer",
                wgpu::BufferUsages::INDEX,
                bytes_of::<u32>(duplicated.capacity()),
                duplicated.as_bytes(),
            ),
            instance_ids: GpuBuffer::new(
                device,
                "instance id buffer",
                wgpu::BufferUsages::VERTEX,
                id_capacity(ids),
                bytemuck::cast_slice(ids),
            ),
            revision: registry.revision(),
        }
    }

    /// Bring the GPU copies up to date with `registry`.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, registry: &ModelRegistry) {
        let vertices = registry.vertices();
        let indices = registry.indices();
        self.vertex.append(
            device,
            queue,
            bytes_of::<f32>(vertices.capacity()),
            vertices.as_bytes(),
        );
        self.index.append(
            device,
            queue,
            bytes_of::<u32>(indices.capacity()),
            indices.as_bytes(),
        );

        if registry.revision() != self.revision {
            let duplicated = registry.duplicated_indices();
            let ids = registry.instance_ids();
            self.duplicated.replace(
                device,
                queue,
                bytes_of::<u32>(duplicated.capacity()),
                duplicated.as_bytes(),
            );
            self.instance_ids
                .replace(device, queue, id_capacity(ids), bytemuck::cast_slice(ids));
            self.revision = registry.revision();
        }
    }
}

/// Transform texture: 4 texels per row, one row per instance.
#[derive(Debug)]
pub struct TransformTexture {
    texture: Texture,
    encoding: TransformEncoding,
}

impl TransformTexture {
    pub fn format(encoding: TransformEncoding) -> wgpu::TextureFormat {
        match encoding {
            TransformEncoding::Float => wgpu::TextureFormat::Rgba32Float,
            TransformEncoding::Byte { .. } => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    pub fn new(device: &wgpu::Device, encoding: TransformEncoding, rows: u32) -> Self {
        Self {
            texture: Self::create(device, encoding, rows),
            encoding,
        }
    }

    fn create(device: &wgpu::Device, encoding: TransformEncoding, rows: u32) -> Texture {
        Texture::create(
            device,
            EncodedTransforms::WIDTH,
            rows.max(1),
            Self::format(encoding),
            Some("transform texture"),
        )
    }

    /// Write the flushed transforms. The texture doubles its rows until they fit and is
    /// recreated when the encoding changed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, encoded: &EncodedTransforms) {
        let needed = encoded.height();
        if needed > self.texture.height() || encoded.encoding != self.encoding {
            let mut rows = self.texture.height().max(1);
            while rows < needed {
                rows *= 2;
            }
            log::debug!("recreating transform texture with {rows} row(s)");
            self.texture = Self::create(device, encoded.encoding, rows);
            self.encoding = encoded.encoding;
        }
        self.texture
            .write(queue, &encoded.data, encoded.bytes_per_row(), needed);
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn rows(&self) -> u32 {
        self.texture.height()
    }
}

/// Whether `Rgba32Float` can back the transform texture on this adapter. When it cannot,
/// configure [`TransformEncoding::Byte`].
pub fn supports_float_transforms(adapter: &wgpu::Adapter) -> bool {
    adapter
        .get_texture_format_features(wgpu::TextureFormat::Rgba32Float)
        .allowed_usages
        .contains(wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST)
}

/// Draw every mesh with live instances: one instanced draw per mesh, or per sub-range.
///
/// Vertex slot 0 holds [`ModelVertex`](crate::data_structures::model::ModelVertex)
/// data, slot 1 the [`InstanceId`](crate::data_structures::instance::InstanceId)s of the
/// mesh being drawn. `bind` runs before each draw so the caller can point its uniforms at
/// the right atlas entry.
pub fn draw_instanced<'pass, F>(
    pass: &mut wgpu::RenderPass<'pass>,
    gpu: &GpuBuffers,
    registry: &ModelRegistry,
    mut bind: F,
) where
    F: FnMut(&mut wgpu::RenderPass<'pass>, &DrawCommand<'_>, Option<&SubRange>),
{
    pass.set_vertex_buffer(0, gpu.vertex.buffer().slice(..));
    pass.set_index_buffer(gpu.index.buffer().slice(..), wgpu::IndexFormat::Uint32);
    for command in registry.draw_commands() {
        let ids = command.instances();
        let ids = bytes_of::<u32>(ids.start as usize)..bytes_of::<u32>(ids.end as usize);
        pass.set_vertex_buffer(1, gpu.instance_ids.buffer().slice(ids));
        for (range, sub) in command.index_ranges() {
            bind(&mut *pass, &command, sub);
            pass.draw_indexed(range, 0, 0..command.instance_count);
        }
    }
}

/// Draw every mesh from the duplicated index buffer, one copy of the geometry per
/// instance, without GPU instancing.
///
/// Uses the same vertex layout as [`draw_instanced`]. Slot 1 is pointed at the single
/// [`InstanceId`](crate::data_structures::instance::InstanceId) of the copy being drawn.
pub fn draw_duplicated<'pass, F>(
    pass: &mut wgpu::RenderPass<'pass>,
    gpu: &GpuBuffers,
    registry: &ModelRegistry,
    mut bind: F,
) where
    F: FnMut(&mut wgpu::RenderPass<'pass>, &DrawCommand<'_>, Option<&SubRange>),
{
    pass.set_vertex_buffer(0, gpu.vertex.buffer().slice(..));
    pass.set_index_buffer(gpu.duplicated.buffer().slice(..), wgpu::IndexFormat::Uint32);
    for command in registry.draw_commands() {
        for (copy, range, sub) in command.duplicated_ranges() {
            let id = (command.instance_offset + copy) as usize;
            let id = bytes_of::<u32>(id)..bytes_of::<u32>(id + 1);
            pass.set_vertex_buffer(1, gpu.instance_ids.buffer().slice(id));
            bind(&mut *pass, &command, sub);
            pass.draw_indexed(range, 0, 0..1);
        }
    }
}
