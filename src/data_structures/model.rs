//! Mesh geometry as produced by the loaders and as stored by the registry.

/// Number of scalars per interleaved vertex: `position.xyz, uv.xy`.
pub const VERTEX_FLOATS: usize = 5;

/// A contiguous slice of a mesh's indices drawn with one texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubRange {
    /// Offset relative to the first index of the mesh.
    pub index_offset: u32,
    pub index_count: u32,
    pub material: String,
    /// Atlas entry to sample; equals `material` unless a material library mapped it.
    pub texture: String,
}

/// Parsed, triangulated and deduplicated mesh geometry.
///
/// `indices` are local to `vertices` (index 0 is the first vertex of this mesh).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub sub_ranges: Vec<SubRange>,
    /// Material libraries referenced by the source (OBJ `mtllib`).
    pub material_libs: Vec<String>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_FLOATS
    }

    /// Position and texture coordinate of vertex `i`.
    pub fn vertex(&self, i: usize) -> ([f32; 3], [f32; 2]) {
        let v = &self.vertices[i * VERTEX_FLOATS..(i + 1) * VERTEX_FLOATS];
        ([v[0], v[1], v[2]], [v[3], v[4]])
    }

    /// Names the atlas has to know about to texture this mesh.
    ///
    /// Meshes without sub-ranges are textured by their own name.
    pub fn texture_names<'a>(&'a self, mesh_name: &'a str) -> Vec<&'a str> {
        if self.sub_ranges.is_empty() {
            vec![mesh_name]
        } else {
            self.sub_ranges.iter().map(|s| s.texture.as_str()).collect()
        }
    }
}

/// Bookkeeping for one registered mesh. All offsets are element offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshRecord {
    pub name: String,
    pub vertex_start: u32,
    pub vertex_len: u32,
    pub index_start: u32,
    pub index_len: u32,
    pub instance_count: u32,
    /// First slot of this mesh's instances in the instance-ID buffer.
    pub instance_offset: u32,
    pub duplicated_start: u32,
    pub duplicated_len: u32,
    pub sub_ranges: Vec<SubRange>,
}

impl MeshRecord {
    /// Index of this mesh's first vertex, which its stored indices are offset by.
    pub fn base_vertex(&self) -> u32 {
        self.vertex_start / VERTEX_FLOATS as u32
    }
}

/// Layout description of a vertex type stored on the GPU.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// One interleaved vertex as the GPU sees it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}
