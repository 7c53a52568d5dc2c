//! Per-instance transformation data.
//!
//! An [`Instance`] is the transform a game object hands to the
//! [`TransformStore`](crate::data_structures::transforms::TransformStore). The store
//! flattens it into a 4x4 column-major matrix once per frame. The GPU tells instances apart
//! through the [`InstanceId`] attribute, whose value indexes that flattened buffer.

use cgmath::One;

use crate::data_structures::model;

/// Per-instance transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// The model matrix as 16 scalars, column after column.
    pub fn to_columns(&self) -> [f32; 16] {
        let columns: [[f32; 4]; 4] = self.to_matrix().into();
        bytemuck::cast(columns)
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The instance ID is the only per-instance attribute stored in a vertex buffer. It is the
 * global instance index, i.e. the row of the transform texture holding this instance's
 * model matrix.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceId(pub u32);

/**
 * One `u32` per instance, advanced per instance rather than per vertex. The draw helpers
 * slice the ID buffer at the mesh (or copy) being drawn, so instance 0 of every draw reads
 * its own transform row.
 */
impl model::Vertex for InstanceId {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceId>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 2,
                format: wgpu::VertexFormat::Uint32,
            }],
        }
    }
}
