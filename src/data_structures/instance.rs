//! Transformation data for scene nodes and its GPU representation.
//!
//! Every scene node owns exactly one [`Instance`]. World matrices are derived
//! from the chain of local instances each frame and uploaded as [`InstanceRaw`]
//! into a per-node instance buffer.

use cgmath::{InnerSpace, Matrix, Rad, Rotation3, SquareMatrix};

use crate::data_structures::geometry::Vertex;

/// Local transform of a scene node: position, rotation and scale.
///
/// The rotation is stored as XYZ Euler angles in radians, so that the same
/// numeric fields can be tuned live. Use [`Instance::quaternion`] whenever a
/// composed rotation is needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Vector3<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Vector3::new(0.0, 0.0, 0.0),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_position(mut self, position: impl Into<cgmath::Vector3<f32>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_rotation(mut self, rotation: impl Into<cgmath::Vector3<f32>>) -> Self {
        self.rotation = rotation.into();
        self
    }

    pub fn with_scale(mut self, scale: impl Into<cgmath::Vector3<f32>>) -> Self {
        self.scale = scale.into();
        self
    }

    /// The Euler angles applied in X, then Y, then Z order (intrinsic).
    pub fn quaternion(&self) -> cgmath::Quaternion<f32> {
        euler_to_quaternion(self.rotation)
    }

    pub fn set_quaternion(&mut self, rotation: cgmath::Quaternion<f32>) {
        self.rotation = quaternion_to_euler(rotation);
    }

    /// Rotates around one of the node's own axes, the way a boat pitches or rolls
    /// independently of its heading.
    pub fn rotate_local(&mut self, axis: cgmath::Vector3<f32>, angle: f32) {
        let delta = cgmath::Quaternion::from_axis_angle(axis.normalize(), Rad(angle));
        self.set_quaternion(self.quaternion() * delta);
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.quaternion())
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
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

pub fn euler_to_quaternion(euler: cgmath::Vector3<f32>) -> cgmath::Quaternion<f32> {
    cgmath::Quaternion::from_angle_x(Rad(euler.x))
        * cgmath::Quaternion::from_angle_y(Rad(euler.y))
        * cgmath::Quaternion::from_angle_z(Rad(euler.z))
}

/// Decomposes a rotation into XYZ Euler angles.
///
/// `m` is indexed column-first (`m.z.x` is row 1, column 3).
pub fn quaternion_to_euler(rotation: cgmath::Quaternion<f32>) -> cgmath::Vector3<f32> {
    let m = cgmath::Matrix3::from(rotation);
    let m13 = m.z.x;
    let y = m13.clamp(-1.0, 1.0).asin();
    let (x, z) = if m13.abs() < 0.999_999_9 {
        ((-m.z.y).atan2(m.z.z), (-m.y.x).atan2(m.x.x))
    } else {
        (m.y.z.atan2(m.y.y), 0.0)
    };
    cgmath::Vector3::new(x, y, z)
}

/// The raw instance is the actual data stored on the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl InstanceRaw {
    /// Packs a world matrix. The normal matrix is the inverse transpose of the
    /// upper 3x3 so that non-uniform scales keep normals perpendicular.
    pub fn from_world(world: cgmath::Matrix4<f32>) -> Self {
        let upper = cgmath::Matrix3::from_cols(
            world.x.truncate(),
            world.y.truncate(),
            world.z.truncate(),
        );
        let normal = upper
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(upper);
        Self {
            model: world.into(),
            normal: normal.into(),
        }
    }
}

/**
 * The model matrix takes four vertex slots (one per column) and the normal
 * matrix three more. Locations 0..=2 are used by `ModelVertex`.
 */
impl Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Shaders only advance to the next entry when a new instance starts
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
