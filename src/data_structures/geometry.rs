//! CPU-side geometry: vertices, indices and the procedural shapes of the diorama.
//!
//! Geometry is built once during assembly and shared read-only (behind `Arc`)
//! between the scene graph and the GPU upload.

use cgmath::InnerSpace;

/// Describes how a vertex type is laid out in a vertex buffer.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
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
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// An indexed triangle list. Texture coordinates use the wgpu convention
/// (origin in the top-left corner of the image).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(name: &str, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Smooth normals from the area-weighted face normals around each vertex.
    pub fn compute_vertex_normals(&mut self) {
        let mut sums = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            if a.max(b).max(c) >= self.vertices.len() {
                continue;
            }
            let pa: cgmath::Vector3<f32> = self.vertices[a].position.into();
            let pb: cgmath::Vector3<f32> = self.vertices[b].position.into();
            let pc: cgmath::Vector3<f32> = self.vertices[c].position.into();
            let face = (pb - pa).cross(pc - pa);
            sums[a] += face;
            sums[b] += face;
            sums[c] += face;
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            let length = sum.magnitude();
            vertex.normal = if length > f32::EPSILON {
                (sum / length).into()
            } else {
                [0.0, 1.0, 0.0]
            };
        }
    }

    /// A UV sphere centred on the origin.
    ///
    /// The poles are single rows of degenerate-free triangles: the first and
    /// last ring only emit the half of each quad that has area.
    pub fn sphere(name: &str, radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);
        let mut grid = Vec::with_capacity(height_segments as usize + 1);

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            // Centre the texture coordinate of the pole vertices on their segment
            let u_offset = if iy == 0 {
                0.5 / width_segments as f32
            } else if iy == height_segments {
                -0.5 / width_segments as f32
            } else {
                0.0
            };
            let mut row = Vec::with_capacity(width_segments as usize + 1);
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * std::f32::consts::TAU;
                let theta = v * std::f32::consts::PI;
                let position = [
                    -radius * phi.cos() * theta.sin(),
                    radius * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                ];
                let length = (position[0] * position[0]
                    + position[1] * position[1]
                    + position[2] * position[2])
                    .sqrt()
                    .max(f32::EPSILON);
                row.push(vertices.len() as u32);
                vertices.push(ModelVertex {
                    position,
                    tex_coords: [u + u_offset, v],
                    normal: [
                        position[0] / length,
                        position[1] / length,
                        position[2] / length,
                    ],
                });
            }
            grid.push(row);
        }

        let mut indices = Vec::new();
        for iy in 0..height_segments as usize {
            for ix in 0..width_segments as usize {
                let a = grid[iy][ix + 1];
                let b = grid[iy][ix];
                let c = grid[iy + 1][ix];
                let d = grid[iy + 1][ix + 1];
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments as usize - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self::new(name, vertices, indices)
    }

    /// A plane in the XY plane facing +Z.
    pub fn plane(name: &str, width: f32, height: f32, width_segments: u32, height_segments: u32) -> Self {
        let grid_x = width_segments.max(1);
        let grid_y = height_segments.max(1);
        let segment_width = width / grid_x as f32;
        let segment_height = height / grid_y as f32;

        let mut vertices = Vec::with_capacity(((grid_x + 1) * (grid_y + 1)) as usize);
        for iy in 0..=grid_y {
            let y = iy as f32 * segment_height - height / 2.0;
            for ix in 0..=grid_x {
                let x = ix as f32 * segment_width - width / 2.0;
                vertices.push(ModelVertex {
                    position: [x, -y, 0.0],
                    tex_coords: [ix as f32 / grid_x as f32, iy as f32 / grid_y as f32],
                    normal: [0.0, 0.0, 1.0],
                });
            }
        }

        let row = grid_x + 1;
        let mut indices = Vec::with_capacity((grid_x * grid_y * 6) as usize);
        for iy in 0..grid_y {
            for ix in 0..grid_x {
                let a = ix + row * iy;
                let b = ix + row * (iy + 1);
                let c = (ix + 1) + row * (iy + 1);
                let d = (ix + 1) + row * iy;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self::new(name, vertices, indices)
    }
}
