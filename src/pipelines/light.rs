use cgmath::{EuclideanSpace, InnerSpace, SquareMatrix};

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::scene_graph::{NodeKind, Scene},
};

/// Depth offset applied when comparing against the shadow map.
const SHADOW_BIAS: f32 = 0.0005;

/// The point light and the hemisphere light as the shaders see them. Colours
/// are linear.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub distance: f32,
    pub color: [f32; 3],
    pub decay: f32,
    pub sky_color: [f32; 3],
    pub intensity: f32,
    pub ground_color: [f32; 3],
    pub hemisphere_intensity: f32,
    // x: shadows on, y: depth bias
    pub shadow: [f32; 4],
}

impl LightUniform {
    /// Reads the lights of `scene`. Missing lights contribute nothing.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut uniform = Self {
            view_proj: cgmath::Matrix4::identity().into(),
            ..bytemuck::Zeroable::zeroed()
        };

        let cast_shadow = scene
            .root()
            .descendants()
            .into_iter()
            .any(|node| node.cast_shadow && matches!(node.kind, NodeKind::PointLight(_)));

        if let Some((light, position)) = scene.point_light() {
            uniform.position = position.into();
            uniform.distance = light.distance;
            uniform.color = light.color.to_linear();
            uniform.decay = light.decay;
            uniform.intensity = light.intensity;
            uniform.view_proj = shadow_view_proj(position, light.distance).into();
            uniform.shadow = [if cast_shadow { 1.0 } else { 0.0 }, SHADOW_BIAS, 0.0, 0.0];
        }
        if let Some(hemisphere) = scene.hemisphere_light() {
            uniform.sky_color = hemisphere.sky_color.to_linear();
            uniform.ground_color = hemisphere.ground_color.to_linear();
            uniform.hemisphere_intensity = hemisphere.intensity;
        }
        uniform
    }

    pub fn casts_shadow(&self) -> bool {
        self.shadow[0] > 0.5
    }
}

/// The shadow camera looks from the light towards the scene origin with a
/// 90 degree frustum reaching as far as the light does.
pub fn shadow_view_proj(position: cgmath::Vector3<f32>, distance: f32) -> cgmath::Matrix4<f32> {
    let eye = cgmath::Point3::from_vec(position);
    let target = cgmath::Point3::new(0.0, 0.0, 0.0);
    let direction = (target - eye).normalize();
    let up = if direction.y.abs() > 0.99 {
        cgmath::Vector3::unit_z()
    } else {
        cgmath::Vector3::unit_y()
    };
    let far = if distance > 0.0 { distance } else { 500.0 };
    let view = cgmath::Matrix4::look_at_rh(eye, target, up);
    let proj = cgmath::perspective(cgmath::Deg(90.0), 1.0, 0.5, far);
    OPENGL_TO_WGPU_MATRIX * proj * view
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Group 0 of every scene shader: camera, lights and the shadow map.
pub fn mk_globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, stages),
            uniform_entry(1, stages),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("globals_bind_group_layout"),
    })
}

/// Group 1: a uniform block, one texture and its sampler.
pub fn mk_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Group 0 of the shadow pass: only the light's view projection.
pub fn mk_shadow_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        label: Some("shadow_bind_group_layout"),
    })
}
