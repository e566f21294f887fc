use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        instance::InstanceRaw,
        material::WaterMaterial,
        scene_graph::WaterParameters,
        texture::Texture,
    },
    pipelines::basic::{mk_render_pipeline, with_common},
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WaterUniform {
    pub sun_direction: [f32; 3],
    pub time: f32,
    pub sun_color: [f32; 3],
    pub distortion_scale: f32,
    pub water_color: [f32; 3],
    pub size: f32,
}

impl WaterUniform {
    pub fn new(material: &WaterMaterial, parameters: &WaterParameters) -> Self {
        Self {
            sun_direction: material.sun_direction.into(),
            time: parameters.time,
            sun_color: material.sun_color.to_linear(),
            distortion_scale: parameters.distortion_scale,
            water_color: material.water_color.to_linear(),
            size: parameters.size,
        }
    }
}

pub fn mk_water_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    globals_layout: &wgpu::BindGroupLayout,
    water_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Water Pipeline Layout"),
        bind_group_layouts: &[globals_layout, water_layout],
        push_constant_ranges: &[],
    });

    mk_render_pipeline(
        device,
        &layout,
        Some(config.format),
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        with_common("Water Shader", include_str!("water.wgsl")),
        Some(wgpu::Face::Back),
        wgpu::DepthBiasState::default(),
    )
}
