use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        instance::InstanceRaw,
        material::Side,
        texture::Texture,
    },
    pipelines::basic::{mk_render_pipeline, with_common},
};

/// Per-draw block shared by the basic and the phong shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub repeat: [f32; 2],
    pub receive_shadow: f32,
    pub _padding: f32,
}

/// Diffuse and specular shading under the moon light, with shadows.
pub fn mk_phong_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
    side: Side,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Phong Pipeline Layout"),
        bind_group_layouts: &[globals_layout, material_layout],
        push_constant_ranges: &[],
    });

    mk_render_pipeline(
        device,
        &layout,
        Some(config.format),
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        with_common("Phong Shader", include_str!("phong.wgsl")),
        side.cull_mode(),
        wgpu::DepthBiasState::default(),
    )
}
