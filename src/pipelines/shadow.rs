use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        instance::InstanceRaw,
        texture::Texture,
    },
    pipelines::basic::mk_render_pipeline,
};

/// Depth-only pass from the moon light's point of view.
pub fn mk_shadow_pipeline(
    device: &wgpu::Device,
    shadow_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Shadow Pipeline Layout"),
        bind_group_layouts: &[shadow_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
    };

    mk_render_pipeline(
        device,
        &layout,
        None,
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader,
        None,
        // Slope-scaled offset against shadow acne
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        },
    )
}
