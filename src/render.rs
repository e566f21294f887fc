//! GPU upload and per-frame drawing of an assembled [`Scene`].
//!
//! [`GpuRenderer`] turns every mesh node into a draw item once, right after
//! assembly. The scene's shape never changes afterwards, so each frame only
//! rewrites uniforms and the instance buffer: one [`InstanceRaw`] per node in
//! pre-order, a mesh node at index `i` draws instance `i..i + 1`.
//!
//! A frame consists of two passes:
//!
//! 1. the shadow pass renders shadow casters into the moon light's depth map,
//! 2. the main pass draws every visible mesh with its material's pipeline.

use std::{collections::HashMap, iter, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::{
    camera::CameraUniform,
    context::{Context, ViewportState},
    data_structures::{
        geometry::Geometry,
        instance::InstanceRaw,
        material::{Material, Side, SurfaceMaterial, Wrap},
        scene_graph::{NodeKind, Scene, SceneNode},
        texture::{Texture, TextureData},
    },
    flow::{SceneContext, SceneRenderer},
    pipelines::{
        basic::mk_basic_pipeline,
        light::{LightUniform, mk_globals_layout, mk_material_layout, mk_shadow_layout},
        phong::{MaterialUniform, mk_phong_pipeline},
        shadow::mk_shadow_pipeline,
        water::{WaterUniform, mk_water_pipeline},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum PipelineKind {
    Basic(Side),
    Phong(Side),
    Water,
}

impl PipelineKind {
    fn of(material: &Material) -> Self {
        match material {
            Material::Basic(surface) => PipelineKind::Basic(surface.side),
            Material::Phong(surface) => PipelineKind::Phong(surface.side),
            Material::Water(_) => PipelineKind::Water,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", geometry.name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", geometry.name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices.len() as u32,
        }
    }
}

struct DrawItem {
    node_index: u32,
    mesh: usize,
    pipeline: PipelineKind,
    material: Arc<Material>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Draws a [`SceneContext`] into the window surface.
pub struct GpuRenderer {
    ctx: Context,
    pipelines: HashMap<PipelineKind, wgpu::RenderPipeline>,
    shadow_pipeline: wgpu::RenderPipeline,
    meshes: Vec<GpuMesh>,
    items: Vec<DrawItem>,
    instance_buffer: wgpu::Buffer,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    shadow_map: Texture,
}

impl GpuRenderer {
    /// Uploads all geometry, textures and materials of `scene`.
    pub fn new(ctx: Context, scene: &Scene) -> anyhow::Result<Self> {
        let device = &ctx.device;
        let globals_layout = mk_globals_layout(device);
        let material_layout = mk_material_layout(device);
        let shadow_layout = mk_shadow_layout(device);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[LightUniform::from_scene(scene)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shadow_size = scene
            .point_light()
            .map(|(light, _)| light.shadow_map_size)
            .unwrap_or(1)
            .min(device.limits().max_texture_dimension_2d);
        let shadow_map = Texture::create_shadow_map(device, [shadow_size, shadow_size]);
        let shadow_sampler = shadow_map
            .sampler
            .as_ref()
            .context("The shadow map has no comparison sampler")?;

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
            label: Some("globals_bind_group"),
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        let nodes = scene.root().descendants();
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (nodes.len() * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut uploader = Uploader {
            device,
            queue: &ctx.queue,
            material_layout: &material_layout,
            meshes: Vec::new(),
            mesh_index: HashMap::new(),
            textures: Vec::new(),
            texture_index: HashMap::new(),
            white: Arc::new(TextureData::solid("white", [255; 4])),
        };
        let mut items = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if let NodeKind::Mesh { geometry, material } = &node.kind {
                if geometry.indices.is_empty() {
                    log::warn!("Skipping empty geometry of {:?}", node.name);
                    continue;
                }
                items.push(uploader.draw_item(index as u32, node, geometry, material, scene));
            }
        }
        let Uploader {
            meshes, textures, ..
        } = uploader;
        log::info!(
            "Uploaded {} draw items, {} meshes and {} textures",
            items.len(),
            meshes.len(),
            textures.len()
        );

        let mut pipelines = HashMap::new();
        for item in &items {
            pipelines.entry(item.pipeline).or_insert_with(|| match item.pipeline {
                PipelineKind::Basic(side) => {
                    mk_basic_pipeline(device, &ctx.config, &globals_layout, &material_layout, side)
                }
                PipelineKind::Phong(side) => {
                    mk_phong_pipeline(device, &ctx.config, &globals_layout, &material_layout, side)
                }
                PipelineKind::Water => {
                    mk_water_pipeline(device, &ctx.config, &globals_layout, &material_layout)
                }
            });
        }
        let shadow_pipeline = mk_shadow_pipeline(device, &shadow_layout);

        Ok(Self {
            ctx,
            pipelines,
            shadow_pipeline,
            meshes,
            items,
            instance_buffer,
            camera_uniform,
            camera_buffer,
            light_buffer,
            globals_bind_group,
            shadow_bind_group,
            shadow_map,
        })
    }

    pub fn window(&self) -> &Arc<winit::window::Window> {
        &self.ctx.window
    }

    fn write_frame_uniforms(&mut self, scene_ctx: &SceneContext) {
        let scene = &scene_ctx.scene;
        let instances: Vec<InstanceRaw> = scene
            .world_transforms()
            .into_iter()
            .map(InstanceRaw::from_world)
            .collect();
        self.ctx
            .queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));

        self.camera_uniform
            .update_view_proj(&scene_ctx.camera, &scene_ctx.projection);
        self.ctx.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );
        self.ctx.queue.write_buffer(
            &self.light_buffer,
            0,
            bytemuck::cast_slice(&[LightUniform::from_scene(scene)]),
        );

        for item in &self.items {
            if let Material::Water(water) = item.material.as_ref() {
                self.ctx.queue.write_buffer(
                    &item.uniform_buffer,
                    0,
                    bytemuck::cast_slice(&[WaterUniform::new(water, &scene.water)]),
                );
            }
        }
    }
}

impl SceneRenderer for GpuRenderer {
    fn resize(&mut self, viewport: &ViewportState) {
        self.ctx.resize(viewport.width, viewport.height);
    }

    fn render(&mut self, scene_ctx: &SceneContext) -> anyhow::Result<()> {
        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = (self.ctx.config.width, self.ctx.config.height);
                self.ctx.resize(width, height);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e).context("Unable to acquire the next frame"),
        };
        self.write_frame_uniforms(scene_ctx);

        let visible = visibility(scene_ctx.scene.root());
        let nodes = scene_ctx.scene.root().descendants();
        let casts_shadow = LightUniform::from_scene(&scene_ctx.scene).casts_shadow();

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if casts_shadow {
                shadow_pass.set_pipeline(&self.shadow_pipeline);
                shadow_pass.set_bind_group(0, &self.shadow_bind_group, &[]);
                shadow_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                for item in &self.items {
                    let index = item.node_index as usize;
                    if !visible[index] || !nodes[index].cast_shadow {
                        continue;
                    }
                    let mesh = &self.meshes[item.mesh];
                    shadow_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    shadow_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    shadow_pass.draw_indexed(0..mesh.num_indices, 0, item.node_index..item.node_index + 1);
                }
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            let mut current = None;
            for item in &self.items {
                if !visible[item.node_index as usize] {
                    continue;
                }
                if current != Some(item.pipeline) {
                    let Some(pipeline) = self.pipelines.get(&item.pipeline) else {
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    current = Some(item.pipeline);
                }
                let mesh = &self.meshes[item.mesh];
                render_pass.set_bind_group(1, &item.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_indices, 0, item.node_index..item.node_index + 1);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        self.ctx.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

/// Effective visibility of every node in pre-order: a hidden node hides its
/// whole subtree.
fn visibility(root: &SceneNode) -> Vec<bool> {
    fn collect(node: &SceneNode, parent_visible: bool, out: &mut Vec<bool>) {
        let visible = parent_visible && node.visible;
        out.push(visible);
        for child in node.children() {
            collect(child, visible, out);
        }
    }
    let mut out = Vec::with_capacity(root.len());
    collect(root, true, &mut out);
    out
}

/// Deduplicates GPU uploads of geometry and textures shared between nodes.
struct Uploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    material_layout: &'a wgpu::BindGroupLayout,
    meshes: Vec<GpuMesh>,
    mesh_index: HashMap<*const Geometry, usize>,
    textures: Vec<Texture>,
    texture_index: HashMap<(*const TextureData, Wrap), usize>,
    // Bound in place of a missing colour map
    white: Arc<TextureData>,
}

impl Uploader<'_> {
    fn mesh(&mut self, geometry: &Arc<Geometry>) -> usize {
        let key = Arc::as_ptr(geometry);
        if let Some(&index) = self.mesh_index.get(&key) {
            return index;
        }
        self.meshes.push(GpuMesh::new(self.device, geometry));
        let index = self.meshes.len() - 1;
        self.mesh_index.insert(key, index);
        index
    }

    fn texture(&mut self, data: &Arc<TextureData>, wrap: Wrap) -> usize {
        let key = (Arc::as_ptr(data), wrap);
        if let Some(&index) = self.texture_index.get(&key) {
            return index;
        }
        self.textures
            .push(Texture::from_data(self.device, self.queue, data, wrap));
        let index = self.textures.len() - 1;
        self.texture_index.insert(key, index);
        index
    }

    fn bind_group(&self, label: &str, uniform: &wgpu::Buffer, texture: usize) -> wgpu::BindGroup {
        let texture = &self.textures[texture];
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
        ];
        if let Some(sampler) = &texture.sampler {
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: self.material_layout,
            entries: &entries,
            label: Some(label),
        })
    }

    fn surface_uniform(&mut self, surface: &SurfaceMaterial, receive_shadow: bool) -> (MaterialUniform, usize) {
        let [r, g, b] = surface.color.to_linear();
        let (texture, repeat) = match &surface.map {
            Some(map) => (self.texture(&map.texture, map.wrap), map.repeat),
            None => (self.white(), [1.0, 1.0]),
        };
        let uniform = MaterialUniform {
            color: [r, g, b, 1.0],
            repeat,
            receive_shadow: if receive_shadow { 1.0 } else { 0.0 },
            _padding: 0.0,
        };
        (uniform, texture)
    }

    fn white(&mut self) -> usize {
        let white = Arc::clone(&self.white);
        self.texture(&white, Wrap::ClampToEdge)
    }

    fn draw_item(
        &mut self,
        node_index: u32,
        node: &SceneNode,
        geometry: &Arc<Geometry>,
        material: &Arc<Material>,
        scene: &Scene,
    ) -> DrawItem {
        let mesh = self.mesh(geometry);
        let label = format!("{} material", node.name);
        let (contents, texture): (Vec<u8>, usize) = match material.as_ref() {
            Material::Basic(surface) | Material::Phong(surface) => {
                let (uniform, texture) = self.surface_uniform(surface, node.receive_shadow);
                (bytemuck::bytes_of(&uniform).to_vec(), texture)
            }
            Material::Water(water) => {
                let uniform = WaterUniform::new(water, &scene.water);
                let texture = self.texture(&water.normal_map.texture, water.normal_map.wrap);
                (bytemuck::bytes_of(&uniform).to_vec(), texture)
            }
        };
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.bind_group(&label, &uniform_buffer, texture);

        DrawItem {
            node_index,
            mesh,
            pipeline: PipelineKind::of(material),
            material: Arc::clone(material),
            uniform_buffer,
            bind_group,
        }
    }
}
