use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, bail};
use futures::future::try_join_all;

use crate::{
    data_structures::{
        geometry::{Geometry, ModelVertex},
        instance::{Instance, quaternion_to_euler},
        material::{Color, Material, Side, SurfaceMaterial, TextureBinding, Wrap},
        texture::TextureData,
    },
    resources::{
        AssetSource, relative_to,
        texture::{extension, mime_extension},
    },
};

/// A glTF scene decoded into plain CPU data. The node hierarchy and the local
/// transforms are kept as authored.
#[derive(Clone, Debug)]
pub struct MeshData {
    pub root: MeshNodeData,
}

#[derive(Clone, Debug)]
pub struct MeshNodeData {
    pub name: String,
    pub transform: Instance,
    pub primitives: Vec<MeshPrimitive>,
    pub children: Vec<MeshNodeData>,
}

#[derive(Clone, Debug)]
pub struct MeshPrimitive {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
}

impl MeshNodeData {
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(MeshNodeData::len).sum::<usize>()
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
            + self
                .children
                .iter()
                .map(MeshNodeData::primitive_count)
                .sum::<usize>()
    }
}

fn wrap_mode(mode: gltf::texture::WrappingMode) -> Wrap {
    match mode {
        gltf::texture::WrappingMode::ClampToEdge => Wrap::ClampToEdge,
        gltf::texture::WrappingMode::MirroredRepeat => Wrap::MirroredRepeat,
        gltf::texture::WrappingMode::Repeat => Wrap::Repeat,
    }
}

pub async fn load_gltf<S: AssetSource>(path: &str, source: &S) -> anyhow::Result<MeshData> {
    let bytes = source.fetch(path).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)?;

    let buffers = load_buffers(&gltf, path, source).await?;
    let images = load_images(&gltf, &buffers, path, source).await?;

    let fallback = Arc::new(Material::Phong(SurfaceMaterial::new("default", Color::WHITE)));
    let materials: Vec<Arc<Material>> = gltf
        .materials()
        .map(|material| Arc::new(convert_material(&material, &images)))
        .collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| anyhow!("{} contains no scene", path))?;
    let mut roots = scene
        .nodes()
        .map(|node| convert_node(&node, &buffers, &materials, &fallback))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        MeshNodeData {
            name: scene.name().unwrap_or(path).to_string(),
            transform: Instance::new(),
            primitives: Vec::new(),
            children: roots,
        }
    };
    Ok(MeshData { root })
}

async fn load_buffers<S: AssetSource>(
    gltf: &gltf::Gltf,
    path: &str,
    source: &S,
) -> anyhow::Result<Vec<Vec<u8>>> {
    try_join_all(gltf.buffers().map(|buffer| async move {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| anyhow!("buffer {} refers to a missing binary chunk", buffer.index()))?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("buffer {} uses an embedded data URI", buffer.index())
            }
            gltf::buffer::Source::Uri(uri) => source.fetch(&relative_to(path, uri)).await?,
        };
        if data.len() < buffer.length() {
            bail!(
                "buffer {} holds {} bytes, {} expected",
                buffer.index(),
                data.len(),
                buffer.length()
            );
        }
        Ok::<_, anyhow::Error>(data)
    }))
    .await
}

/// Decodes the base colour images referenced by any material, keyed by image index.
async fn load_images<S: AssetSource>(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    path: &str,
    source: &S,
) -> anyhow::Result<HashMap<usize, Arc<TextureData>>> {
    let mut wanted: Vec<gltf::Image> = gltf
        .materials()
        .filter_map(|material| material.pbr_metallic_roughness().base_color_texture())
        .map(|info| info.texture().source())
        .collect();
    wanted.sort_by_key(|image| image.index());
    wanted.dedup_by_key(|image| image.index());

    let decoded = try_join_all(wanted.into_iter().map(|image| async move {
        let data = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &buffers[view.buffer().index()];
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| anyhow!("image {} lies outside of its buffer", image.index()))?;
                let label = format!("{}#image{}", path, image.index());
                TextureData::from_bytes(bytes, &label, mime_extension(mime_type))?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let file = relative_to(path, uri);
                let bytes = source.fetch(&file).await?;
                let hint = mime_type.and_then(mime_extension).or(extension(&file));
                TextureData::from_bytes(&bytes, &file, hint)?
            }
        };
        Ok::<_, anyhow::Error>((image.index(), Arc::new(data)))
    }))
    .await?;

    Ok(decoded.into_iter().collect())
}

fn convert_material(
    material: &gltf::Material,
    images: &HashMap<usize, Arc<TextureData>>,
) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let mut surface = SurfaceMaterial::new(
        material.name().unwrap_or("gltf material"),
        Color::from_linear([r, g, b]),
    );
    if let Some(info) = pbr.base_color_texture() {
        let texture = info.texture();
        if let Some(data) = images.get(&texture.source().index()) {
            let binding =
                TextureBinding::new(data.clone()).wrapped(wrap_mode(texture.sampler().wrap_s()));
            surface = surface.with_map(binding);
        }
    }
    if material.double_sided() {
        surface = surface.with_side(Side::Double);
    }
    Material::Phong(surface)
}

fn convert_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    materials: &[Arc<Material>],
    fallback: &Arc<Material>,
) -> anyhow::Result<MeshNodeData> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));

    let (translation, rotation, scale) = node.transform().decomposed();
    let [x, y, z, w] = rotation;
    let transform = Instance::new()
        .with_position(translation)
        .with_rotation(quaternion_to_euler(cgmath::Quaternion::new(w, x, y, z)))
        .with_scale(scale);

    let mut primitives = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of {}: only triangle lists are drawn",
                    primitive.index(),
                    name
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let positions = reader
                .read_positions()
                .ok_or_else(|| anyhow!("primitive {} of {} has no positions", primitive.index(), name))?;
            let mut vertices: Vec<ModelVertex> = positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect();

            let has_normals = match reader.read_normals() {
                Some(normals) => {
                    for (vertex, normal) in vertices.iter_mut().zip(normals) {
                        vertex.normal = normal;
                    }
                    true
                }
                None => false,
            };
            // glTF and wgpu share the top-left texture origin, no flip needed
            if let Some(tex_coords) = reader.read_tex_coords(0) {
                for (vertex, uv) in vertices.iter_mut().zip(tex_coords.into_f32()) {
                    vertex.tex_coords = uv;
                }
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            if let Some(index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                bail!(
                    "primitive {} of {} indexes vertex {} of {}",
                    primitive.index(),
                    name,
                    index,
                    vertices.len()
                );
            }

            let mut geometry =
                Geometry::new(&format!("{}#{}", name, primitive.index()), vertices, indices);
            if !has_normals {
                geometry.compute_vertex_normals();
            }
            let material = primitive
                .material()
                .index()
                .and_then(|index| materials.get(index))
                .unwrap_or(fallback)
                .clone();
            primitives.push(MeshPrimitive {
                geometry: Arc::new(geometry),
                material,
            });
        }
    }

    let children = node
        .children()
        .map(|child| convert_node(&child, buffers, materials, fallback))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(MeshNodeData {
        name,
        transform,
        primitives,
        children,
    })
}
