//! Builds the diorama scene graph from loaded assets.
//!
//! Assembly is synchronous and deterministic: the same [`AssetBundle`] and
//! [`DioramaConfig`] always produce the same tree, in the same order. It runs
//! once, after every asset has loaded; the tree's shape never changes after.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    config::DioramaConfig,
    data_structures::{
        geometry::Geometry,
        instance::Instance,
        material::{Color, Material, Side, SurfaceMaterial, TextureBinding, WaterMaterial, Wrap},
        scene_graph::{HemisphereLight, NodeKind, PointLight, Scene, SceneNode, WaterParameters},
        text::{OutlineError, TextOptions, Typeface, text_geometry},
        texture::TextureData,
    },
    resources::{Asset, AssetKind, MeshData, MeshNodeData, SceneResource},
};

/// The top-level nodes of the diorama.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Boat,
    Moon,
    MoonLight,
    MoonLightHemisphere,
    Sky,
    Sea,
    Credits,
}

impl Element {
    pub fn name(&self) -> &'static str {
        match self {
            Element::Boat => "boat",
            Element::Moon => "moon",
            Element::MoonLight => "moon-light",
            Element::MoonLightHemisphere => "moon-light-hemisphere",
            Element::Sky => "sky",
            Element::Sea => "sea",
            Element::Credits => "credits",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no resource was loaded for `{path}`")]
    Missing { path: String },
    #[error("`{path}` was loaded as {found}, expected {expected}")]
    WrongKind {
        path: String,
        expected: AssetKind,
        found: AssetKind,
    },
    #[error("credits are configured but no font is listed in the asset manifest")]
    MissingFont,
    #[error("credits text could not be built")]
    Text(#[from] OutlineError),
}

/// Loaded assets sorted by the role they play in the scene.
#[derive(Clone, Debug)]
pub struct AssetBundle {
    pub boat: MeshData,
    pub moon: Arc<TextureData>,
    pub sky: Arc<TextureData>,
    pub water_normals: Arc<TextureData>,
    pub font: Option<Arc<Typeface>>,
}

impl AssetBundle {
    /// Matches the loader's output against the manifest of `config`.
    pub fn from_resources(
        config: &DioramaConfig,
        resources: Vec<SceneResource>,
    ) -> Result<Self, AssemblyError> {
        let by_path: HashMap<String, Asset> = resources
            .into_iter()
            .map(|resource| (resource.path, resource.asset))
            .collect();
        let lookup = |path: &str| {
            by_path.get(path).ok_or_else(|| AssemblyError::Missing {
                path: path.to_string(),
            })
        };
        let wrong_kind = |path: &str, expected: AssetKind, found: &Asset| AssemblyError::WrongKind {
            path: path.to_string(),
            expected,
            found: found.kind(),
        };
        let texture = |path: &str| -> Result<Arc<TextureData>, AssemblyError> {
            match lookup(path)? {
                Asset::Texture(texture) => Ok(texture.clone()),
                other => Err(wrong_kind(path, AssetKind::Texture, other)),
            }
        };

        let manifest = &config.assets;
        let boat = match lookup(&manifest.boat)? {
            Asset::Mesh(mesh) => mesh.clone(),
            other => return Err(wrong_kind(&manifest.boat, AssetKind::Mesh, other)),
        };
        let font = match &manifest.font {
            Some(path) => match lookup(path)? {
                Asset::Font(font) => Some(font.clone()),
                other => return Err(wrong_kind(path, AssetKind::Font, other)),
            },
            None => None,
        };

        Ok(Self {
            boat,
            moon: texture(&manifest.moon)?,
            sky: texture(&manifest.sky)?,
            water_normals: texture(&manifest.water_normals)?,
            font,
        })
    }
}

/// Converts a glTF node tree. A node with a single primitive becomes a mesh
/// node, several primitives become mesh children of a container.
fn mesh_tree(data: &MeshNodeData) -> SceneNode {
    let mut node = match data.primitives.as_slice() {
        [single] => SceneNode::mesh(&data.name, single.geometry.clone(), single.material.clone()),
        primitives => {
            let mut group = SceneNode::container(&data.name);
            for (idx, primitive) in primitives.iter().enumerate() {
                group.add_child(SceneNode::mesh(
                    &format!("{}#{}", data.name, idx),
                    primitive.geometry.clone(),
                    primitive.material.clone(),
                ));
            }
            group
        }
    };
    node.local = data.transform;
    for child in &data.children {
        node.add_child(mesh_tree(child));
    }
    node
}

fn boat(bundle: &AssetBundle, config: &DioramaConfig) -> SceneNode {
    let mut boat = SceneNode::container(Element::Boat.name())
        .with_transform(config.boat.transform.to_instance())
        .with_animation(config.boat.rock);
    boat.add_child(mesh_tree(&bundle.boat.root));
    let cast_shadow = config.meshes_cast_shadows;
    boat.traverse_mut(&mut |node| {
        node.receive_shadow = true;
        node.cast_shadow = cast_shadow && matches!(node.kind, NodeKind::Mesh { .. });
    });
    boat
}

fn moon(bundle: &AssetBundle, config: &DioramaConfig) -> SceneNode {
    let moon = &config.moon;
    let geometry = Geometry::sphere(
        Element::Moon.name(),
        moon.radius,
        moon.width_segments,
        moon.height_segments,
    );
    let material = SurfaceMaterial::new("moon", Color::WHITE)
        .with_map(TextureBinding::new(bundle.moon.clone()));
    SceneNode::mesh(
        Element::Moon.name(),
        Arc::new(geometry),
        Arc::new(Material::Basic(material)),
    )
    .with_transform(Instance::new().with_position(moon.position))
}

fn moon_light(config: &DioramaConfig) -> SceneNode {
    let light = &config.moon_light;
    let mut node = SceneNode::new(
        Element::MoonLight.name(),
        NodeKind::PointLight(PointLight {
            color: light.color,
            intensity: light.intensity,
            distance: light.distance,
            decay: light.decay,
            shadow_map_size: light.shadow_map_size,
        }),
    )
    .with_transform(Instance::new().with_position(light.position));
    node.cast_shadow = light.cast_shadow;
    node
}

fn hemisphere(config: &DioramaConfig) -> SceneNode {
    let light = &config.hemisphere;
    SceneNode::new(
        Element::MoonLightHemisphere.name(),
        NodeKind::HemisphereLight(HemisphereLight {
            sky_color: light.sky_color,
            ground_color: light.ground_color,
            intensity: light.intensity,
        }),
    )
    .with_transform(Instance::new().with_position(light.position))
}

fn sky(bundle: &AssetBundle, config: &DioramaConfig) -> SceneNode {
    let sky = &config.sky;
    let geometry = Geometry::sphere(
        Element::Sky.name(),
        sky.radius,
        sky.width_segments,
        sky.height_segments,
    );
    let map = TextureBinding::new(bundle.sky.clone())
        .wrapped(sky.wrap)
        .repeated(sky.repeat);
    let material = SurfaceMaterial::new("sky", Color::WHITE)
        .with_map(map)
        .with_side(Side::Back);
    SceneNode::mesh(
        Element::Sky.name(),
        Arc::new(geometry),
        Arc::new(Material::Basic(material)),
    )
    .with_transform(Instance::new().with_rotation(sky.rotation))
}

fn sea(bundle: &AssetBundle, config: &DioramaConfig) -> SceneNode {
    let sea = &config.sea;
    let geometry = Geometry::plane(
        Element::Sea.name(),
        sea.width,
        sea.height,
        sea.width_segments,
        sea.height_segments,
    );
    // Normal maps hold vectors, not colours
    let normals = Arc::new(TextureData::clone(&bundle.water_normals).linear());
    let material = WaterMaterial {
        normal_map: TextureBinding::new(normals).wrapped(Wrap::Repeat),
        sun_direction: sea.sun_direction.into(),
        sun_color: sea.sun_color,
        water_color: sea.water_color,
    };
    let mut node = SceneNode::mesh(
        Element::Sea.name(),
        Arc::new(geometry),
        Arc::new(Material::Water(material)),
    )
    .with_transform(Instance::new().with_rotation(sea.rotation));
    node.receive_shadow = true;
    node
}

fn credits(bundle: &AssetBundle, config: &DioramaConfig) -> Result<Option<SceneNode>, AssemblyError> {
    let Some(credits) = &config.credits else {
        return Ok(None);
    };
    let font = bundle.font.as_ref().ok_or(AssemblyError::MissingFont)?;
    let options = TextOptions {
        size: credits.size,
        depth: credits.depth,
        curve_segments: credits.curve_segments,
    };
    let geometry = text_geometry(&credits.text, font, &options)?;
    let material = SurfaceMaterial::new("credits", credits.color);
    let mut node = SceneNode::mesh(
        Element::Credits.name(),
        Arc::new(geometry),
        Arc::new(Material::Phong(material)),
    )
    .with_transform(credits.transform.to_instance())
    .with_animation(credits.bob);
    node.cast_shadow = config.meshes_cast_shadows;
    Ok(Some(node))
}

/// Builds the scene: boat, moon, moon light, hemisphere light, sky, sea and,
/// when configured, the credits text.
pub fn assemble(bundle: &AssetBundle, config: &DioramaConfig) -> Result<Scene, AssemblyError> {
    let mut scene = Scene::new();
    scene.water = WaterParameters {
        time: 0.0,
        distortion_scale: config.sea.distortion_scale,
        size: config.sea.size,
    };

    scene.add(boat(bundle, config));
    scene.add(moon(bundle, config));
    scene.add(moon_light(config));
    scene.add(hemisphere(config));
    scene.add(sky(bundle, config));
    scene.add(sea(bundle, config));
    if let Some(credits) = credits(bundle, config)? {
        scene.add(credits);
    }

    log::info!(
        "Assembled scene with {} nodes: {}",
        scene.root().len(),
        scene.element_names().join(", ")
    );
    Ok(scene)
}
