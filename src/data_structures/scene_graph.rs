//! Scene graph and hierarchical scene organization.
//!
//! A [`Scene`] owns a single root [`SceneNode`]; every other node is owned by
//! exactly one parent, so the graph is a tree and cycles cannot be expressed.
//! Geometry and materials are shared read-only through `Arc`, transforms are
//! owned by their node.
//!
//! The shape of the tree is fixed once assembly finishes. The renderer relies
//! on that: it maps GPU resources to nodes by their depth-first (pre-order)
//! index, see [`Scene::world_transforms`].

use std::sync::Arc;

use cgmath::SquareMatrix;

use crate::data_structures::{
    animation::AnimationRule,
    geometry::Geometry,
    instance::Instance,
    material::{Color, Material},
};

#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    /// Range after which the light contributes nothing. `0.0` means unbounded.
    pub distance: f32,
    pub decay: f32,
    /// Edge length of the square shadow depth texture.
    pub shadow_map_size: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Groups children under a common transform.
    Container,
    Mesh {
        geometry: Arc<Geometry>,
        material: Arc<Material>,
    },
    PointLight(PointLight),
    HemisphereLight(HemisphereLight),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub local: Instance,
    pub visible: bool,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub kind: NodeKind,
    pub animation: Option<AnimationRule>,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            local: Instance::default(),
            visible: true,
            cast_shadow: false,
            receive_shadow: false,
            kind,
            animation: None,
            children: Vec::new(),
        }
    }

    pub fn container(name: &str) -> Self {
        Self::new(name, NodeKind::Container)
    }

    pub fn mesh(name: &str, geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        Self::new(name, NodeKind::Mesh { geometry, material })
    }

    pub fn with_transform(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn with_animation(mut self, rule: AnimationRule) -> Self {
        self.animation = Some(rule);
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneNode] {
        &mut self.children
    }

    /// Visits `self` and all descendants depth-first, parents before children.
    pub fn traverse(&self, visit: &mut dyn FnMut(&SceneNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn traverse_mut(&mut self, visit: &mut dyn FnMut(&mut SceneNode)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// All nodes of this subtree in the order [`SceneNode::traverse`] visits them.
    pub fn descendants(&self) -> Vec<&SceneNode> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a SceneNode>) {
        out.push(self);
        for child in &self.children {
            child.collect_descendants(out);
        }
    }

    /// Number of nodes in this subtree, `self` included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(SceneNode::len).sum::<usize>()
    }

    /// Direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    fn collect_world_transforms(
        &self,
        parent: &cgmath::Matrix4<f32>,
        out: &mut Vec<cgmath::Matrix4<f32>>,
    ) {
        let world = parent * self.local.to_matrix();
        out.push(world);
        for child in &self.children {
            child.collect_world_transforms(&world, out);
        }
    }
}

/// Live inputs of the water shader. `time` is advanced by the animation loop,
/// both values may also be tuned from the debug panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterParameters {
    pub time: f32,
    pub distortion_scale: f32,
    pub size: f32,
}

impl Default for WaterParameters {
    fn default() -> Self {
        Self {
            time: 0.0,
            distortion_scale: 3.0,
            size: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Scene {
    root: SceneNode,
    pub water: WaterParameters,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            root: SceneNode::container("scene"),
            water: WaterParameters::default(),
        }
    }

    pub fn add(&mut self, node: SceneNode) {
        self.root.add_child(node);
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    /// Top-level element by name (e.g. "boat").
    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.root.child(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.root.child_mut(name)
    }

    /// Names of the top-level elements in insertion order.
    pub fn element_names(&self) -> Vec<&str> {
        self.root
            .children()
            .iter()
            .map(|node| node.name.as_str())
            .collect()
    }

    /// Applies every node's animation rule for the clock reading `now_ms`.
    pub fn animate(&mut self, now_ms: f64) {
        self.root.traverse_mut(&mut |node| {
            if let Some(rule) = node.animation {
                rule.evaluate(now_ms).apply(&mut node.local);
            }
        });
    }

    /// World matrices of all nodes in pre-order, root first.
    pub fn world_transforms(&self) -> Vec<cgmath::Matrix4<f32>> {
        let mut out = Vec::with_capacity(self.root.len());
        self.root
            .collect_world_transforms(&cgmath::Matrix4::identity(), &mut out);
        out
    }

    pub fn point_light(&self) -> Option<(&PointLight, cgmath::Vector3<f32>)> {
        self.root
            .descendants()
            .into_iter()
            .zip(self.world_transforms())
            .find_map(|(node, world)| match &node.kind {
                NodeKind::PointLight(light) => Some((light, world.w.truncate())),
                _ => None,
            })
    }

    pub fn hemisphere_light(&self) -> Option<&HemisphereLight> {
        self.root
            .descendants()
            .into_iter()
            .find_map(|node| match &node.kind {
                NodeKind::HemisphereLight(light) => Some(light),
                _ => None,
            })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
