//! Scene data: transforms, geometry, materials, textures, animation rules,
//! text outlines and the scene graph that ties them together.
//!
//! - `instance` holds the per-node transform and its GPU layout
//! - `geometry` contains vertex layouts and the sphere/plane generators
//! - `material` describes colours, texture bindings and surface kinds
//! - `texture` wraps decoded images and their GPU counterparts
//! - `animation` holds the time-driven transform rules (bob, rock)
//! - `text` turns typeface glyph outlines into extruded geometry
//! - `scene_graph` enables hierarchical scene organization

pub mod animation;
pub mod geometry;
pub mod instance;
pub mod material;
pub mod scene_graph;
pub mod text;
pub mod texture;
