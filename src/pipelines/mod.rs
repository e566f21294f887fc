//! Render pipelines of the diorama and the uniform blocks they read.
//!
//! Every scene shader shares the vertex stage and group 0 (camera, lights,
//! shadow map) from `common.wgsl`; group 1 holds the per-draw material.

pub mod basic;
pub mod light;
pub mod phong;
pub mod shadow;
pub mod water;
