//! nightsail
//!
//! A looping, interactive diorama: a sailboat rocking on an animated sea under
//! a moonlit sky, rendered with wgpu into a native window or a web canvas.
//!
//! High-level modules
//! - `config`: presets and the serde-backed configuration bundle
//! - `resources`: concurrent loading of meshes, textures and fonts
//! - `assembly`: builds the scene graph from loaded resources
//! - `camera`: camera, projection and the orbit controller
//! - `flow`: startup orchestration, the animation loop and the window shell
//! - `debug`: the live tuning table, behind the `debug-panel` feature
//! - `context`, `pipelines`, `render`: GPU setup and drawing
//! - `data_structures`: scene data (transforms, geometry, materials, text)
//!

pub mod assembly;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
#[cfg(feature = "debug-panel")]
pub mod debug;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::{ConfigError, DioramaConfig, Preset};
pub use flow::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point of the web build. The preset can be picked with a `preset`
/// query parameter (`?preset=harbor`).
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    let preset = web_sys::window()
        .and_then(|window| window.location().search().ok())
        .and_then(|search| {
            search
                .trim_start_matches('?')
                .split('&')
                .find_map(|pair| pair.strip_prefix("preset=").map(str::to_string))
        })
        .and_then(|name| name.parse::<Preset>().ok())
        .unwrap_or_default();
    run(DioramaConfig::preset(preset)).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
