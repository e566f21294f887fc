#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    io::Cursor,
    rc::Rc,
};

use anyhow::anyhow;
use nightsail::{
    config::{AssetManifest, DioramaConfig, Preset},
    context::ViewportState,
    flow::{AnimationLoop, Clock, FrameScheduler, SceneContext, SceneRenderer, prepare_scene},
    resources::AssetSource,
};
use serde_json::json;

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn at(now_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Scheduled,
    Rendered {
        water_time: f32,
        camera: [f32; 3],
        boat_rotation: [f32; 3],
        credits_y: Option<f32>,
    },
    Resized(ViewportState),
}

pub type Journal = Rc<RefCell<Vec<Entry>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct CountingScheduler {
    journal: Journal,
}

impl CountingScheduler {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl FrameScheduler for CountingScheduler {
    fn schedule_next(&mut self) {
        self.journal.borrow_mut().push(Entry::Scheduled);
    }
}

/// Writes what it would draw into the journal instead of touching a GPU.
pub struct RecordingRenderer {
    journal: Journal,
    fail_at: Option<u64>,
    rendered: u64,
}

impl RecordingRenderer {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_at: None,
            rendered: 0,
        }
    }

    /// Fails the `frame`-th render call (zero based).
    pub fn failing_at(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }
}

impl SceneRenderer for RecordingRenderer {
    fn resize(&mut self, viewport: &ViewportState) {
        self.journal.borrow_mut().push(Entry::Resized(*viewport));
    }

    fn render(&mut self, ctx: &SceneContext) -> anyhow::Result<()> {
        let frame = self.rendered;
        self.rendered += 1;
        if self.fail_at == Some(frame) {
            return Err(anyhow!("device lost"));
        }
        let boat = ctx.scene.node("boat").map(|node| node.local.rotation);
        self.journal.borrow_mut().push(Entry::Rendered {
            water_time: ctx.scene.water.time,
            camera: ctx.camera.position.into(),
            boat_rotation: boat.map(Into::into).unwrap_or([0.0; 3]),
            credits_y: ctx.scene.node("credits").map(|node| node.local.position.y),
        });
        Ok(())
    }
}

pub type TestLoop = AnimationLoop<ManualClock, CountingScheduler, RecordingRenderer>;

pub fn test_loop(ctx: SceneContext, clock: &ManualClock, journal: &Journal) -> TestLoop {
    AnimationLoop::new(
        ctx,
        clock.clone(),
        CountingScheduler::new(journal),
        RecordingRenderer::new(journal),
        1.0 / 50.0,
    )
}

/// Files kept in memory, keyed by path. Records every fetch.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    fetched: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) -> &mut Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    pub fn remove(&mut self, path: &str) -> &mut Self {
        self.files.remove(path);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.fetched.borrow_mut().push(path.to_string());
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{} not found", path))
    }
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encoding a png in memory");
    bytes.into_inner()
}

/// A glTF with a three level node chain `hull > mast > sail`; only the sail
/// carries a mesh (one triangle, textured with `hull.png`, no normals).
/// Returns the JSON document and the binary buffer it refers to as `boat.bin`.
pub fn boat_gltf() -> (Vec<u8>, Vec<u8>) {
    let mut bin = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for index in [0u32, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }

    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": "boat", "nodes": [0] }],
        "nodes": [
            { "name": "hull", "children": [1], "translation": [0.0, 1.0, 0.0] },
            { "name": "mast", "children": [2] },
            { "name": "sail", "mesh": 0 }
        ],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "materials": [{
            "name": "canvas",
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
                "baseColorTexture": { "index": 0 }
            },
            "doubleSided": true
        }],
        "textures": [{ "sampler": 0, "source": 0 }],
        "images": [{ "uri": "hull.png" }],
        "samplers": [{ "wrapS": 10497, "wrapT": 10497 }],
        "buffers": [{ "uri": "boat.bin", "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 12, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": 3,
                "type": "VEC3",
                "min": [0.0, 0.0, 0.0],
                "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5125, "count": 3, "type": "SCALAR" }
        ]
    });
    (
        serde_json::to_vec(&document).expect("serializing the gltf document"),
        bin,
    )
}

/// A typeface with a square `O` (outer square plus a square hole), a
/// triangle `?` fallback and a blank space.
pub fn typeface_json() -> Vec<u8> {
    let document = json!({
        "familyName": "Test Sans",
        "resolution": 1000,
        "underlineThickness": 50,
        "boundingBox": { "xMin": 0, "xMax": 1000, "yMin": -200, "yMax": 1000 },
        "glyphs": {
            "O": {
                "ha": 1000, "x_min": 0, "x_max": 1000,
                "o": "m 0 0 l 1000 0 l 1000 1000 l 0 1000 z m 250 250 l 250 750 l 750 750 l 750 250 z"
            },
            "?": {
                "ha": 600, "x_min": 0, "x_max": 600,
                "o": "m 0 0 l 600 0 l 300 800 z"
            },
            " ": { "ha": 300, "x_min": 0, "x_max": 0 }
        }
    });
    serde_json::to_vec(&document).expect("serializing the typeface")
}

/// The preset with every asset path pointing at PNG fixtures.
pub fn test_config(preset: Preset) -> DioramaConfig {
    let config = DioramaConfig::preset(preset);
    DioramaConfig {
        assets: AssetManifest {
            boat: "models/boat.gltf".to_string(),
            moon: "images/moon.png".to_string(),
            sky: "images/sky.png".to_string(),
            water_normals: "images/water.png".to_string(),
            font: config
                .assets
                .font
                .as_ref()
                .map(|_| "fonts/test.json".to_string()),
        },
        ..config
    }
}

/// Every file `config` asks for.
pub fn source_for(config: &DioramaConfig) -> MemorySource {
    let (gltf, bin) = boat_gltf();
    let mut source = MemorySource::new();
    source
        .insert(&config.assets.boat, gltf)
        .insert("models/boat.bin", bin)
        .insert("models/hull.png", png_bytes(2, 2, [120, 80, 40, 255]))
        .insert(&config.assets.moon, png_bytes(4, 4, [230, 230, 210, 255]))
        .insert(&config.assets.sky, png_bytes(4, 4, [10, 20, 40, 255]))
        .insert(&config.assets.water_normals, png_bytes(4, 4, [128, 128, 255, 255]));
    if let Some(font) = &config.assets.font {
        source.insert(font, typeface_json());
    }
    source
}

pub fn viewport() -> ViewportState {
    ViewportState::new(800, 600, 1.0)
}

pub fn scene_context(preset: Preset) -> SceneContext {
    let config = test_config(preset);
    let source = source_for(&config);
    futures::executor::block_on(prepare_scene(&config, &source, viewport()))
        .expect("the test assets form a scene")
}

pub fn rendered(journal: &Journal) -> Vec<Entry> {
    journal
        .borrow()
        .iter()
        .filter(|entry| matches!(entry, Entry::Rendered { .. }))
        .cloned()
        .collect()
}
