//! Live tuning table for development builds.
//!
//! A [`DebugPanel`] is a flat list of [`DebugBinding`]s, each one a numeric
//! range tied to a field of the [`SceneContext`] through a getter and a
//! setter. Whatever draws the panel implements [`PanelHost`]; edits it
//! collects are written back between frames, so the last write before a
//! frame's render wins.
//!
//! The table is always compiled. The application only attaches it when built
//! with the `debug-panel` feature.

use std::{f32::consts::PI, fmt, ops::RangeInclusive};

use crate::{
    assembly::Element,
    data_structures::instance::Instance,
    flow::SceneContext,
};

type Getter = Box<dyn Fn(&SceneContext) -> f32>;
type Setter = Box<dyn Fn(&mut SceneContext, f32)>;

pub struct DebugBinding {
    pub folder: String,
    pub label: String,
    pub range: RangeInclusive<f32>,
    /// Whether the widget should keep refreshing the value (it also changes
    /// without user input).
    pub listen: bool,
    get: Getter,
    set: Setter,
}

impl DebugBinding {
    pub fn new(
        folder: &str,
        label: &str,
        range: RangeInclusive<f32>,
        get: impl Fn(&SceneContext) -> f32 + 'static,
        set: impl Fn(&mut SceneContext, f32) + 'static,
    ) -> Self {
        Self {
            folder: folder.to_string(),
            label: label.to_string(),
            range,
            listen: true,
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    pub fn with_listen(mut self, listen: bool) -> Self {
        self.listen = listen;
        self
    }

    pub fn get(&self, ctx: &SceneContext) -> f32 {
        (self.get)(ctx)
    }

    /// Clamps `value` into the range, writes it and returns what was written.
    pub fn set(&self, ctx: &mut SceneContext, value: f32) -> f32 {
        let value = value.max(*self.range.start()).min(*self.range.end());
        (self.set)(ctx, value);
        value
    }
}

impl fmt::Debug for DebugBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugBinding")
            .field("folder", &self.folder)
            .field("label", &self.label)
            .field("range", &self.range)
            .field("listen", &self.listen)
            .finish()
    }
}

/// One row of a [`DebugPanel::snapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct DebugValue {
    pub folder: String,
    pub label: String,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DebugPanelError {
    #[error("no debug binding with index {0}")]
    UnknownBinding(usize),
    #[error("{value} is not a finite number")]
    NotFinite { value: f32 },
}

#[derive(Debug, Default)]
pub struct DebugPanel {
    bindings: Vec<DebugBinding>,
}

#[derive(Clone, Copy)]
enum Field {
    Position,
    Rotation,
}

impl Field {
    fn name(&self) -> &'static str {
        match self {
            Field::Position => "position",
            Field::Rotation => "rotation",
        }
    }

    fn of(self, instance: &mut Instance) -> &mut cgmath::Vector3<f32> {
        match self {
            Field::Position => &mut instance.position,
            Field::Rotation => &mut instance.rotation,
        }
    }
}

const AXES: [&str; 3] = ["x", "y", "z"];

impl DebugPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of the diorama: camera, sea, boat, moon, hemisphere light,
    /// sky, water and, if the scene has them, the credits.
    pub fn standard(ctx: &SceneContext) -> Self {
        let mut panel = Self::new();
        for (axis, name) in AXES.iter().enumerate() {
            panel.add(DebugBinding::new(
                "camera",
                &format!("position.{name}"),
                -50.0..=50.0,
                move |ctx| ctx.camera.position[axis],
                move |ctx, value| ctx.camera.position[axis] = value,
            ));
        }
        panel.add_node_rows(Element::Sea, Field::Rotation, -PI..=PI, true);
        panel.add_node_rows(Element::Boat, Field::Rotation, -3.0..=3.0, true);
        panel.add_node_rows(Element::Moon, Field::Position, -45.0..=45.0, true);
        panel.add_node_rows(Element::MoonLightHemisphere, Field::Position, -10.0..=10.0, true);
        panel.add_node_rows(Element::Sky, Field::Rotation, -5.0..=5.0, true);
        panel.add(
            DebugBinding::new(
                "water",
                "distortion scale",
                0.0..=8.0,
                |ctx| ctx.scene.water.distortion_scale,
                |ctx, value| ctx.scene.water.distortion_scale = value,
            )
            .with_listen(false),
        );
        if ctx.scene.node(Element::Credits.name()).is_some() {
            panel.add_node_rows(Element::Credits, Field::Position, -30.0..=30.0, false);
            panel.add_node_rows(Element::Credits, Field::Rotation, -10.0..=10.0, false);
        }
        panel
    }

    fn add_node_rows(&mut self, element: Element, field: Field, range: RangeInclusive<f32>, listen: bool) {
        for (axis, name) in AXES.iter().enumerate() {
            let binding = DebugBinding::new(
                element.name(),
                &format!("{}.{name}", field.name()),
                range.clone(),
                move |ctx| {
                    ctx.scene
                        .node(element.name())
                        .map(|node| {
                            let mut local = node.local;
                            field.of(&mut local)[axis]
                        })
                        .unwrap_or_default()
                },
                move |ctx, value| {
                    if let Some(node) = ctx.scene.node_mut(element.name()) {
                        field.of(&mut node.local)[axis] = value;
                    }
                },
            )
            .with_listen(listen);
            self.add(binding);
        }
    }

    pub fn add(&mut self, binding: DebugBinding) -> usize {
        self.bindings.push(binding);
        self.bindings.len() - 1
    }

    pub fn bindings(&self) -> &[DebugBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Index of the binding `label` in `folder`.
    pub fn find(&self, folder: &str, label: &str) -> Option<usize> {
        self.bindings
            .iter()
            .position(|binding| binding.folder == folder && binding.label == label)
    }

    pub fn snapshot(&self, ctx: &SceneContext) -> Vec<DebugValue> {
        self.bindings
            .iter()
            .map(|binding| DebugValue {
                folder: binding.folder.clone(),
                label: binding.label.clone(),
                value: binding.get(ctx),
            })
            .collect()
    }

    /// Writes a clamped `value` through binding `index`.
    pub fn write(&self, ctx: &mut SceneContext, index: usize, value: f32) -> Result<f32, DebugPanelError> {
        if !value.is_finite() {
            return Err(DebugPanelError::NotFinite { value });
        }
        let binding = self
            .bindings
            .get(index)
            .ok_or(DebugPanelError::UnknownBinding(index))?;
        Ok(binding.set(ctx, value))
    }

    /// Applies pending edits in order; later edits of the same binding win.
    pub fn apply(&self, ctx: &mut SceneContext, edits: impl IntoIterator<Item = (usize, f32)>) {
        for (index, value) in edits {
            if let Err(e) = self.write(ctx, index, value) {
                log::warn!("Ignoring debug edit: {}", e);
            }
        }
    }
}

/// Contract of the widget that displays a [`DebugPanel`].
pub trait PanelHost {
    /// Called when the user asks for the panel.
    fn show(&mut self, panel: &DebugPanel, ctx: &SceneContext);

    /// Edits made since the last call, oldest first.
    fn take_edits(&mut self) -> Vec<(usize, f32)>;
}

/// Prints the table to the log. Edits can be queued programmatically.
#[derive(Debug, Default)]
pub struct LogPanelHost {
    edits: Vec<(usize, f32)>,
}

impl LogPanelHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, index: usize, value: f32) {
        self.edits.push((index, value));
    }
}

impl PanelHost for LogPanelHost {
    fn show(&mut self, panel: &DebugPanel, ctx: &SceneContext) {
        let mut folder = "";
        for (row, binding) in panel.snapshot(ctx).iter().zip(panel.bindings()) {
            if row.folder != folder {
                log::info!("[{}]", row.folder);
                folder = &binding.folder;
            }
            log::info!(
                "  {:<16} {:>10.4}  ({}..={})",
                row.label,
                row.value,
                binding.range.start(),
                binding.range.end()
            );
        }
    }

    fn take_edits(&mut self) -> Vec<(usize, f32)> {
        std::mem::take(&mut self.edits)
    }
}
