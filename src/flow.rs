//! Startup orchestration and the per-frame animation loop.
//!
//! The application runs in two phases:
//!
//! 1. **Startup**: GPU initialisation and all asset loads run concurrently and
//!    are joined once. The loaded resources are assembled into a [`Scene`],
//!    uploaded to the GPU and the [`ReadySignal`] fires.
//! 2. **Steady state**: every `RedrawRequested` runs one
//!    [`AnimationLoop::step`], which schedules the next frame, updates the
//!    camera, evaluates animation rules, advances the water clock and renders.
//!
//! Clock, scheduler and renderer are traits so that the loop can be driven
//! headless, frame by frame.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};
#[cfg(feature = "debug-panel")]
use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    assembly::{AssemblyError, AssetBundle, assemble},
    camera::{Camera, OrbitController, Projection},
    config::{CameraConfig, DioramaConfig},
    context::{Context, ViewportState},
    data_structures::scene_graph::Scene,
    render::GpuRenderer,
    resources::{AssetDir, AssetLoadError, AssetSource, load_all},
};
#[cfg(feature = "debug-panel")]
use crate::debug::{DebugPanel, LogPanelHost, PanelHost};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Everything a frame reads and mutates: the scene, the camera with its
/// controller and projection, and the viewport.
#[derive(Clone, Debug)]
pub struct SceneContext {
    pub scene: Scene,
    pub camera: Camera,
    pub controller: OrbitController,
    pub projection: Projection,
    pub viewport: ViewportState,
}

impl SceneContext {
    pub fn new(scene: Scene, camera: &CameraConfig, viewport: ViewportState) -> Self {
        let mut controller = OrbitController::new(camera.clone());
        controller.set_viewport_height(viewport.height);
        Self {
            scene,
            camera: Camera::from_config(camera),
            controller,
            projection: Projection::from_config(viewport.width, viewport.height, camera),
            viewport,
        }
    }

    /// Adopts a new viewport size. Returns `false` when nothing changed, which
    /// includes zero-sized (minimised) viewports.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f64) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let viewport = ViewportState::new(width, height, pixel_ratio);
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.projection.resize(width, height);
        self.controller.set_viewport_height(height);
        true
    }
}

/// Milliseconds since the Unix epoch. Never reset.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_ms(&self) -> f64 {
        instant::now()
    }
}

/// Requests the next frame from the host.
pub trait FrameScheduler {
    fn schedule_next(&mut self);
}

/// Schedules frames through the window's redraw requests.
#[derive(Clone, Debug)]
pub struct WindowScheduler {
    window: Arc<Window>,
}

impl WindowScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl FrameScheduler for WindowScheduler {
    fn schedule_next(&mut self) {
        self.window.request_redraw();
    }
}

/// Draws a [`SceneContext`].
pub trait SceneRenderer {
    fn resize(&mut self, viewport: &ViewportState);
    fn render(&mut self, ctx: &SceneContext) -> anyhow::Result<()>;
}

/// Tells the host that the scene is on screen.
pub trait ReadySignal {
    fn ready(&mut self);
}

/// Shows the hidden window natively; on the web, adds the `visible` class to
/// the canvas.
#[derive(Clone, Debug)]
pub struct WindowReady {
    window: Arc<Window>,
}

impl WindowReady {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl ReadySignal for WindowReady {
    fn ready(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        self.window.set_visible(true);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;
            if let Some(canvas) = self.window.canvas() {
                if let Err(e) = canvas.class_list().add_1("visible") {
                    log::warn!("Cannot mark the canvas visible: {:?}", e);
                }
            }
        }
        log::info!("Scene is ready");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("rendering frame {frame} failed")]
    Render {
        frame: u64,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] AssetLoadError),
    #[error("the loaded assets do not form a scene")]
    Assembly(#[from] AssemblyError),
}

/// Loads every asset of `config` from `source` and assembles the scene.
/// Nothing is assembled unless every load succeeded.
pub async fn prepare_scene<S: AssetSource>(
    config: &DioramaConfig,
    source: &S,
    viewport: ViewportState,
) -> Result<SceneContext, StartupError> {
    let resources = load_all(&config.assets.requests(), source).await?;
    let bundle = AssetBundle::from_resources(config, resources)?;
    let scene = assemble(&bundle, config)?;
    Ok(SceneContext::new(scene, &config.camera, viewport))
}

/// Runs the GPU initialisation `gpu` concurrently with [`prepare_scene`], hands
/// both to `upload`, then fires `ready`. A startup that fails at any point
/// never signals.
pub async fn startup<S, G, R, Y>(
    config: &DioramaConfig,
    source: &S,
    viewport: ViewportState,
    gpu: impl Future<Output = anyhow::Result<G>>,
    upload: impl FnOnce(G, &Scene) -> anyhow::Result<R>,
    ready: &mut Y,
) -> anyhow::Result<(SceneContext, R)>
where
    S: AssetSource,
    Y: ReadySignal,
{
    let (gpu, scene_ctx) = futures::join!(gpu, prepare_scene(config, source, viewport));
    let (gpu, scene_ctx) = (gpu?, scene_ctx?);
    let renderer = upload(gpu, &scene_ctx.scene)?;
    ready.ready();
    Ok((scene_ctx, renderer))
}

/// The steady-state frame driver.
pub struct AnimationLoop<C, S, R> {
    pub ctx: SceneContext,
    clock: C,
    scheduler: S,
    renderer: R,
    water_time_step: f32,
    frames: u64,
}

impl<C: Clock, S: FrameScheduler, R: SceneRenderer> AnimationLoop<C, S, R> {
    pub fn new(ctx: SceneContext, clock: C, scheduler: S, renderer: R, water_time_step: f32) -> Self {
        Self {
            ctx,
            clock,
            scheduler,
            renderer,
            water_time_step,
            frames: 0,
        }
    }

    /// Runs one frame.
    pub fn step(&mut self) -> Result<(), FrameError> {
        self.scheduler.schedule_next();
        self.ctx.controller.update(&mut self.ctx.camera);
        self.ctx.scene.animate(self.clock.now_ms());
        // Frame based, independent of the wall clock
        self.ctx.scene.water.time += self.water_time_step;
        self.renderer
            .render(&self.ctx)
            .map_err(|source| FrameError::Render {
                frame: self.frames,
                source,
            })?;
        self.frames += 1;
        Ok(())
    }

    /// Steps while `keep_running` holds. Returns the number of frames rendered
    /// by this call.
    pub fn run(&mut self, mut keep_running: impl FnMut(&SceneContext) -> bool) -> Result<u64, FrameError> {
        let start = self.frames;
        while keep_running(&self.ctx) {
            self.step()?;
        }
        Ok(self.frames - start)
    }

    /// Forwards a viewport change to the renderer unless it is a repeat.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f64) -> bool {
        let changed = self.ctx.resize(width, height, pixel_ratio);
        if changed {
            self.renderer.resize(&self.ctx.viewport);
        }
        changed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

type Diorama = AnimationLoop<WallClock, WindowScheduler, GpuRenderer>;

pub(crate) enum AppEvent {
    Initialized(Box<anyhow::Result<Diorama>>),
}

impl std::fmt::Debug for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(result) => f
                .debug_tuple("Initialized")
                .field(&result.as_ref().as_ref().map(|_| "Diorama"))
                .finish(),
        }
    }
}

async fn start(window: Arc<Window>, config: DioramaConfig) -> anyhow::Result<Diorama> {
    let size = window.inner_size();
    let viewport = ViewportState::new(size.width.max(1), size.height.max(1), window.scale_factor());
    let source = AssetDir::new();
    let mut ready = WindowReady::new(window.clone());

    let (scene_ctx, renderer) = startup(
        &config,
        &source,
        viewport,
        Context::new(window.clone()),
        GpuRenderer::new,
        &mut ready,
    )
    .await?;

    Ok(AnimationLoop::new(
        scene_ctx,
        WallClock,
        WindowScheduler::new(window),
        renderer,
        config.water_time_step,
    ))
}

#[cfg(feature = "debug-panel")]
struct Panel {
    table: DebugPanel,
    host: LogPanelHost,
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: EventLoopProxy<AppEvent>,
    config: DioramaConfig,
    started: bool,
    halted: bool,
    diorama: Option<Diorama>,
    #[cfg(feature = "debug-panel")]
    panel: Option<Panel>,
}

impl App {
    fn new(event_loop: &EventLoop<AppEvent>, config: DioramaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            started: false,
            halted: false,
            diorama: None,
            #[cfg(feature = "debug-panel")]
            panel: None,
        })
    }

    fn on_started(&mut self, event_loop: &ActiveEventLoop, result: anyhow::Result<Diorama>) {
        let mut diorama = match result {
            Ok(diorama) => diorama,
            Err(e) => {
                log::error!("Startup failed: {:#}", e);
                event_loop.exit();
                return;
            }
        };
        let window = diorama.renderer().window().clone();
        let size = window.inner_size();
        diorama.resize(size.width, size.height, window.scale_factor());

        #[cfg(feature = "debug-panel")]
        {
            log::info!("Debug panel attached, press F1 to print it");
            self.panel = Some(Panel {
                table: DebugPanel::standard(&diorama.ctx),
                host: LogPanelHost::new(),
            });
        }

        window.request_redraw();
        self.diorama = Some(diorama);
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title("nightsail")
            .with_visible(false);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .and_then(|element| element.dyn_into().ok());
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let init_future = start(window, self.config.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self.async_runtime.block_on(init_future);
            self.on_started(event_loop, result);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = init_future.await;
                if proxy
                    .send_event(AppEvent::Initialized(Box::new(result)))
                    .is_err()
                {
                    log::error!("The event loop closed before startup finished");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            AppEvent::Initialized(result) => self.on_started(event_loop, *result),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(diorama) = &mut self.diorama else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let ratio = diorama.renderer().window().scale_factor();
                diorama.resize(size.width, size.height, ratio);
            }
            WindowEvent::RedrawRequested => {
                if self.halted {
                    return;
                }
                #[cfg(feature = "debug-panel")]
                if let Some(panel) = &mut self.panel {
                    panel.table.apply(&mut diorama.ctx, panel.host.take_edits());
                }
                if let Err(e) = diorama.step() {
                    log::error!("{:#}", anyhow::Error::from(e));
                    self.halted = true;
                }
            }
            #[cfg(feature = "debug-panel")]
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::F1),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(panel) = &mut self.panel {
                    panel.host.show(&panel.table, &diorama.ctx);
                }
            }
            other => {
                diorama.ctx.controller.handle_window_events(&other);
            }
        }
    }
}

/// Opens the window and runs the diorama until it is closed.
pub fn run(config: DioramaConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    config.validate()?;
    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
