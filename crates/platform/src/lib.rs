//! Platform layer: window, input polling and the render loop.
//!
//! Setup runs once in `resumed`: window, shaders, model, texture, GPU state.
//! Any failure there is fatal; it is logged, the event loop exits and
//! [`run`] returns the error. After that every `RedrawRequested` is one frame.

mod config;
pub mod input;

use std::{sync::Arc, time::Instant};

use anyhow::Result;
use asset::{ShaderSources, TextureData, obj};
use corelib::{
    SetupError, SetupResult, controls::CameraController, transform::model_view_projection,
    transform::Transform,
};
use renderer::{FrameParams, FramePlan, GpuState, RenderError, SceneAssets};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{DeviceEvent, DeviceId, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowId},
};

pub use config::AppConfig;
use input::InputState;

/// Open the window and render until Escape or close.
pub fn run(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| SetupError::EventLoop(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config);
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| SetupError::EventLoop(e.to_string()))?;

    match viewer.failure.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Live state once setup succeeded. Field order is drop order: GPU
/// resources go before the window they render into.
struct Session {
    gpu: GpuState,
    window: Arc<Window>,
}

struct Viewer {
    config: AppConfig,
    session: Option<Session>,
    input: InputState,
    controller: CameraController,
    model: Transform,
    last_frame: Instant,
    failure: Option<SetupError>,
}

impl Viewer {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            session: None,
            input: InputState::new(),
            controller: CameraController::default(),
            model: Transform::identity(),
            last_frame: Instant::now(),
            failure: None,
        }
    }

    fn setup(&self, event_loop: &ActiveEventLoop) -> SetupResult<Session> {
        let cfg = &self.config;
        let attrs = Window::default_attributes()
            .with_title(cfg.title.clone())
            .with_inner_size(PhysicalSize::new(cfg.width, cfg.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| SetupError::Context(format!("failed to create window: {e}")))?,
        );
        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);
        capture_cursor(&window);

        let shaders = ShaderSources::load(&cfg.vertex_shader, &cfg.fragment_shader)
            .and_then(ShaderSources::compile)
            .map_err(|e| SetupError::Shader(format!("{e:#}")))?;
        let mesh = obj::load_obj_from_path(&cfg.model).map_err(|e| SetupError::Model {
            path: cfg.model.clone(),
            reason: format!("{e:#}"),
        })?;
        let texture = TextureData::load(&cfg.texture).map_err(|e| SetupError::Texture {
            path: cfg.texture.clone(),
            reason: format!("{e:#}"),
        })?;

        let assets = SceneAssets {
            mesh: &mesh,
            texture: &texture,
            shaders: &shaders,
        };
        let gpu = pollster::block_on(GpuState::new(window.clone(), assets, cfg.sample_count))?;

        Ok(Session { gpu, window })
    }

    /// Store the error for `run` to return; the caller reports it.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SetupError) {
        self.failure = Some(err);
        event_loop.exit();
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.should_exit() {
            event_loop.exit();
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let controls = self.input.take_control_input();
        self.controller.update(&controls, dt);
        let mvp = model_view_projection(
            self.controller.projection_matrix(session.gpu.aspect()),
            self.controller.view_matrix(),
            self.model.matrix(),
        );

        let plan = FramePlan::record(&FrameParams {
            clear_color: self.config.clear_color,
            mvp,
            vertex_count: session.gpu.vertex_count(),
        });

        match session.gpu.render(&plan) {
            Ok(()) => {}
            Err(RenderError::Surface(err)) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface {err:?}; reconfiguring");
                session.gpu.recreate_surface();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::warn!("Surface timeout; skipping frame");
            }
            Err(err) => log::error!("Frame failed: {err}"),
        }

        session.window.request_redraw();
    }
}

/// Hide the cursor and keep it in the window so mouse motion turns the camera.
fn capture_cursor(window: &Window) {
    if let Err(e) = window.set_cursor_grab(CursorGrabMode::Locked) {
        log::debug!("Failed to lock cursor: {e}, trying confined mode");
        if let Err(e) = window.set_cursor_grab(CursorGrabMode::Confined) {
            log::warn!("Failed to confine cursor: {e}");
        }
    }
    window.set_cursor_visible(false);

    let size = window.inner_size();
    let center = PhysicalPosition::new(size.width / 2, size.height / 2);
    if let Err(e) = window.set_cursor_position(center) {
        log::debug!("Failed to center cursor: {e}");
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.failure.is_some() {
            return;
        }

        match self.setup(event_loop) {
            Ok(session) => {
                session.window.request_redraw();
                self.session = Some(session);
                self.last_frame = Instant::now();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.input.on_close_requested();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => self.input.on_key(code, state),
            WindowEvent::Focused(false) => self.input.on_focus_lost(),
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(session) = self.session.as_mut() {
                    session.gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.on_mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.should_exit() {
            log::info!("Exit requested. Exiting event loop.");
            event_loop.exit();
        }
    }
}
