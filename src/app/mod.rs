pub mod egui_host;
pub mod frame_loop;
pub mod input;
pub mod timing;

use crate::assets::{AssetError, AssetLoader};
use crate::config::DemoConfig;
use crate::render::{RenderBackend, RenderContext, RenderError};
use crate::scene::world;
use crate::ui::{apply_values, DebugPanel, PanelAction, PanelValues};
use egui_host::EguiHost;
use frame_loop::{CameraRig, FrameLoop};
use input::{InputAction, InputState};
use timing::FpsCounter;

use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Everything that exists once the window is up.
struct Running {
    window: Arc<Window>,
    render: RenderContext,
    egui: EguiHost,
    panel: DebugPanel,
    frame_loop: FrameLoop,
}

struct App {
    config: DemoConfig,
    running: Option<Running>,
    input: InputState,
    fps: FpsCounter,
    fatal: Option<AppError>,
}

impl App {
    fn new(config: DemoConfig) -> Self {
        let fps = FpsCounter::new(config.window.title.clone());
        Self {
            config,
            running: None,
            input: InputState::default(),
            fps,
            fatal: None,
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running, AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);

        let render = RenderContext::new(window.clone(), &self.config.renderer)?;
        let egui = EguiHost::new(&window, render.max_texture_side());

        let mut assets = AssetLoader::spawn(&self.config.scene.asset_root)?;
        let world = world::build(&self.config, &mut assets);
        log::info!(
            "Scene built: {} nodes, {} assets loading",
            world.scene.node_count(),
            assets.in_flight()
        );
        let rig = CameraRig::from_config(&self.config);
        let panel = DebugPanel::new(&rig.primary);
        let frame_loop = FrameLoop::new(world, rig, assets, self.config.scene.spin_rate);

        Ok(Running {
            window,
            render,
            egui,
            panel,
            frame_loop,
        })
    }

    fn apply_input(&mut self, event_loop: &ActiveEventLoop, action: InputAction) {
        let Some(running) = &mut self.running else {
            return;
        };
        let height = running.render.surface_size().1 as f32;
        let frame_loop = &mut running.frame_loop;
        match action {
            InputAction::None => {}
            InputAction::Orbit { dx, dy } => {
                let (_, controls) = frame_loop.active_view();
                controls.rotate_by_pixels(dx, dy, height);
            }
            InputAction::Pan { dx, dy } => {
                let (camera, controls) = frame_loop.active_view();
                controls.pan_by_pixels(camera, dx, dy, height);
            }
            InputAction::Dolly(steps) => {
                let (_, controls) = frame_loop.active_view();
                controls.dolly(steps);
            }
            InputAction::SwitchCamera => frame_loop.switch_camera(),
            InputAction::Exit => {
                log::info!("Escape pressed, shutting down...");
                event_loop.exit();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = &mut self.running else {
            return;
        };

        running
            .panel
            .set_camera_label(running.frame_loop.active_camera().label());
        let mut values = PanelValues::capture(
            &running.frame_loop.rig.primary,
            running.frame_loop.scene.fog.as_ref(),
        );
        let mut action = PanelAction::None;
        let panel = &running.panel;
        let overlay = running.egui.run(&running.window, |ctx| {
            action = panel.show(ctx, &mut values);
        });
        apply_values(
            &values,
            &mut running.frame_loop.rig.primary,
            running.frame_loop.scene.fog.as_mut(),
        );
        if action == PanelAction::SwitchCamera {
            running.frame_loop.switch_camera();
        }
        running.render.set_overlay(overlay);

        match running.frame_loop.tick(Instant::now(), &mut running.render) {
            Ok(report) => {
                if let Some((width, height)) = report.resized {
                    log::debug!("Surface follows window: {width}x{height}");
                }
                if report.assets_applied > 0 {
                    log::debug!(
                        "{} asset events applied, {} in flight",
                        report.assets_applied,
                        running.frame_loop.assets().in_flight()
                    );
                }
            }
            Err(error) => {
                log::error!("Render failed: {error}");
                self.fatal = Some(error.into());
                event_loop.exit();
                return;
            }
        }

        self.fps.set_render_ms(running.render.render_ms());
        if let Some(title) = self.fps.frame(Instant::now()) {
            running.window.set_title(&title);
        }
        running.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(error) => {
                log::error!("Startup failed: {error}");
                self.fatal = Some(error);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (ui_pointer, ui_keyboard) = match &mut self.running {
            Some(running) => {
                running.egui.on_window_event(&running.window, &event);
                (running.egui.wants_pointer(), running.egui.wants_keyboard())
            }
            None => (false, false),
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if ui_keyboard || event.repeat {
                    return;
                }
                let pressed = event.state == ElementState::Pressed;
                let action = self.input.handle_key(event.physical_key, pressed);
                self.apply_input(event_loop, action);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                // Drags that start on the panel stay with the panel.
                if !(pressed && ui_pointer) {
                    self.input.handle_mouse_button(button, pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let action = self.input.handle_cursor_moved(position.x, position.y);
                self.apply_input(event_loop, action);
            }
            WindowEvent::CursorLeft { .. } | WindowEvent::Focused(false) => {
                self.input.release_all();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !ui_pointer {
                    let action = self.input.handle_wheel(delta);
                    self.apply_input(event_loop, action);
                }
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(running) = &self.running {
                    running.window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Joins the asset worker and releases GPU resources before the loop ends.
        self.running = None;
    }
}

pub fn run(config: DemoConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
