use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use ingest::DecodedQueue;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::control::ControlHandle;
use crate::engine::{FrameStats, MosaicEngine};
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::types::{MosaicConfig, WindowConfig};

const FADE_STEP: f32 = 0.05;
const SCROLL_STEP: f32 = 0.05;

/// Keyboard shortcuts mapped onto the control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyAction {
    TileFactor(i32),
    Fade(f32),
    ScrollSpeedX(f32),
    ResetScroll,
    ToggleVsync,
    Quit,
}

fn action_for(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::TileFactor(1)),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::TileFactor(-1)),
        Key::Named(NamedKey::ArrowLeft) => Some(KeyAction::ScrollSpeedX(-SCROLL_STEP)),
        Key::Named(NamedKey::ArrowRight) => Some(KeyAction::ScrollSpeedX(SCROLL_STEP)),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(value) => match value.as_str() {
            "[" => Some(KeyAction::Fade(-FADE_STEP)),
            "]" => Some(KeyAction::Fade(FADE_STEP)),
            "0" => Some(KeyAction::ResetScroll),
            "v" | "V" => Some(KeyAction::ToggleVsync),
            _ => None,
        },
        _ => None,
    }
}

/// Applies the control-surface actions; window-level ones are left to the caller.
fn apply(control: &ControlHandle, action: KeyAction) {
    match action {
        KeyAction::TileFactor(step) => {
            control.set_tile_factor(control.tile_factor() as i32 + step);
        }
        KeyAction::Fade(step) => control.set_fade_factor(control.fade_factor() + step),
        KeyAction::ScrollSpeedX(step) => {
            let [x, y] = control.scroll_speed();
            control.set_scroll_speed(x + step, y);
        }
        KeyAction::ResetScroll => control.set_scroll_offset(0.0, 0.0),
        KeyAction::ToggleVsync | KeyAction::Quit => {}
    }
}

/// Frame-rate bookkeeping for the once-per-second stats line.
struct RenderStats {
    frames: u32,
    last_report: Instant,
}

impl RenderStats {
    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            last_report: now,
        }
    }

    fn record(&mut self, now: Instant, frame: &FrameStats, capacity: usize) {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            debug!(
                fps = fps.round(),
                usage = frame.usage,
                capacity,
                pending = frame.pending,
                tiles = frame.tiles_drawn,
                "render stats"
            );
            self.frames = 0;
            self.last_report = now;
        }
    }
}

struct WindowState {
    window: Arc<Window>,
    context: GpuContext,
    engine: MosaicEngine,
    control: ControlHandle,
    last_frame: Instant,
    stats: RenderStats,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        window_config: &WindowConfig,
        mosaic: &MosaicConfig,
        control: ControlHandle,
        decoded: DecodedQueue,
    ) -> Result<Self> {
        let context = GpuContext::new(window.clone(), window_config.power, window_config.vsync)?;
        let size = (context.size.width, context.size.height);
        let engine = MosaicEngine::new(
            &context.device,
            &context.queue,
            context.surface_format,
            size,
            mosaic,
            control.clone(),
            decoded,
        )?;
        let now = Instant::now();
        Ok(Self {
            window,
            context,
            engine,
            control,
            last_frame: now,
            stats: RenderStats::new(now),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
        self.engine.resize(self.context.size.width, self.context.size.height);
    }

    fn render(&mut self) -> Result<FrameStats, EngineError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        let stats = self.engine.frame(dt, &view);
        self.window.pre_present_notify();
        frame.present();
        self.stats
            .record(now, &stats, self.control.ring_capacity());
        Ok(stats)
    }
}

/// Opens a window and renders the mosaic until it is closed.
///
/// `control` stays usable from other threads for the whole run; `decoded` is
/// the output of the decode workers.
pub fn run(
    window_config: WindowConfig,
    mosaic: MosaicConfig,
    control: ControlHandle,
    decoded: DecodedQueue,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(window_config.title.as_str())
        .with_inner_size(PhysicalSize::new(window_config.size.0, window_config.size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &window_config, &mosaic, control, decoded)?;
    info!(
        width = state.context.size.width,
        height = state.context.size.height,
        format = ?state.context.surface_format,
        "mosaic window ready"
    );

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state != ElementState::Pressed {
                            return;
                        }
                        match action_for(&event.logical_key) {
                            Some(KeyAction::Quit) => elwt.exit(),
                            Some(KeyAction::ToggleVsync) => {
                                let enabled = !state.context.vsync();
                                state.context.set_vsync(enabled);
                            }
                            Some(action) => apply(&state.control, action),
                            None => {}
                        }
                    }
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::RedrawRequested => match state.render() {
                        Ok(_) => {}
                        Err(EngineError::Surface(
                            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                        )) => {
                            let size = state.context.size;
                            state.resize(size);
                        }
                        Err(EngineError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(EngineError::Surface(wgpu::SurfaceError::Timeout)) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(err) => {
                            warn!(error = %err, "frame failed; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
