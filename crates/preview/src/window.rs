//! Desktop preview host built on winit + glutin.
//!
//! Opens one window, tries to create an OpenGL ES 3.0 context (falling back
//! to desktop OpenGL 3.3 core), and drives a [`PreviewController`] from the
//! winit event loop. Redraw requests double as the per-frame callback.
//!
//! Keys: `Space` toggles the preview on and off, `Escape` closes the window.

use std::cell::{Cell, RefCell};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::thread;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::Receiver;
use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributes, ContextAttributesBuilder, GlProfile, NotCurrentContext,
    PossiblyCurrentContext, Version,
};
use glutin::display::{Display, GetGlDisplay};
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::controller::{Drawable, PreviewController, PLACEHOLDER_COLOR};
use crate::driver::{GlowDriver, GraphicsDriver};
use crate::format::ShaderDialect;
use crate::log::Severity;
use crate::runtime::SystemClock;
use crate::schedule::{CancellationToken, FrameRequestId, FrameScheduler};
use crate::types::{ShaderSourceText, SurfaceSize};

/// Settings for [`run_window`].
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: SurfaceSize,
    pub vsync: bool,
    /// Context flavour to try first; the other one is the fallback.
    pub dialect: ShaderDialect,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "shaderlab preview".to_string(),
            size: SurfaceSize::default(),
            vsync: true,
            dialect: ShaderDialect::default(),
        }
    }
}

#[derive(Debug)]
enum HostEvent {
    Source(ShaderSourceText),
}

type PendingRedraw = Rc<RefCell<Option<(FrameRequestId, CancellationToken)>>>;

/// [`FrameScheduler`] backed by `Window::request_redraw`.
///
/// winit coalesces redraw requests, so a single pending slot is enough.
#[derive(Clone)]
struct RedrawScheduler {
    window: Rc<Window>,
    pending: PendingRedraw,
    next_id: Rc<Cell<u64>>,
}

impl RedrawScheduler {
    fn new(window: Rc<Window>) -> Self {
        Self {
            window,
            pending: Rc::default(),
            next_id: Rc::default(),
        }
    }

    /// Takes the request due at this redraw, skipping cancelled ones.
    fn take_due(&self) -> Option<FrameRequestId> {
        let (id, token) = self.pending.borrow_mut().take()?;
        (!token.is_cancelled()).then_some(id)
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self, token: CancellationToken) -> FrameRequestId {
        let id = FrameRequestId::from_raw(self.next_id.get() + 1);
        self.next_id.set(id.raw());
        *self.pending.borrow_mut() = Some((id, token));
        self.window.request_redraw();
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        let mut pending = self.pending.borrow_mut();
        if pending.as_ref().is_some_and(|(pending_id, _)| *pending_id == id) {
            *pending = None;
        }
    }
}

struct GlState {
    display: Display,
    context: PossiblyCurrentContext,
    surface: Surface<WindowSurface>,
    dialect: ShaderDialect,
}

/// The window plus its GL context, if one could be created.
struct GlHost {
    gl: std::result::Result<GlState, String>,
    window: Rc<Window>,
}

impl GlHost {
    fn resize(&self, size: PhysicalSize<u32>) {
        if let Ok(gl) = &self.gl {
            gl.surface
                .resize(&gl.context, non_zero(size.width), non_zero(size.height));
        }
    }

    /// Paints the neutral placeholder while no controller owns the surface.
    fn show_placeholder(&mut self) {
        let mut driver = match self.acquire() {
            Ok(driver) => driver,
            Err(reason) => {
                debug!(%reason, "no context to clear the preview surface");
                return;
            }
        };
        let (width, height) = self.size().viewport();
        driver.viewport(width, height);
        driver.clear(PLACEHOLDER_COLOR);
        self.present();
    }

    fn present(&self) {
        if let Ok(gl) = &self.gl {
            if let Err(err) = gl.surface.swap_buffers(&gl.context) {
                warn!(error = %err, "failed to present preview frame");
            }
        }
    }
}

impl Drawable for GlHost {
    type Driver = GlowDriver;

    fn acquire(&mut self) -> std::result::Result<GlowDriver, String> {
        let gl = self.gl.as_ref().map_err(Clone::clone)?;
        gl.context
            .make_current(&gl.surface)
            .map_err(|err| format!("failed to make GL context current: {err}"))?;
        // SAFETY: the context was made current on this thread just above and
        // the event loop never leaves this thread.
        let driver = unsafe {
            let context =
                glow::Context::from_loader_function_cstr(|name| gl.display.get_proc_address(name));
            GlowDriver::new(context, gl.dialect)
        };
        Ok(driver)
    }

    fn size(&self) -> SurfaceSize {
        let size = self.window.inner_size();
        SurfaceSize::new(size.width, size.height)
    }
}

/// Opens the preview window and blocks until it is closed.
///
/// `initial` is shown immediately; every source received on `updates` replaces
/// it between frames.
pub fn run_window(
    options: WindowOptions,
    initial: ShaderSourceText,
    updates: Option<Receiver<ShaderSourceText>>,
) -> Result<()> {
    let event_loop = EventLoopBuilder::<HostEvent>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    if let Some(updates) = updates {
        let proxy = event_loop.create_proxy();
        thread::Builder::new()
            .name("shaderlab-preview-updates".into())
            .spawn(move || {
                for source in updates.iter() {
                    if proxy.send_event(HostEvent::Source(source)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn update forwarder: {err}"))?;
    }

    let window_builder = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(PhysicalSize::new(options.size.width, options.size.height));
    let template = ConfigTemplateBuilder::new().with_alpha_size(8);
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder))
        .build(&event_loop, template, pick_config)
        .map_err(|err| anyhow!("failed to create GL display: {err}"))?;
    let window = Rc::new(window.ok_or_else(|| anyhow!("display builder did not create a window"))?);

    let gl = create_gl_state(&window, &gl_config, &options).map_err(|err| {
        error!(error = %err, "preview window has no GL context");
        err.to_string()
    });
    let mut host = GlHost {
        gl,
        window: Rc::clone(&window),
    };

    let scheduler = RedrawScheduler::new(Rc::clone(&window));
    let mut controller = PreviewController::new(scheduler.clone(), SystemClock)
        .with_dialect(options.dialect);
    if let Err(err) = controller.set_source(initial) {
        warn!(error = %err, "initial preview source rejected");
    }
    if let Err(err) = controller.activate(&mut host) {
        error!(error = %err, "failed to activate preview");
    }

    let mut mirrored = 0usize;
    let mut shown_state = "";
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(HostEvent::Source(source)) => {
            if let Err(err) = controller.set_source(source) {
                warn!(error = %err, "preview source update rejected");
            }
        }
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::Resized(size) => {
                host.resize(size);
                controller.resize(SurfaceSize::new(size.width, size.height));
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    Key::Named(NamedKey::Space) => {
                        if controller.is_active() {
                            controller.deactivate();
                            host.show_placeholder();
                        } else if let Err(err) = controller.activate(&mut host) {
                            warn!(error = %err, "failed to reactivate preview");
                        }
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(id) = scheduler.take_due() {
                    if controller.on_frame(id).needs_present() {
                        host.present();
                    }
                } else if controller.is_active() {
                    // Window-system redraw: a failed preview repaints its placeholder.
                    controller.invalidate();
                } else if !controller.is_unsupported() {
                    host.show_placeholder();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            for entry in controller.log().since(mirrored) {
                match entry.severity {
                    Severity::Info => info!("{}", entry.message),
                    Severity::Warning => warn!("{}", entry.message),
                    Severity::Error => error!("{}", entry.message),
                }
            }
            mirrored = controller.log().len();

            let label = controller.state().label();
            if label != shown_state {
                window.set_title(&format!("{} [{label}]", options.title));
                shown_state = label;
            }
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => {
            debug!("preview window closing");
            controller.deactivate();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("preview event loop error: {err}"))
}

fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    // glutin only invokes the picker with at least one candidate.
    configs
        .reduce(|best, next| {
            if next.num_samples() > best.num_samples() {
                next
            } else {
                best
            }
        })
        .expect("glutin offered no GL configs")
}

fn create_gl_state(window: &Window, config: &Config, options: &WindowOptions) -> Result<GlState> {
    let raw = window.raw_window_handle();
    let display = config.display();
    let (context, dialect) = create_context(&display, config, raw, options.dialect)?;

    let size = window.inner_size();
    let attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw,
        non_zero(size.width),
        non_zero(size.height),
    );
    let surface = unsafe { display.create_window_surface(config, &attributes) }
        .map_err(|err| anyhow!("failed to create GL window surface: {err}"))?;
    let context = context
        .make_current(&surface)
        .map_err(|err| anyhow!("failed to make GL context current: {err}"))?;

    let interval = if options.vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    if let Err(err) = surface.set_swap_interval(&context, interval) {
        warn!(error = %err, vsync = options.vsync, "failed to set swap interval");
    }

    info!(%dialect, "created GL context for preview");
    Ok(GlState {
        display,
        context,
        surface,
        dialect,
    })
}

fn create_context(
    display: &Display,
    config: &Config,
    raw: RawWindowHandle,
    preferred: ShaderDialect,
) -> Result<(NotCurrentContext, ShaderDialect)> {
    let attempts = match preferred {
        ShaderDialect::Es300 => [ShaderDialect::Es300, ShaderDialect::Core330],
        ShaderDialect::Core330 => [ShaderDialect::Core330, ShaderDialect::Es300],
    };

    let mut failures = Vec::new();
    for dialect in attempts {
        let attributes = context_attributes(dialect, raw);
        match unsafe { display.create_context(config, &attributes) } {
            Ok(context) => return Ok((context, dialect)),
            Err(err) => {
                debug!(%dialect, error = %err, "GL context creation failed");
                failures.push(format!("{dialect}: {err}"));
            }
        }
    }
    bail!(
        "no OpenGL ES 3.0 or OpenGL 3.3 core context available ({})",
        failures.join("; ")
    )
}

fn context_attributes(dialect: ShaderDialect, raw: RawWindowHandle) -> ContextAttributes {
    match dialect {
        ShaderDialect::Es300 => ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
            .build(Some(raw)),
        ShaderDialect::Core330 => ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw)),
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}
