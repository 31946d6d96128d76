//! Preview surface controller.
//!
//! Owns the lifecycle of one live preview bound to one drawable and reacts to
//! two external signals: new fragment source text and activation toggles.
//!
//! ```text
//!            activate + source / source change while active
//!   Idle ─────────────────────────────▶ Compiling ──link ok──▶ Live
//!    ▲                                     │  ▲                 │
//!    │                                     │  └──source change──┘
//!    │                              compile/link error
//!    │                                     ▼
//!    └────────── deactivate ───────── Failed(log) ◀─ source change retries
//! ```
//!
//! The controller never loops on its own. Every frame is one host callback
//! requested through the [`FrameScheduler`] and guarded by a
//! [`CancellationToken`]; source edits only mark a recompile which happens
//! at the next frame boundary, so bursts of edits collapse into one compile
//! of the latest text.

use tracing::{debug, info, warn};

use crate::compile::{BuildPoll, PendingBuild, ProgramBuild};
use crate::driver::GraphicsDriver;
use crate::error::PreviewError;
use crate::format::{
    self, ShaderDialect, POSITION_ATTRIBUTE, POINTER_UNIFORM, RESOLUTION_UNIFORM, TIME_UNIFORM,
};
use crate::log::ActivityLog;
use crate::runtime::{Clock, FrameClock};
use crate::schedule::{CancellationToken, FrameRequestId, FrameScheduler};
use crate::types::{PreviewState, ShaderLanguage, ShaderSourceText, SurfaceSize};

/// Two triangles covering normalised device coordinates, as `(x, y)` pairs.
pub const QUAD_VERTICES: [f32; 12] = [
    -1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    -1.0, 1.0, //
    1.0, -1.0, //
    1.0, 1.0, //
];
pub const QUAD_VERTEX_COUNT: i32 = 6;

/// Colour used when the drawable shows the neutral placeholder.
pub const PLACEHOLDER_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A surface that can hand out a rendering context.
pub trait Drawable {
    type Driver: GraphicsDriver;

    /// Acquires the graphics driver for this surface. An error means the
    /// surface cannot provide the required context at all.
    fn acquire(&mut self) -> Result<Self::Driver, String>;

    /// Current size in physical pixels.
    fn size(&self) -> SurfaceSize;
}

/// What a frame callback did, so hosts know whether to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing was rendered (stale callback, compile still pending, ...).
    Skipped,
    /// One frame of the live program was drawn.
    Drawn,
    /// The neutral placeholder was drawn after a failure.
    Cleared,
}

impl FrameOutcome {
    pub fn needs_present(self) -> bool {
        !matches!(self, FrameOutcome::Skipped)
    }
}

#[derive(Debug)]
struct ScheduledFrame {
    id: FrameRequestId,
    token: CancellationToken,
}

/// Everything allocated for a program once it went live.
struct LiveProgram<D: GraphicsDriver> {
    build: ProgramBuild<D>,
    buffer: D::Buffer,
    vertex_array: D::VertexArray,
    time: Option<D::UniformLocation>,
    resolution: Option<D::UniformLocation>,
    #[allow(dead_code)]
    pointer: Option<D::UniformLocation>,
}

impl<D: GraphicsDriver> LiveProgram<D> {
    fn release(self, driver: &mut D) {
        driver.use_program(None);
        driver.bind_vertex_array(None);
        driver.delete_vertex_array(self.vertex_array);
        driver.delete_buffer(self.buffer);
        self.build.release(driver);
    }
}

/// Per-activation state. Dropping it drops the driver.
struct ActiveSurface<D: GraphicsDriver> {
    driver: D,
    dialect: ShaderDialect,
    size: SurfaceSize,
    applied_viewport: Option<SurfaceSize>,
    recompile: bool,
    build: Option<PendingBuild<D>>,
    program: Option<LiveProgram<D>>,
    frame_clock: FrameClock,
    placeholder_drawn: bool,
}

impl<D: GraphicsDriver> ActiveSurface<D> {
    fn release_program(&mut self) {
        if let Some(build) = self.build.take() {
            build.abandon(&mut self.driver);
        }
        if let Some(program) = self.program.take() {
            program.release(&mut self.driver);
        }
        self.frame_clock.stop();
    }
}

/// Drives one preview surface through `Idle`, `Compiling`, `Live` and
/// `Failed`.
pub struct PreviewController<D, S, C>
where
    D: GraphicsDriver,
    S: FrameScheduler,
    C: Clock,
{
    scheduler: S,
    clock: C,
    dialect: ShaderDialect,
    state: PreviewState,
    log: ActivityLog,
    source: Option<ShaderSourceText>,
    surface: Option<ActiveSurface<D>>,
    scheduled: Option<ScheduledFrame>,
    unsupported: Option<String>,
    frames_drawn: u64,
}

impl<D, S, C> PreviewController<D, S, C>
where
    D: GraphicsDriver,
    S: FrameScheduler,
    C: Clock,
{
    pub fn new(scheduler: S, clock: C) -> Self {
        Self {
            scheduler,
            clock,
            dialect: ShaderDialect::default(),
            state: PreviewState::Idle,
            log: ActivityLog::new(),
            source: None,
            surface: None,
            scheduled: None,
            unsupported: None,
            frames_drawn: 0,
        }
    }

    /// Dialect used to wrap snippets when the driver does not report one.
    pub fn with_dialect(mut self, dialect: ShaderDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    /// Whether activation failed permanently for lack of a context.
    pub fn is_unsupported(&self) -> bool {
        self.unsupported.is_some()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn source(&self) -> Option<&ShaderSourceText> {
        self.source.as_ref()
    }

    /// Binds the controller to `drawable` and, if source text is present,
    /// compiles it right away.
    pub fn activate<W>(&mut self, drawable: &mut W) -> Result<(), PreviewError>
    where
        W: Drawable<Driver = D>,
    {
        if let Some(reason) = &self.unsupported {
            return Err(PreviewError::UnsupportedContext(reason.clone()));
        }
        if self.surface.is_some() {
            debug!("preview already active");
            return Ok(());
        }

        let driver = match drawable.acquire() {
            Ok(driver) => driver,
            Err(reason) => {
                warn!(%reason, "preview surface has no usable rendering context");
                self.log
                    .error(format!("preview unavailable: {reason}"));
                self.unsupported = Some(reason.clone());
                return Err(PreviewError::UnsupportedContext(reason));
            }
        };

        let dialect = driver.dialect().unwrap_or(self.dialect);
        let size = drawable.size();
        info!(width = size.width, height = size.height, %dialect, "preview activated");
        self.log.info("preview activated");
        self.surface = Some(ActiveSurface {
            driver,
            dialect,
            size,
            applied_viewport: None,
            recompile: false,
            build: None,
            program: None,
            frame_clock: FrameClock::default(),
            placeholder_drawn: false,
        });

        if self.source.is_some() {
            self.start_compile();
        }
        self.ensure_frame_scheduled();
        Ok(())
    }

    /// Records new source text. While active, the recompile happens at the
    /// next frame boundary; edits made before then are coalesced.
    pub fn set_source(&mut self, source: ShaderSourceText) -> Result<(), PreviewError> {
        if source.language() != ShaderLanguage::Glsl {
            warn!(language = %source.language(), "ignoring non-GLSL preview source");
            self.log.warn(format!(
                "{} output cannot be previewed",
                source.language().display_name()
            ));
            return Err(PreviewError::UnsupportedLanguage(source.language()));
        }

        debug!(bytes = source.text().len(), "preview source updated");
        self.source = Some(source);
        if let Some(surface) = self.surface.as_mut() {
            surface.recompile = true;
            self.ensure_frame_scheduled();
        }
        Ok(())
    }

    /// Records a new drawable size; applied before the next draw. A failed
    /// preview repaints its placeholder at the new size.
    pub fn resize(&mut self, size: SurfaceSize) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if surface.size == size {
            return;
        }
        debug!(width = size.width, height = size.height, "preview resized");
        surface.size = size;
        self.invalidate();
    }

    /// Tells the controller the drawable contents were lost (an expose or a
    /// resize by the window system). Only `Failed` needs this; `Live`
    /// redraws every frame anyway.
    pub fn invalidate(&mut self) {
        if !matches!(self.state, PreviewState::Failed(_)) {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.placeholder_drawn = false;
            self.ensure_frame_scheduled();
        }
    }

    /// Host per-frame entry point.
    pub fn on_frame(&mut self, id: FrameRequestId) -> FrameOutcome {
        let owned = self
            .scheduled
            .as_ref()
            .is_some_and(|frame| frame.id == id && !frame.token.is_cancelled());
        if !owned {
            debug!(%id, "ignoring stale frame callback");
            return FrameOutcome::Skipped;
        }
        self.scheduled = None;
        if self.surface.is_none() {
            return FrameOutcome::Skipped;
        }

        let recompile = self
            .surface
            .as_mut()
            .is_some_and(|surface| std::mem::take(&mut surface.recompile));
        if recompile {
            self.start_compile();
        } else if self.surface.as_ref().is_some_and(|s| s.build.is_some()) {
            self.poll_build();
        }

        let outcome = self.render();
        self.ensure_frame_scheduled();
        outcome
    }

    /// Stops the render loop and releases every driver resource. Safe to call
    /// from any state and more than once.
    pub fn deactivate(&mut self) {
        self.cancel_scheduled();
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        surface.release_program();
        drop(surface);

        info!("preview deactivated");
        self.log.info("preview deactivated");
        self.transition(PreviewState::Idle);
    }

    fn start_compile(&mut self) {
        self.cancel_scheduled();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.recompile = false;
        surface.release_program();

        let Some(source) = self.source.clone() else {
            return;
        };
        self.transition(PreviewState::Compiling);

        if source.is_blank() {
            self.fail(PreviewError::EmptySource);
            return;
        }

        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let fragment = format::normalize_with(source.text(), surface.dialect);
        let vertex = format::vertex_shader(surface.dialect);
        debug!(bytes = fragment.len(), "compiling preview program");

        match PendingBuild::begin(&mut surface.driver, &vertex, &fragment) {
            Ok(build) => {
                surface.build = Some(build);
                self.poll_build();
            }
            Err(err) => self.fail(err),
        }
    }

    fn poll_build(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let Some(build) = surface.build.take() else {
            return;
        };
        match build.poll(&mut surface.driver) {
            Ok(BuildPoll::Pending(build)) => {
                debug!("driver still compiling preview program");
                surface.build = Some(build);
            }
            Ok(BuildPoll::Ready(build)) => self.go_live(build),
            Err(err) => self.fail(err),
        }
    }

    fn go_live(&mut self, build: ProgramBuild<D>) {
        let now = self.clock.now();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let driver = &mut surface.driver;
        let program = build.program();

        let Some(position) = driver.attribute_location(program, POSITION_ATTRIBUTE) else {
            build.release(driver);
            self.fail(PreviewError::Link {
                log: format!("vertex attribute `{POSITION_ATTRIBUTE}` is not active in the linked program"),
            });
            return;
        };

        let buffer = match driver.create_buffer() {
            Ok(buffer) => buffer,
            Err(err) => {
                build.release(driver);
                self.fail(PreviewError::Resource(err));
                return;
            }
        };
        let vertex_array = match driver.create_vertex_array() {
            Ok(vertex_array) => vertex_array,
            Err(err) => {
                driver.delete_buffer(buffer);
                build.release(driver);
                self.fail(PreviewError::Resource(err));
                return;
            }
        };
        driver.upload_vertices(buffer, &QUAD_VERTICES);
        driver.configure_vertex_array(vertex_array, buffer, position, 2);

        let time = driver.uniform_location(program, TIME_UNIFORM);
        let resolution = driver.uniform_location(program, RESOLUTION_UNIFORM);
        let pointer = driver.uniform_location(program, POINTER_UNIFORM);
        debug!(
            time = time.is_some(),
            resolution = resolution.is_some(),
            pointer = pointer.is_some(),
            "resolved preview uniforms"
        );

        surface.program = Some(LiveProgram {
            build,
            buffer,
            vertex_array,
            time,
            resolution,
            pointer,
        });
        surface.frame_clock.start(now);
        surface.applied_viewport = None;
        surface.placeholder_drawn = false;

        info!("preview shader is live");
        self.log.info("shader compiled and linked");
        self.transition(PreviewState::Live);
    }

    fn fail(&mut self, err: PreviewError) {
        let log = match err.diagnostic() {
            Some(log) => log.to_string(),
            None => err.to_string(),
        };
        self.cancel_scheduled();
        if let Some(surface) = self.surface.as_mut() {
            surface.release_program();
            surface.placeholder_drawn = false;
        }

        warn!(error = %err, "preview compilation failed");
        self.log.error(err.to_string());
        self.transition(PreviewState::Failed(log));
    }

    fn render(&mut self) -> FrameOutcome {
        let now = self.clock.now();
        let Some(surface) = self.surface.as_mut() else {
            return FrameOutcome::Skipped;
        };

        match &self.state {
            PreviewState::Live => {
                let Some(program) = surface.program.as_ref() else {
                    return FrameOutcome::Skipped;
                };
                let driver = &mut surface.driver;
                driver.use_program(Some(program.build.program()));
                driver.bind_vertex_array(Some(program.vertex_array));
                if surface.applied_viewport != Some(surface.size) {
                    let (width, height) = surface.size.viewport();
                    driver.viewport(width, height);
                    surface.applied_viewport = Some(surface.size);
                }
                if let Some(location) = &program.time {
                    driver.set_uniform_f32(location, surface.frame_clock.elapsed(now));
                }
                if let Some(location) = &program.resolution {
                    driver.set_uniform_vec2(location, surface.size.as_uniform());
                }
                driver.draw_triangles(QUAD_VERTEX_COUNT);
                self.frames_drawn += 1;
                FrameOutcome::Drawn
            }
            PreviewState::Failed(_) if !surface.placeholder_drawn => {
                let (width, height) = surface.size.viewport();
                surface.driver.viewport(width, height);
                surface.driver.clear(PLACEHOLDER_COLOR);
                surface.placeholder_drawn = true;
                FrameOutcome::Cleared
            }
            _ => FrameOutcome::Skipped,
        }
    }

    /// Requests a frame if the current state needs one and none is pending.
    fn ensure_frame_scheduled(&mut self) {
        if self.scheduled.is_some() {
            return;
        }
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let wanted = surface.recompile
            || surface.build.is_some()
            || self.state.is_live()
            || (matches!(self.state, PreviewState::Failed(_)) && !surface.placeholder_drawn);
        if !wanted {
            return;
        }

        let token = CancellationToken::new();
        let id = self.scheduler.request_frame(token.clone());
        self.scheduled = Some(ScheduledFrame { id, token });
    }

    fn cancel_scheduled(&mut self) {
        if let Some(frame) = self.scheduled.take() {
            frame.token.cancel();
            self.scheduler.cancel_frame(frame.id);
        }
    }

    fn transition(&mut self, next: PreviewState) {
        if self.state == next {
            return;
        }
        debug!(from = self.state.label(), to = next.label(), "preview state changed");
        self.log
            .info(format!("state: {} -> {}", self.state.label(), next.label()));
        self.state = next;
    }
}

impl<D, S, C> Drop for PreviewController<D, S, C>
where
    D: GraphicsDriver,
    S: FrameScheduler,
    C: Clock,
{
    fn drop(&mut self) {
        self.deactivate();
    }
}
