//! Live GLSL preview core for shaderlab.
//!
//! The crate compiles untrusted fragment-shader text at runtime, links it
//! against a fixed full-screen-quad vertex stage and keeps a per-frame render
//! loop running while the text and the surface's visibility change under it.
//! The overall flow is:
//!
//! ```text
//!   translated text ─▶ format::normalize ─▶ PendingBuild (compile + link)
//!                                               │
//!                     FrameScheduler ◀── PreviewController ──▶ GraphicsDriver
//!                          │   ▲                  │
//!                          └───┴── on_frame ──────┘
//! ```
//!
//! [`PreviewController`] owns the state machine and every driver resource;
//! hosts only supply a [`Drawable`], a [`FrameScheduler`] and a [`Clock`].
//! With the `window` feature, [`window::run_window`] provides a winit/glutin
//! host backed by [`GlowDriver`].

pub mod compile;
pub mod controller;
pub mod driver;
pub mod error;
pub mod format;
pub mod log;
pub mod runtime;
pub mod schedule;
pub mod types;
#[cfg(feature = "window")]
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use compile::{build_program, compile_stage, link_program, CompiledShader, LinkedProgram, ProgramBuild};
pub use controller::{Drawable, FrameOutcome, PreviewController};
pub use driver::{GlowDriver, GraphicsDriver};
pub use error::PreviewError;
pub use format::{normalize, normalize_with, ShaderDialect};
pub use log::{ActivityLog, LogEntry, Severity};
pub use runtime::{Clock, FrameClock, ManualClock, SystemClock};
pub use schedule::{CancellationToken, FrameRequestId, FrameScheduler};
pub use types::{PreviewState, ShaderLanguage, ShaderSourceText, ShaderStage, SurfaceSize};
