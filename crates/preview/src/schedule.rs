//! Host-side frame scheduling primitives.
//!
//! The controller never runs its own loop. It asks the host for "one callback
//! at the next frame" and hands over a [`CancellationToken`] with each request.
//! Hosts must drop callbacks whose token has been cancelled; the controller
//! additionally ignores ids it no longer owns.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier returned by [`FrameScheduler::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Shared flag that marks a scheduled callback as revoked.
///
/// Cancelling is synchronous: once [`CancellationToken::cancel`] returns,
/// every clone observes `is_cancelled() == true`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Per-frame callback primitive provided by the host.
pub trait FrameScheduler {
    /// Requests one callback at the next frame boundary.
    fn request_frame(&mut self, token: CancellationToken) -> FrameRequestId;

    /// Revokes a previously requested callback. Unknown ids are ignored.
    fn cancel_frame(&mut self, id: FrameRequestId);
}
