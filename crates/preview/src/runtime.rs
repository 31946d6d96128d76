use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Abstraction over where the controller reads the current time from.
pub trait Clock {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle and
/// give the other to a controller.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Creates a manual clock frozen at `Instant::now()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Elapsed-time source for the `time` uniform.
///
/// Started when a program goes live and restarted on every new live program,
/// so each compiled shader begins its animation at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    start: Option<Instant>,
}

impl FrameClock {
    /// Starts (or restarts) the clock at `now`.
    pub fn start(&mut self, now: Instant) {
        self.start = Some(now);
    }

    /// Stops the clock; [`FrameClock::elapsed`] reports zero until restarted.
    pub fn stop(&mut self) {
        self.start = None;
    }

    pub fn is_running(&self) -> bool {
        self.start.is_some()
    }

    /// Seconds between the start instant and `now`.
    pub fn elapsed(&self, now: Instant) -> f32 {
        match self.start {
            Some(start) => now.saturating_duration_since(start).as_secs_f32(),
            None => 0.0,
        }
    }
}
