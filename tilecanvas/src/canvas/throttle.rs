//! Render request debouncing.
//!
//! Any number of render requests made while one is pending collapse into a
//! single render cycle, `buffer` after the first request.

use std::time::{Duration, Instant};

/// Default delay between a render request and the render cycle.
pub const DEFAULT_RENDER_BUFFER: Duration = Duration::from_millis(250);

/// Short delay for hosts that want near-immediate rendering.
pub const FAST_RENDER_BUFFER: Duration = Duration::from_millis(15);

/// Single-slot deadline timer polled by the owning thread.
#[derive(Debug, Clone, Default)]
pub struct RenderThrottle {
    deadline: Option<Instant>,
}

impl RenderThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a render `buffer` from `now` unless one is already pending.
    ///
    /// Returns true if a new render was scheduled.
    pub fn request(&mut self, now: Instant, buffer: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + buffer);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending render if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending render, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
