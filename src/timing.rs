//! Time gates for camera notifications, driven by the frame loop.
//!
//! Both gates take `now` explicitly so the caller owns the clock.

use std::time::{Duration, Instant};

/// Lets at most one event through per interval. Events dropped inside the
/// window leave a trailing edge so the latest state is still delivered.
#[derive(Clone, Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
    trailing: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            trailing: false,
        }
    }

    /// Offer an event; true if it passes now
    pub fn offer(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.trailing = true;
                false
            }
            _ => {
                self.last = Some(now);
                self.trailing = false;
                true
            }
        }
    }

    /// True once the window has closed on a dropped event
    pub fn poll_trailing(&mut self, now: Instant) -> bool {
        if !self.trailing {
            return false;
        }
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                self.trailing = false;
                true
            }
        }
    }
}

/// Fires once after `delay` has passed without a new touch
#[derive(Clone, Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// Restart the quiet period
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per quiet period, when it expires
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
