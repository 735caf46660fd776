use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Minimum-interval guard for one repeatable action.
///
/// The lock is held for the whole action, so concurrent callers on the same
/// guard serialise and the interval holds across them.
#[derive(Debug)]
pub struct Debounce {
    interval: Duration,
    last_fired: Mutex<Option<Instant>>,
}

impl Debounce {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_fired: Mutex::new(None) }
    }

    fn elapsed_enough(&self, last: Option<Instant>, now: Instant) -> bool {
        last.map_or(true, |t| now.saturating_duration_since(t) >= self.interval)
    }

    /// Run `action` if the interval has passed; the fire time is recorded only
    /// when `action` reports completion. Returns whether it completed.
    pub fn run<F: FnOnce() -> bool>(&self, action: F) -> bool {
        let mut last = self.last_fired.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if !self.elapsed_enough(*last, now) {
            return false;
        }
        let completed = action();
        if completed {
            *last = Some(now);
        }
        completed
    }

    pub fn last_fired(&self) -> Option<Instant> {
        *self.last_fired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
