/// Synthetic pointer input addressed to a window handle.
///
/// Clicks never touch the real cursor or focus. Drags bring the window to the
/// foreground first, then replay eased pointer moves. Dispatch failures are
/// logged, never returned.
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{Point, TimingConfig};
use crate::platform::{PointerEvent, WindowHandle, WindowSystem};

/// Drag pacing, derived from `[timing]`.
#[derive(Debug, Clone, Copy)]
pub struct DragTiming {
    pub steps: u32,
    pub cap: Duration,
    pub pixels_per_sec: f64,
    pub foreground_settle: Duration,
    pub release_settle: Duration,
}

impl From<&TimingConfig> for DragTiming {
    fn from(t: &TimingConfig) -> Self {
        Self {
            steps: t.drag_steps.max(1),
            cap: Duration::from_millis(t.drag_cap_ms),
            pixels_per_sec: t.drag_pixels_per_sec,
            foreground_settle: Duration::from_millis(t.foreground_settle_ms),
            release_settle: Duration::from_millis(t.release_settle_ms),
        }
    }
}

/// Ease-out quadratic: fast start, decelerating finish.
pub fn ease_out_quad(t: f64) -> f64 {
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Longer drags get proportionally more time, up to `cap`.
pub fn adjusted_duration(nominal: Duration, distance: u32, pixels_per_sec: f64, cap: Duration) -> Duration {
    let by_distance = if pixels_per_sec > 0.0 {
        Duration::from_secs_f64(distance as f64 / pixels_per_sec)
    } else {
        Duration::ZERO
    };
    nominal.max(by_distance).min(cap)
}

/// Horizontal positions of the pointer moves, endpoints included.
pub fn drag_path(x0: i32, x1: i32, steps: u32) -> Vec<i32> {
    let total = (x1 - x0) as f64;
    (0..=steps)
        .map(|i| {
            let progress = i as f64 / steps as f64;
            (x0 as f64 + total * ease_out_quad(progress)) as i32
        })
        .collect()
}

#[derive(Clone)]
pub struct InputDispatcher {
    windows: Arc<dyn WindowSystem>,
    timing: DragTiming,
}

impl InputDispatcher {
    pub fn new(windows: Arc<dyn WindowSystem>, timing: DragTiming) -> Self {
        Self { windows, timing }
    }

    fn send(&self, handle: WindowHandle, event: PointerEvent) {
        if let Err(e) = self.windows.send_pointer(handle, event) {
            tracing::warn!(%handle, ?event, error = %e, "pointer dispatch failed");
        }
    }

    /// Pointer down then up at client coordinates.
    pub fn click(&self, handle: WindowHandle, at: Point) {
        self.send(handle, PointerEvent::Down { x: at.x, y: at.y });
        self.send(handle, PointerEvent::Up { x: at.x, y: at.y });
    }

    /// Horizontal eased drag from `from` to `to`; y is held at `from.y` while moving.
    pub fn drag(&self, handle: WindowHandle, from: Point, to: Point, nominal: Duration) {
        let distance = (to.x - from.x).unsigned_abs();
        let duration = adjusted_duration(nominal, distance, self.timing.pixels_per_sec, self.timing.cap);
        let step_pause = duration / self.timing.steps;

        if let Err(e) = self.windows.bring_to_foreground(handle) {
            tracing::debug!(%handle, error = %e, "foreground request failed; dragging anyway");
        }
        thread::sleep(self.timing.foreground_settle);

        self.send(handle, PointerEvent::Down { x: from.x, y: from.y });
        for x in drag_path(from.x, to.x, self.timing.steps) {
            self.send(handle, PointerEvent::Move { x, y: from.y });
            thread::sleep(step_pause);
        }
        self.send(handle, PointerEvent::Up { x: to.x, y: to.y });

        thread::sleep(self.timing.release_settle);
        tracing::trace!(%handle, ?from, ?to, ?duration, "drag replayed");
    }
}
