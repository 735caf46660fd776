/// Window-system seam: locating windows by title, geometry, and pointer
/// messages addressed to a window handle rather than the real cursor.
pub mod stub;

#[cfg(target_os = "windows")]
pub mod win32;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::PilotResult;

/// Opaque OS window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Screen rectangle of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Build from the corner form the OS reports.
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            top,
            left,
            width: (right - left).max(0) as u32,
            height: (bottom - top).max(0) as u32,
        }
    }
}

/// Synthetic left-button pointer event in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up { x: i32, y: i32 },
}

impl PointerEvent {
    pub fn position(&self) -> (i32, i32) {
        match *self {
            PointerEvent::Down { x, y } | PointerEvent::Move { x, y } | PointerEvent::Up { x, y } => {
                (x, y)
            }
        }
    }
}

/// Operations the agents need from the host window system.
pub trait WindowSystem: Send + Sync {
    /// Resolve an exact window title; fails with `WindowNotFound`.
    fn locate(&self, title: &str) -> PilotResult<WindowHandle>;

    /// Current screen rectangle; fails with `WindowGone` for a dead handle.
    fn rect_of(&self, handle: WindowHandle) -> PilotResult<Rect>;

    fn move_and_resize(&self, handle: WindowHandle, x: i32, y: i32, w: i32, h: i32) -> PilotResult<()>;

    fn bring_to_foreground(&self, handle: WindowHandle) -> PilotResult<()>;

    /// Deliver one pointer event to `handle` without moving the real cursor.
    fn send_pointer(&self, handle: WindowHandle, event: PointerEvent) -> PilotResult<()>;

    /// Titles of visible top-level windows.
    fn list_titles(&self) -> Vec<String>;
}

/// Grid cell origin for fleet member `index`.
pub fn tile_position(index: usize, cols: u32, cell_w: i32, cell_h: i32) -> (i32, i32) {
    let cols = cols.max(1) as usize;
    let row = (index / cols) as i32;
    let col = (index % cols) as i32;
    (col * cell_w, row * cell_h)
}

/// Pack client coordinates the way mouse messages expect them (x low word, y high word).
pub fn make_lparam(x: i32, y: i32) -> isize {
    (((y as u32 & 0xFFFF) << 16) | (x as u32 & 0xFFFF)) as i32 as isize
}

/// Window system for the current OS.
pub fn create_window_system() -> Arc<dyn WindowSystem> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(win32::Win32WindowSystem)
    }
    #[cfg(not(target_os = "windows"))]
    {
        tracing::warn!("no window backend for this OS; using stub window system");
        Arc::new(stub::StubWindowSystem)
    }
}
