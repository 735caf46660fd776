use crate::errors::{PilotError, PilotResult};
use crate::platform::{PointerEvent, Rect, WindowHandle, WindowSystem};

/// Window system for hosts without a backend: no windows exist.
pub struct StubWindowSystem;

impl WindowSystem for StubWindowSystem {
    fn locate(&self, title: &str) -> PilotResult<WindowHandle> {
        Err(PilotError::WindowNotFound(title.to_string()))
    }

    fn rect_of(&self, handle: WindowHandle) -> PilotResult<Rect> {
        Err(PilotError::WindowGone(handle))
    }

    fn move_and_resize(&self, handle: WindowHandle, _x: i32, _y: i32, _w: i32, _h: i32) -> PilotResult<()> {
        Err(PilotError::WindowGone(handle))
    }

    fn bring_to_foreground(&self, handle: WindowHandle) -> PilotResult<()> {
        Err(PilotError::WindowGone(handle))
    }

    fn send_pointer(&self, handle: WindowHandle, event: PointerEvent) -> PilotResult<()> {
        tracing::debug!(%handle, ?event, "stub: pointer event dropped");
        Err(PilotError::WindowGone(handle))
    }

    fn list_titles(&self) -> Vec<String> {
        Vec::new()
    }
}
