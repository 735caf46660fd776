/// Window capture via `xcap`. The window itself is captured so occluded
/// windows still yield their own pixels; when that fails the monitor holding
/// the window rectangle is captured and cropped instead.
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::FrameSource;
use crate::perception::types::Frame;
use crate::platform::{Rect, WindowHandle};

pub struct XcapFrameSource;

impl FrameSource for XcapFrameSource {
    fn grab(&self, handle: WindowHandle, rect: Rect) -> PilotResult<Frame> {
        if rect.width == 0 || rect.height == 0 {
            return Err(PilotError::Perception(format!("empty capture region {rect:?}")));
        }
        match capture_window(handle) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                tracing::debug!(%handle, error = %e, "window capture failed; cropping monitor");
                capture_region(rect)
            }
        }
    }
}

fn capture_window(handle: WindowHandle) -> PilotResult<Frame> {
    let window = xcap::Window::all()
        .map_err(|e| PilotError::Perception(format!("enumerate windows: {e}")))?
        .into_iter()
        .find(|w| is_handle(w.id(), handle))
        .ok_or_else(|| PilotError::Perception(format!("window {handle} not capturable")))?;

    if window.is_minimized() {
        return Err(PilotError::Perception(format!("window {handle} is minimized")));
    }
    window
        .capture_image()
        .map_err(|e| PilotError::Perception(format!("window capture failed: {e}")))
}

fn capture_region(rect: Rect) -> PilotResult<Frame> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| PilotError::Perception(format!("enumerate monitors: {e}")))?;

    let monitor = monitors
        .into_iter()
        .find(|m| contains(m.x(), m.y(), m.width(), m.height(), rect.left, rect.top))
        .ok_or_else(|| {
            PilotError::Perception(format!("no monitor contains ({}, {})", rect.left, rect.top))
        })?;

    let shot = monitor
        .capture_image()
        .map_err(|e| PilotError::Perception(format!("screen capture failed: {e}")))?;

    let (ox, oy) = ((rect.left - monitor.x()) as u32, (rect.top - monitor.y()) as u32);
    crop_clamped(&shot, ox, oy, rect.width, rect.height)
}

/// xcap reports native window ids as `u32`; on Windows that is the HWND value.
fn is_handle(id: u32, handle: WindowHandle) -> bool {
    id as isize == handle.0
}

fn contains(mx: i32, my: i32, mw: u32, mh: u32, x: i32, y: i32) -> bool {
    x >= mx && y >= my && x < mx + mw as i32 && y < my + mh as i32
}

/// Crop, clipping the region to the image bounds.
pub fn crop_clamped(src: &Frame, x: u32, y: u32, w: u32, h: u32) -> PilotResult<Frame> {
    let (sw, sh) = src.dimensions();
    if x >= sw || y >= sh {
        return Err(PilotError::Perception(format!(
            "region origin ({x}, {y}) outside {sw}x{sh} capture"
        )));
    }
    let w = w.min(sw - x);
    let h = h.min(sh - y);
    Ok(image::imageops::crop_imm(src, x, y, w, h).to_image())
}
