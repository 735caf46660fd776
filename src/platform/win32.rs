/// Win32 backend: `FindWindowW` lookup and `SendMessageW` pointer messages,
/// which reach the target window whether or not it has focus.
use std::ffi::c_void;

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetWindowRect, GetWindowTextW, IsWindow, IsWindowVisible,
    MoveWindow, SendMessageW, SetForegroundWindow, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
};

use crate::errors::{PilotError, PilotResult};
use crate::platform::{make_lparam, PointerEvent, Rect, WindowHandle, WindowSystem};

/// `MK_LBUTTON` modifier flag carried in `wParam` while the button is held.
const MK_LBUTTON: usize = 0x0001;

pub struct Win32WindowSystem;

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn ensure_alive(handle: WindowHandle) -> PilotResult<HWND> {
    let h = hwnd(handle);
    if unsafe { IsWindow(h) }.as_bool() {
        Ok(h)
    } else {
        Err(PilotError::WindowGone(handle))
    }
}

impl WindowSystem for Win32WindowSystem {
    fn locate(&self, title: &str) -> PilotResult<WindowHandle> {
        let wide = HSTRING::from(title);
        match unsafe { FindWindowW(PCWSTR::null(), &wide) } {
            Ok(h) if !h.0.is_null() => Ok(WindowHandle(h.0 as isize)),
            _ => Err(PilotError::WindowNotFound(title.to_string())),
        }
    }

    fn rect_of(&self, handle: WindowHandle) -> PilotResult<Rect> {
        let h = ensure_alive(handle)?;
        let mut rect = RECT::default();
        unsafe { GetWindowRect(h, &mut rect) }.map_err(|_| PilotError::WindowGone(handle))?;
        Ok(Rect::from_corners(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn move_and_resize(&self, handle: WindowHandle, x: i32, y: i32, w: i32, h: i32) -> PilotResult<()> {
        let target = ensure_alive(handle)?;
        unsafe { MoveWindow(target, x, y, w, h, true) }
            .map_err(|e| PilotError::Platform(format!("MoveWindow: {e}")))
    }

    fn bring_to_foreground(&self, handle: WindowHandle) -> PilotResult<()> {
        let target = ensure_alive(handle)?;
        if unsafe { SetForegroundWindow(target) }.as_bool() {
            Ok(())
        } else {
            Err(PilotError::Platform(format!("SetForegroundWindow refused for {handle}")))
        }
    }

    fn send_pointer(&self, handle: WindowHandle, event: PointerEvent) -> PilotResult<()> {
        let target = hwnd(handle);
        let (msg, flags) = match event {
            PointerEvent::Down { .. } => (WM_LBUTTONDOWN, MK_LBUTTON),
            PointerEvent::Move { .. } => (WM_MOUSEMOVE, MK_LBUTTON),
            PointerEvent::Up { .. } => (WM_LBUTTONUP, 0),
        };
        let (x, y) = event.position();
        unsafe {
            SendMessageW(target, msg, WPARAM(flags), LPARAM(make_lparam(x, y)));
        }
        Ok(())
    }

    fn list_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        let ptr = &mut titles as *mut Vec<String>;
        if let Err(e) = unsafe { EnumWindows(Some(collect_title), LPARAM(ptr as isize)) } {
            tracing::warn!(error = %e, "EnumWindows failed");
        }
        titles
    }
}

unsafe extern "system" fn collect_title(h: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the `&mut Vec<String>` handed to EnumWindows above,
    // which outlives the enumeration.
    let titles = &mut *(lparam.0 as *mut Vec<String>);
    if IsWindowVisible(h).as_bool() {
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(h, &mut buf);
        if len > 0 {
            titles.push(String::from_utf16_lossy(&buf[..len as usize]));
        }
    }
    BOOL(1)
}
