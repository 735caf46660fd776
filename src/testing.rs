//! In-memory stand-ins for the window system, screen capture and detector.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::{FrameSource, ObjectDetector, SharedDetector};
use crate::perception::types::{DetectionBox, Frame};
use crate::platform::{PointerEvent, Rect, WindowHandle, WindowSystem};
use crate::agent_engine::device::Services;

#[derive(Default)]
pub struct FakeWindows {
    titles: Mutex<HashMap<String, WindowHandle>>,
    gone: Mutex<HashSet<WindowHandle>>,
    events: Mutex<Vec<(WindowHandle, PointerEvent)>>,
    moves: Mutex<Vec<(WindowHandle, (i32, i32, i32, i32))>>,
    foreground: AtomicUsize,
}

impl FakeWindows {
    pub fn with_titles(titles: &[&str]) -> Self {
        let fake = Self::default();
        {
            let mut map = fake.titles.lock().unwrap();
            for (i, t) in titles.iter().enumerate() {
                map.insert(t.to_string(), WindowHandle(100 + i as isize));
            }
        }
        fake
    }

    pub fn handle(&self, title: &str) -> WindowHandle {
        self.titles.lock().unwrap()[title]
    }

    pub fn close(&self, handle: WindowHandle) {
        self.gone.lock().unwrap().insert(handle);
    }

    pub fn events(&self) -> Vec<PointerEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }

    pub fn events_for(&self, handle: WindowHandle) -> Vec<PointerEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, e)| *e)
            .collect()
    }

    /// Positions of every pointer-down sent to `handle`.
    pub fn clicks_for(&self, handle: WindowHandle) -> Vec<(i32, i32)> {
        self.events_for(handle)
            .into_iter()
            .filter_map(|e| match e {
                PointerEvent::Down { x, y } => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn last_move(&self, handle: WindowHandle) -> Option<(i32, i32, i32, i32)> {
        self.moves
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(h, _)| *h == handle)
            .map(|(_, m)| *m)
    }

    pub fn foreground_requests(&self) -> usize {
        self.foreground.load(Ordering::SeqCst)
    }

    fn check(&self, handle: WindowHandle) -> PilotResult<()> {
        if self.gone.lock().unwrap().contains(&handle) {
            Err(PilotError::WindowGone(handle))
        } else {
            Ok(())
        }
    }
}

impl WindowSystem for FakeWindows {
    fn locate(&self, title: &str) -> PilotResult<WindowHandle> {
        self.titles
            .lock()
            .unwrap()
            .get(title)
            .copied()
            .ok_or_else(|| PilotError::WindowNotFound(title.to_string()))
    }

    fn rect_of(&self, handle: WindowHandle) -> PilotResult<Rect> {
        self.check(handle)?;
        Ok(Rect { top: 0, left: 0, width: 215, height: 515 })
    }

    fn move_and_resize(&self, handle: WindowHandle, x: i32, y: i32, w: i32, h: i32) -> PilotResult<()> {
        self.check(handle)?;
        self.moves.lock().unwrap().push((handle, (x, y, w, h)));
        Ok(())
    }

    fn bring_to_foreground(&self, handle: WindowHandle) -> PilotResult<()> {
        self.check(handle)?;
        self.foreground.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn send_pointer(&self, handle: WindowHandle, event: PointerEvent) -> PilotResult<()> {
        self.events.lock().unwrap().push((handle, event));
        Ok(())
    }

    fn list_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.titles.lock().unwrap().keys().cloned().collect();
        titles.sort();
        titles
    }
}

/// Serves one frame for every grab.
pub struct FakeFrames {
    frame: Mutex<Frame>,
    grabs: AtomicUsize,
    handles: Mutex<Vec<WindowHandle>>,
}

impl FakeFrames {
    pub fn new(frame: Frame) -> Self {
        Self { frame: Mutex::new(frame), grabs: AtomicUsize::new(0), handles: Mutex::new(Vec::new()) }
    }

    pub fn blank() -> Self {
        Self::new(Frame::from_pixel(215, 515, image::Rgba([0, 0, 0, 255])))
    }

    pub fn set(&self, frame: Frame) {
        *self.frame.lock().unwrap() = frame;
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    /// Window handles in grab order.
    pub fn grabbed_handles(&self) -> Vec<WindowHandle> {
        self.handles.lock().unwrap().clone()
    }
}

impl FrameSource for FakeFrames {
    fn grab(&self, handle: WindowHandle, _rect: Rect) -> PilotResult<Frame> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().unwrap().push(handle);
        Ok(self.frame.lock().unwrap().clone())
    }
}

/// Returns the same boxes on every call.
pub struct FakeDetector {
    pub boxes: Vec<DetectionBox>,
    pub calls: usize,
}

impl FakeDetector {
    pub fn shared(boxes: Vec<DetectionBox>) -> SharedDetector {
        Arc::new(Mutex::new(FakeDetector { boxes, calls: 0 }))
    }
}

impl ObjectDetector for FakeDetector {
    fn infer(&mut self, _frame: &Frame) -> PilotResult<Vec<DetectionBox>> {
        self.calls += 1;
        Ok(self.boxes.clone())
    }
}

/// Services over fakes with zeroed delays and an empty asset root.
pub fn services(windows: Arc<FakeWindows>, frames: Arc<FakeFrames>, assets: &std::path::Path) -> Services {
    let mut config = AppConfig::default();
    config.timing = crate::config::TimingConfig::instant();
    config.assets.root = assets.to_path_buf();
    Services {
        windows,
        frames,
        detector: None,
        config: Arc::new(config),
    }
}

/// Asset root with every category folder present and empty.
pub fn empty_assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let assets = crate::config::AssetsConfig { root: dir.path().to_path_buf(), ..Default::default() };
    for kind in crate::perception::templates::TemplateKind::ALL {
        std::fs::create_dir_all(assets.folder(kind)).unwrap();
    }
    dir
}
