use std::sync::{Arc, Mutex};

use crate::errors::PilotResult;
use crate::perception::types::{DetectionBox, Frame};
use crate::platform::{Rect, WindowHandle};

/// Grabs the current pixels of a window. `rect` is its screen rectangle,
/// used when the window cannot be captured on its own.
pub trait FrameSource: Send + Sync {
    fn grab(&self, handle: WindowHandle, rect: Rect) -> PilotResult<Frame>;
}

/// Black-box object detector: boxes in frame pixel coordinates.
pub trait ObjectDetector: Send {
    fn infer(&mut self, frame: &Frame) -> PilotResult<Vec<DetectionBox>>;
}

/// One detector shared by every agent. Inference is serialised, so concurrent
/// captcha attempts on different windows queue behind each other.
pub type SharedDetector = Arc<Mutex<dyn ObjectDetector>>;
