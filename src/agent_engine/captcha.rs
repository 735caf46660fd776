/// Horizontal slider-puzzle solver.
///
/// Fuses the object detector's target box with the template-matched drag
/// anchor, corrects the distance for systematic drag error, and replays one
/// eased drag. There is no retry here; the agent loop re-detects next pass.
use std::path::PathBuf;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::config::{AppConfig, Point};
use crate::errors::{PilotError, PilotResult};
use crate::executor::input::InputDispatcher;
use crate::perception::matcher::find_start_point;
use crate::perception::templates::TemplateKind;
use crate::perception::traits::SharedDetector;
use crate::perception::types::{confident_detections, Detection, Frame};
use crate::platform::WindowHandle;

/// Correction added to the target x, by drag distance in pixels.
pub fn drag_offset(distance: i32) -> i32 {
    match distance {
        d if d < 30 => -1,
        56..=79 => 5,
        80..=94 => 6,
        95..=104 => 7,
        d if d >= 105 => 8,
        _ => 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragPlan {
    pub target: Detection,
    pub start: Point,
    pub end: Point,
    pub distance: i32,
    pub offset: i32,
}

pub struct CaptchaSolver {
    detector: Option<SharedDetector>,
    anchors: PathBuf,
    target_confidence: f32,
    anchor_threshold: f32,
    nominal: Duration,
    settle: Duration,
}

impl CaptchaSolver {
    pub fn new(config: &AppConfig, detector: Option<SharedDetector>) -> Self {
        Self {
            detector,
            anchors: config.assets.folder(TemplateKind::StartPoint),
            target_confidence: config.detector.target_confidence,
            anchor_threshold: config.matching.anchor_threshold,
            nominal: Duration::from_millis(config.timing.drag_nominal_ms),
            settle: Duration::from_millis(config.timing.captcha_settle_ms),
        }
    }

    /// Compute the drag for `frame` without dispatching anything.
    pub fn plan(&self, frame: &Frame) -> PilotResult<DragPlan> {
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| PilotError::Perception("object detector unavailable".into()))?;

        let boxes = detector.lock().unwrap_or_else(PoisonError::into_inner).infer(frame)?;
        let target = confident_detections(&boxes, self.target_confidence)
            .into_iter()
            .next()
            .ok_or(PilotError::NoCaptchaTarget)?;

        let (start_x, start_y) =
            find_start_point(frame, &self.anchors, self.anchor_threshold)?.ok_or(PilotError::NoStartPoint)?;

        let distance = target.center_x - start_x;
        let offset = drag_offset(distance);
        Ok(DragPlan {
            target,
            start: Point::new(start_x, start_y),
            end: Point::new(target.center_x + offset, start_y),
            distance,
            offset,
        })
    }

    /// Plan against a freshly sampled `frame`, drag, then wait for the UI to settle.
    pub fn solve(&self, frame: &Frame, input: &InputDispatcher, handle: WindowHandle) -> PilotResult<DragPlan> {
        let plan = self.plan(frame)?;
        tracing::debug!(
            center_x = plan.target.center_x,
            center_y = plan.target.center_y,
            width = plan.target.width,
            start = ?plan.start,
            end = ?plan.end,
            distance = plan.distance,
            offset = plan.offset,
            "captcha drag planned"
        );
        input.drag(handle, plan.start, plan.end, self.nominal);
        thread::sleep(self.settle);
        Ok(plan)
    }
}
