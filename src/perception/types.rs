use serde::{Deserialize, Serialize};

/// Captured window pixels.
pub type Frame = image::RgbaImage;

/// Raw object-detector box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

/// Detector output reduced to what the captcha drag needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub center_x: i32,
    pub center_y: i32,
    pub width: i32,
    pub confidence: f32,
    pub class_id: usize,
}

impl From<DetectionBox> for Detection {
    fn from(b: DetectionBox) -> Self {
        Self {
            center_x: ((b.x1 + b.x2) / 2.0).floor() as i32,
            center_y: ((b.y1 + b.y2) / 2.0).floor() as i32,
            width: (b.x2 - b.x1) as i32,
            confidence: b.confidence,
            class_id: b.class_id,
        }
    }
}

/// Keep boxes scoring strictly above `min_confidence`, in detector order.
pub fn confident_detections(boxes: &[DetectionBox], min_confidence: f32) -> Vec<Detection> {
    boxes
        .iter()
        .filter(|b| b.confidence > min_confidence)
        .map(|b| Detection::from(*b))
        .collect()
}
