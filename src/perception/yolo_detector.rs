/// ONNX YOLO inference for captcha target detection.
///
/// Loads an exported YOLO model and returns boxes in frame pixel coordinates.
/// Falls back gracefully if the model file is missing.
use crate::config::{DetectorConfig, YoloLayout};
use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::ObjectDetector;
use crate::perception::types::{DetectionBox, Frame};

use ndarray::{Array4, ArrayViewD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Letterbox geometry needed to map model space back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    pad_x: f32,
    pad_y: f32,
    scale: f32,
    orig_w: u32,
    orig_h: u32,
}

/// Holds the ONNX Runtime session and inference configuration.
pub struct YoloDetector {
    session: Session,
    input_size: u32,
    /// Proposals below this never leave the detector; callers filter further.
    min_confidence: f32,
    iou_threshold: f32,
    layout: YoloLayout,
}

impl YoloDetector {
    /// Try to construct a detector.  Returns `None` if the model file does not exist.
    pub fn try_new(config: &DetectorConfig) -> Option<Self> {
        if !Path::new(&config.model_path).exists() {
            tracing::warn!(path = %config.model_path, "YOLO model not found; captcha solving disabled");
            return None;
        }
        match Self::build(config) {
            Ok(det) => {
                tracing::info!(path = %config.model_path, layout = ?config.layout, "YOLO detector loaded");
                Some(det)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load YOLO model");
                None
            }
        }
    }

    fn build(config: &DetectorConfig) -> PilotResult<Self> {
        let session = Session::builder()
            .map_err(|e| PilotError::Perception(format!("ort session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PilotError::Perception(format!("ort opt-level: {e}")))?
            .commit_from_file(&config.model_path)
            .map_err(|e| PilotError::Perception(format!("ort load model: {e}")))?;

        Ok(Self {
            session,
            input_size: config.input_size,
            min_confidence: 0.25,
            iou_threshold: config.iou_threshold,
            layout: config.layout,
        })
    }

    // ── Pre-processing ──────────────────────────────────────────────────────

    /// Resize + letterbox + normalise → NCHW f32 tensor.
    fn preprocess(&self, frame: &Frame) -> (Array4<f32>, Letterbox) {
        let sz = self.input_size;
        let (ow, oh) = (frame.width() as f32, frame.height() as f32);
        let scale = (sz as f32 / ow).min(sz as f32 / oh);
        let nw = ((ow * scale).round() as u32).clamp(1, sz);
        let nh = ((oh * scale).round() as u32).clamp(1, sz);
        let pad_x = (sz - nw) as f32 / 2.0;
        let pad_y = (sz - nh) as f32 / 2.0;

        let rgb = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
        let resized = image::imageops::resize(&rgb, nw, nh, image::imageops::FilterType::CatmullRom);

        // Grey‐fill canvas
        let mut canvas = image::RgbImage::from_pixel(sz, sz, image::Rgb([114, 114, 114]));
        image::imageops::overlay(&mut canvas, &resized, pad_x.round() as i64, pad_y.round() as i64);

        // HWC → NCHW normalised [0, 1]
        let mut tensor = Array4::<f32>::zeros((1, 3, sz as usize, sz as usize));
        for (x, y, p) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = p[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = p[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = p[2] as f32 / 255.0;
        }

        let geometry = Letterbox { pad_x, pad_y, scale, orig_w: frame.width(), orig_h: frame.height() };
        (tensor, geometry)
    }
}

impl ObjectDetector for YoloDetector {
    fn infer(&mut self, frame: &Frame) -> PilotResult<Vec<DetectionBox>> {
        let (input_tensor, geometry) = self.preprocess(frame);

        let input_value = Tensor::from_array(input_tensor)
            .map_err(|e| PilotError::Perception(format!("ort tensor: {e}")))?;

        let output_owned = {
            let outputs = self
                .session
                .run(ort::inputs![input_value])
                .map_err(|e| PilotError::Perception(format!("ort run: {e}")))?;

            outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| PilotError::Perception(format!("extract tensor: {e}")))?
                .to_owned()
        };

        let raw = decode(&output_owned.view(), self.layout, self.min_confidence, geometry)?;
        let kept = nms(&raw, self.iou_threshold);
        Ok(kept.into_iter().map(|i| raw[i]).collect())
    }
}

// ── Post-processing ─────────────────────────────────────────────────────────

/// Decode raw proposals into frame-space boxes above `min_confidence`.
fn decode(
    output: &ArrayViewD<f32>,
    layout: YoloLayout,
    min_confidence: f32,
    lb: Letterbox,
) -> PilotResult<Vec<DetectionBox>> {
    let shape = output.shape();
    if shape.len() < 3 {
        return Err(PilotError::Perception(format!("unexpected output shape: {:?}", shape)));
    }

    // Uniform accessor over both layouts: (proposal, attribute) → value.
    let (num_preds, num_attrs) = match layout {
        YoloLayout::V5 => (shape[1], shape[2]),
        YoloLayout::V8 => (shape[2], shape[1]),
    };
    let at = |i: usize, a: usize| match layout {
        YoloLayout::V5 => output[[0, i, a]],
        YoloLayout::V8 => output[[0, a, i]],
    };
    let class_start = match layout {
        YoloLayout::V5 => 5,
        YoloLayout::V8 => 4,
    };
    if num_attrs <= class_start {
        return Err(PilotError::Perception(format!(
            "output has {num_attrs} attributes, expected more than {class_start}"
        )));
    }

    let mut detections = Vec::new();
    for i in 0..num_preds {
        let objectness = match layout {
            YoloLayout::V5 => at(i, 4),
            YoloLayout::V8 => 1.0,
        };

        // Best class
        let mut max_score = 0.0f32;
        let mut max_class = 0usize;
        for c in class_start..num_attrs {
            let s = at(i, c);
            if s > max_score {
                max_score = s;
                max_class = c - class_start;
            }
        }
        let confidence = objectness * max_score;
        if confidence < min_confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));

        // Undo letterbox → original pixel space
        let unmap_x = |v: f32| ((v - lb.pad_x) / lb.scale).clamp(0.0, lb.orig_w as f32);
        let unmap_y = |v: f32| ((v - lb.pad_y) / lb.scale).clamp(0.0, lb.orig_h as f32);

        detections.push(DetectionBox {
            x1: unmap_x(cx - w / 2.0),
            y1: unmap_y(cy - h / 2.0),
            x2: unmap_x(cx + w / 2.0),
            y2: unmap_y(cy + h / 2.0),
            confidence,
            class_id: max_class,
        });
    }
    Ok(detections)
}

/// Greedy per-class NMS; survivors ordered by descending confidence.
fn nms(dets: &[DetectionBox], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..dets.len()).collect();
    indices.sort_by(|&a, &b| {
        dets[b]
            .confidence
            .partial_cmp(&dets[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for &i in &indices {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &indices {
            if suppressed[j] || i == j {
                continue;
            }
            if dets[i].class_id == dets[j].class_id && iou(&dets[i], &dets[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ── Utilities ────────────────────────────────────────────────────────────────

fn iou(a: &DetectionBox, b: &DetectionBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
