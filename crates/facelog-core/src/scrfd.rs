//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three strides, followed by greedy NMS. Input
//! frames are grayscale; the letterboxed tensor replicates the single channel
//! into RGB.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: u32 = 640;
const MEAN: f32 = 127.5;
const STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU: f32 = 0.4;
const STRIDES: [u32; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download det_10g.onnx from insightface into the model directory")]
    ModelNotFound(String),
    #[error("model has {0} outputs; SCRFD needs 9 (score/bbox/kps for 3 strides)")]
    UnexpectedOutputs(usize),
    #[error("frame buffer too short for {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Position of each stride's score/bbox/kps tensors in the model outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputLayout {
    score: [usize; 3],
    bbox: [usize; 3],
    kps: [usize; 3],
}

impl OutputLayout {
    /// Standard export order: scores 8/16/32, then bboxes, then keypoints.
    const POSITIONAL: OutputLayout = OutputLayout {
        score: [0, 1, 2],
        bbox: [3, 4, 5],
        kps: [6, 7, 8],
    };

    /// Resolve tensors named `score_8`, `bbox_16`, ... ; exports with numeric
    /// names use the positional order.
    fn from_names(names: &[String]) -> Self {
        let find = |kind: &str| -> Option<[usize; 3]> {
            let mut slots = [0usize; 3];
            for (slot, stride) in slots.iter_mut().zip(STRIDES) {
                let wanted = format!("{kind}_{stride}");
                *slot = names.iter().position(|n| *n == wanted)?;
            }
            Some(slots)
        };

        match (find("score"), find("bbox"), find("kps")) {
            (Some(score), Some(bbox), Some(kps)) => OutputLayout { score, bbox, kps },
            _ => Self::POSITIONAL,
        }
    }
}

/// Scale and padding applied when fitting a frame into the square input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32) -> (Self, u32, u32) {
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let lb = Letterbox {
            scale,
            pad_x: ((INPUT_SIZE - new_w) / 2) as f32,
            pad_y: ((INPUT_SIZE - new_h) / 2) as f32,
        };
        (lb, new_w, new_h)
    }

    /// Map a point from network input space back to the original frame.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    layout: OutputLayout,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 9 {
            return Err(DetectorError::UnexpectedOutputs(names.len()));
        }
        let layout = OutputLayout::from_names(&names);

        tracing::info!(
            path = %model_path.display(),
            outputs = ?names,
            ?layout,
            "loaded SCRFD model"
        );

        Ok(Self { session, layout })
    }

    /// Detect faces in a grayscale frame, most confident first.
    pub fn detect(&mut self, frame: &[u8], width: u32, height: u32) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = preprocess(frame, width, height)?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, stride) in STRIDES.into_iter().enumerate() {
            let tensor = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let scores = tensor(self.layout.score[slot], "scores")?;
            let bboxes = tensor(self.layout.bbox[slot], "bboxes")?;
            let kps = tensor(self.layout.kps[slot], "kps")?;

            decode_stride(scores, bboxes, kps, stride, &letterbox, &mut candidates);
        }

        Ok(nms(candidates, NMS_IOU))
    }
}

/// Letterbox a grayscale frame into a normalized 1×3×640×640 tensor.
fn preprocess(frame: &[u8], width: u32, height: u32) -> Result<(Array4<f32>, Letterbox), DetectorError> {
    let pixels = (width as usize) * (height as usize);
    let image = frame
        .get(..pixels)
        .and_then(|buf| GrayImage::from_raw(width, height, buf.to_vec()))
        .filter(|_| width > 0 && height > 0)
        .ok_or(DetectorError::InvalidFrame { width, height })?;

    let (letterbox, new_w, new_h) = Letterbox::fit(width, height);
    let resized = imageops::resize(&image, new_w, new_h, FilterType::Triangle);

    let (ox, oy) = (letterbox.pad_x as u32, letterbox.pad_y as u32);
    let side = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, 3, side, side), |(_, _, y, x)| {
        let (x, y) = (x as u32, y as u32);
        // Padding uses the mean so it normalizes to zero.
        let value = if x >= ox && y >= oy && x < ox + new_w && y < oy + new_h {
            resized.get_pixel(x - ox, y - oy).0[0] as f32
        } else {
            MEAN
        };
        (value - MEAN) / STD
    });

    Ok((tensor, letterbox))
}

/// Decode the anchors of one stride whose score clears the threshold.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: u32,
    letterbox: &Letterbox,
    out: &mut Vec<BoundingBox>,
) {
    let grid_w = (INPUT_SIZE / stride) as usize;
    let grid_h = grid_w;
    let step = stride as f32;

    for idx in 0..grid_w * grid_h * ANCHORS_PER_CELL {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= SCORE_THRESHOLD {
            continue;
        }
        let Some(b) = bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / ANCHORS_PER_CELL;
        let cx = (cell % grid_w) as f32 * step;
        let cy = (cell / grid_w) as f32 * step;

        let (x1, y1) = letterbox.unmap(cx - b[0] * step, cy - b[1] * step);
        let (x2, y2) = letterbox.unmap(cx + b[2] * step, cy + b[3] * step);

        let landmarks = kps.get(idx * 10..idx * 10 + 10).map(|k| {
            std::array::from_fn(|i| letterbox.unmap(cx + k[i * 2] * step, cy + k[i * 2 + 1] * step))
        });

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Greedy non-maximum suppression; returns survivors sorted by confidence.
fn nms(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for cand in candidates {
        if kept.iter().all(|k| k.iou(&cand) <= iou_threshold) {
            kept.push(cand);
        }
    }
    kept
}
