//! Frame → detections: the recognition capability behind a trait.

use crate::arcface::{FaceRecognizer, RecognizerError};
use crate::scrfd::{DetectorError, FaceDetector};
use crate::types::{BoundingBox, Detection, Embedding};
use crate::{DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Finds faces in a grayscale image and embeds each of them.
pub trait FaceEncoder {
    /// Detections ordered by descending detector confidence.
    fn encode(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, EncodeError>;
}

/// SCRFD detection followed by ArcFace embedding.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, EncodeError> {
        let faces = self.detector.detect(gray, width, height)?;
        let recognizer = &mut self.recognizer;
        Ok(embed_each(faces, |bbox| recognizer.extract(gray, width, height, bbox)))
    }
}

/// Embed every detected face, dropping only the ones that fail.
///
/// Detection order is kept for the survivors.
fn embed_each<F>(faces: Vec<BoundingBox>, mut extract: F) -> Vec<Detection>
where
    F: FnMut(&BoundingBox) -> Result<Embedding, RecognizerError>,
{
    let mut detections = Vec::with_capacity(faces.len());
    for bbox in faces {
        match extract(&bbox) {
            Ok(embedding) => detections.push(Detection { bbox, embedding }),
            Err(e) => {
                tracing::warn!(bbox = ?bbox.pixel_corners(), error = %e, "skipping face: embedding failed");
            }
        }
    }
    detections
}
