//! facelog-core — Face encoding, gallery loading and matching.
//!
//! Faces are found with SCRFD and embedded with ArcFace, both running via
//! ONNX Runtime. Matching is nearest-neighbour by Euclidean distance against
//! a gallery built from a directory of reference photos.

pub mod align;
pub mod arcface;
pub mod encoder;
pub mod gallery;
pub mod matcher;
pub mod scrfd;
pub mod types;

pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{Gallery, GalleryError};
pub use matcher::{match_frame, EuclideanMatcher, MatchResult, Matcher};
pub use types::{BoundingBox, Detection, Embedding, GalleryEntry};

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";
