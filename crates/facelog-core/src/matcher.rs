//! Nearest-neighbour matching of probe embeddings against the gallery.

use crate::types::{Detection, Embedding, GalleryEntry};

/// Label reported for faces that match nobody in the gallery.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Result of matching one probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest gallery entry (`+inf` for an empty gallery).
    pub distance: f32,
    /// Index of the nearest gallery entry, whether or not it was accepted.
    pub index: Option<usize>,
    /// Label of the matched entry; `None` when unmatched.
    pub label: Option<String>,
}

impl MatchResult {
    /// Label to display: the matched label, or "UNKNOWN".
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    /// Match confidence in [0, 1], derived as `1 - distance`.
    pub fn confidence(&self) -> f32 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }

    fn unknown(distance: f32, index: Option<usize>) -> Self {
        Self { matched: false, distance, index, label: None }
    }
}

/// Strategy for comparing a probe embedding against the gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult;
}

/// Euclidean-distance matcher.
///
/// Picks the entry with the smallest distance; on equal distances the first
/// entry wins. The nearest entry is accepted when its distance is at most
/// `threshold`. Every entry is visited.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(&entry.embedding);
            // Strict comparison keeps the earliest index on ties.
            if best_idx.is_none() || dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= threshold => MatchResult {
                matched: true,
                distance: best_dist,
                index: Some(idx),
                label: Some(gallery[idx].label.clone()),
            },
            _ => MatchResult::unknown(best_dist, best_idx),
        }
    }
}

/// Match every detection of one frame, preserving detection order.
pub fn match_frame<M: Matcher + ?Sized>(
    matcher: &M,
    detections: &[Detection],
    gallery: &[GalleryEntry],
    threshold: f32,
) -> Vec<MatchResult> {
    detections
        .iter()
        .map(|d| matcher.compare(&d.embedding, gallery, threshold))
        .collect()
}
