//! Gallery of known subjects, built once from a directory of reference photos.
//!
//! Each photo's file stem is its label. Photos in which no face is found are
//! skipped together with their label.

use crate::encoder::FaceEncoder;
use crate::types::GalleryEntry;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read gallery directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Load every usable reference photo in `dir`.
    ///
    /// Files are visited in name order. Undecodable files, photos without a
    /// face, and photos the encoder fails on are skipped with a log line; only
    /// an unreadable directory is an error.
    pub fn load<E: FaceEncoder + ?Sized>(dir: &Path, encoder: &mut E) -> Result<Self, GalleryError> {
        let files = list_files(dir)?;
        tracing::info!(dir = %dir.display(), files = files.len(), "loading gallery");

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let Some(label) = label_for(&path) else {
                continue;
            };

            let image = match image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    continue;
                }
            };
            let (width, height) = image.dimensions();

            let detections = match encoder.encode(image.as_raw(), width, height) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping image: encoding failed");
                    continue;
                }
            };

            let Some(best) = detections.into_iter().next() else {
                tracing::warn!(path = %path.display(), label = %label, "no face found; subject left out of gallery");
                continue;
            };

            tracing::debug!(label = %label, confidence = best.bbox.confidence, "gallery entry added");
            entries.push(GalleryEntry {
                label,
                embedding: best.embedding,
                source: path,
            });
        }

        tracing::info!(entries = entries.len(), "gallery loaded");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Regular, non-hidden files of `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let read_err = |source| GalleryError::ReadDir { path: dir.to_path_buf(), source };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && !hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn label_for(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeError;
    use crate::types::{BoundingBox, Detection, Embedding};
    use image::{GrayImage, Luma};

    /// Finds one face whose embedding is the first pixel value, unless the
    /// image is black.
    struct PixelEncoder {
        calls: usize,
    }

    impl FaceEncoder for PixelEncoder {
        fn encode(&mut self, gray: &[u8], _w: u32, _h: u32) -> Result<Vec<Detection>, EncodeError> {
            self.calls += 1;
            let value = gray.first().copied().unwrap_or(0);
            if value == 0 {
                return Ok(Vec::new());
            }
            Ok(vec![Detection {
                bbox: BoundingBox {
                    x: 0.0, y: 0.0, width: 4.0, height: 4.0,
                    confidence: 0.9, landmarks: None,
                },
                embedding: Embedding::new(vec![value as f32]),
            }])
        }
    }

    fn write_png(dir: &Path, name: &str, value: u8) {
        GrayImage::from_pixel(4, 4, Luma([value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_skipped_images_keep_labels_aligned() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "Alice.png", 10);
        write_png(dir.path(), "Bob.png", 0); // no face
        write_png(dir.path(), "Carol.png", 30);
        write_png(dir.path(), "Dave.png", 0); // no face
        write_png(dir.path(), "Erin.png", 50);

        let mut encoder = PixelEncoder { calls: 0 };
        let gallery = Gallery::load(dir.path(), &mut encoder).unwrap();

        assert_eq!(encoder.calls, 5);
        assert_eq!(gallery.len(), 3);
        let pairs: Vec<(&str, f32)> = gallery
            .entries()
            .iter()
            .map(|e| (e.label.as_str(), e.embedding.values[0]))
            .collect();
        assert_eq!(pairs, vec![("Alice", 10.0), ("Carol", 30.0), ("Erin", 50.0)]);
    }

    #[test]
    fn test_non_images_and_hidden_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "Dr. John Smith.png", 70);
        write_png(dir.path(), ".hidden.png", 90);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut encoder = PixelEncoder { calls: 0 };
        let gallery = Gallery::load(dir.path(), &mut encoder).unwrap();

        assert_eq!(encoder.calls, 1);
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.entries()[0].label, "Dr. John Smith");
        assert!(gallery.entries()[0].source.ends_with("Dr. John Smith.png"));
    }

    #[test]
    fn test_empty_directory_gives_empty_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = Gallery::load(dir.path(), &mut PixelEncoder { calls: 0 }).unwrap();
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = Gallery::load(&missing, &mut PixelEncoder { calls: 0 }).unwrap_err();
        assert!(matches!(err, GalleryError::ReadDir { .. }));
    }
}
