//! Reference face enrollment from a directory of images.
//!
//! Built once at startup and read-only afterwards.

use crate::capability::{FaceDetector, FaceEncoder};
use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::types::{Embedding, EnrollmentEntry};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("cannot read enrollment directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// A reference file that produced no enrollment entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Load an image file as 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, EnrollmentError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| EnrollmentError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// In-memory table of enrolled reference faces.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentStore {
    entries: Vec<EnrollmentEntry>,
    skipped: Vec<SkippedFile>,
}

impl EnrollmentStore {
    /// Enroll every image file in `dir`.
    ///
    /// Files are visited in `read_dir` order, which is filesystem-defined and
    /// not sorted, so entry order may differ between platforms. Only the
    /// first face the detector returns for each file is enrolled. Files with
    /// no face, that fail to decode, or that the models fail on are logged and
    /// skipped; only directory errors abort the build.
    pub fn build<D, E>(dir: &Path, mut detector: D, mut encoder: E) -> Result<Self, EnrollmentError>
    where
        D: FaceDetector,
        E: FaceEncoder,
    {
        let read_dir = std::fs::read_dir(dir).map_err(|source| EnrollmentError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut store = Self::default();

        for entry in read_dir {
            let entry = entry.map_err(|source| EnrollmentError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let image = match load_image(&path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "unreadable reference image, skipping");
                    store.skip(name, e.to_string());
                    continue;
                }
            };

            match first_face_embedding(&image, &mut detector, &mut encoder) {
                Ok(Some(embedding)) => {
                    tracing::debug!(file = %name, dim = embedding.values.len(), "enrolled reference face");
                    store.entries.push(EnrollmentEntry { name, embedding });
                }
                Ok(None) => {
                    tracing::warn!(file = %name, "no face found in reference image, skipping");
                    store.skip(name, "no face detected".to_string());
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "face model failed on reference image, skipping");
                    store.skip(name, e.to_string());
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            enrolled = ?store.names().collect::<Vec<_>>(),
            skipped = store.skipped.len(),
            "enrollment complete"
        );

        Ok(store)
    }

    /// Build a store directly from entries.
    pub fn from_entries(entries: Vec<EnrollmentEntry>) -> Self {
        Self {
            entries,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, name: String, reason: String) {
        self.skipped.push(SkippedFile { name, reason });
    }

    pub fn entries(&self) -> &[EnrollmentEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn embeddings(&self) -> Vec<&Embedding> {
        self.entries.iter().map(|e| &e.embedding).collect()
    }

    /// Files that were skipped during the build, in visit order.
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn first_face_embedding<D, E>(image: &RgbImage, detector: &mut D, encoder: &mut E) -> Result<Option<Embedding>, EnrollmentError>
where
    D: FaceDetector,
    E: FaceEncoder,
{
    let detections = detector.detect(image)?;
    let Some(first) = detections.into_iter().next() else {
        return Ok(None);
    };
    Ok(encoder.encode(image, std::slice::from_ref(&first))?.into_iter().next())
}
