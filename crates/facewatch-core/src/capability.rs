//! Detector and encoder seams.
//!
//! The recognition pipeline only talks to these traits, so the SCRFD/ArcFace
//! models can be swapped for deterministic stubs in tests.

use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::types::{Detection, Embedding};
use image::RgbImage;

/// Finds face regions in an RGB image, in that image's pixel space.
pub trait FaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Computes one embedding per detected face, index-aligned with `faces`.
pub trait FaceEncoder {
    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, RecognizerError>;
}

impl<T: FaceDetector + ?Sized> FaceDetector for &mut T {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image)
    }
}

impl<T: FaceEncoder + ?Sized> FaceEncoder for &mut T {
    fn encode(&mut self, image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, RecognizerError> {
        (**self).encode(image, faces)
    }
}
