//! Per-frame recognition: downscale, detect, encode, match.

use crate::capability::{FaceDetector, FaceEncoder};
use crate::confidence::{self, DEFAULT_MATCH_THRESHOLD};
use crate::detector::DetectorError;
use crate::enrollment::EnrollmentStore;
use crate::matcher::{self, EuclideanMatcher, Matcher};
use crate::recognizer::RecognizerError;
use crate::types::{Embedding, MatchResult, RecognizedFace};
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

/// Frames are shrunk by this factor in each dimension before detection.
pub const DETECTION_SCALE: f32 = 0.25;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no reference faces enrolled")]
    EmptyEnrollment,
    #[error("frame buffer too short for {width}x{height} BGR: expected {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("encoder returned {embeddings} embeddings for {faces} faces")]
    EmbeddingCountMismatch { faces: usize, embeddings: usize },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Detector + encoder + matcher, applied to full-resolution BGR frames.
pub struct RecognitionEngine<D, E, M = EuclideanMatcher> {
    detector: D,
    encoder: E,
    matcher: M,
    tolerance: f32,
}

impl<D: FaceDetector, E: FaceEncoder> RecognitionEngine<D, E> {
    pub fn new(detector: D, encoder: E) -> Self {
        Self::with_matcher(detector, encoder, EuclideanMatcher)
    }
}

impl<D: FaceDetector, E: FaceEncoder, M: Matcher> RecognitionEngine<D, E, M> {
    pub fn with_matcher(detector: D, encoder: E, matcher: M) -> Self {
        Self {
            detector,
            encoder,
            matcher,
            tolerance: DEFAULT_MATCH_THRESHOLD as f32,
        }
    }

    /// Distance at or below which a face matches; also the confidence threshold.
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Multiplier that maps returned regions back to full-resolution coordinates.
    pub fn upscale_factor(&self) -> i32 {
        (1.0 / DETECTION_SCALE).round() as i32
    }

    /// Recognize every face in a packed BGR frame.
    ///
    /// Returned regions are in the downscaled frame's coordinate space; scale
    /// them by [`upscale_factor`](Self::upscale_factor) before drawing.
    pub fn recognize(
        &mut self,
        bgr: &[u8],
        width: u32,
        height: u32,
        store: &EnrollmentStore,
    ) -> Result<Vec<RecognizedFace>, EngineError> {
        if store.is_empty() {
            return Err(EngineError::EmptyEnrollment);
        }

        let small = downscale_bgr_to_rgb(bgr, width, height, DETECTION_SCALE)?;

        let detections = self.detector.detect(&small)?;
        if detections.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.encoder.encode(&small, &detections)?;
        if embeddings.len() != detections.len() {
            return Err(EngineError::EmbeddingCountMismatch {
                faces: detections.len(),
                embeddings: embeddings.len(),
            });
        }

        let known = store.embeddings();
        let faces: Vec<RecognizedFace> = detections
            .iter()
            .zip(embeddings.iter())
            .map(|(detection, embedding)| RecognizedFace {
                region: detection.region,
                result: self.match_embedding(&known, store, embedding),
            })
            .collect();

        tracing::trace!(
            faces = faces.len(),
            known = faces.iter().filter(|f| f.result.is_known()).count(),
            "recognition pass"
        );

        Ok(faces)
    }

    /// Label one probe: nearest enrolled face, accepted only if it also matches.
    fn match_embedding(&self, known: &[&Embedding], store: &EnrollmentStore, probe: &Embedding) -> MatchResult {
        let matches = self.matcher.compare(known, probe, self.tolerance);
        let distances = self.matcher.distances(known, probe);

        match matcher::argmin(&distances) {
            Some(best) if matches.get(best).copied().unwrap_or(false) => MatchResult {
                label: Some(store.entries()[best].name.clone()),
                confidence: Some(confidence::confidence(distances[best] as f64, self.tolerance as f64)),
            },
            _ => MatchResult::unknown(),
        }
    }
}

/// Shrink a packed BGR frame by `scale` (bilinear) and reorder it to RGB.
pub fn downscale_bgr_to_rgb(bgr: &[u8], width: u32, height: u32, scale: f32) -> Result<RgbImage, EngineError> {
    let expected = width as usize * height as usize * 3;
    if bgr.len() < expected {
        return Err(EngineError::InvalidFrame {
            width,
            height,
            expected,
            actual: bgr.len(),
        });
    }

    let mut rgb: Vec<u8> = Vec::with_capacity(expected);
    for px in bgr[..expected].chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    let full = RgbImage::from_raw(width, height, rgb).ok_or(EngineError::InvalidFrame {
        width,
        height,
        expected,
        actual: bgr.len(),
    })?;

    let small_w = ((width as f32 * scale).round() as u32).max(1);
    let small_h = ((height as f32 * scale).round() as u32).max(1);
    Ok(imageops::resize(&full, small_w, small_h, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detection, EnrollmentEntry, FaceRegion};

    /// Returns a fixed set of regions and records the image size it saw.
    struct FixedDetector {
        regions: Vec<FaceRegion>,
        seen: Vec<(u32, u32)>,
    }

    impl FixedDetector {
        fn new(regions: Vec<FaceRegion>) -> Self {
            Self { regions, seen: Vec::new() }
        }
    }

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
            self.seen.push(image.dimensions());
            Ok(self.regions.iter().copied().map(Detection::new).collect())
        }
    }

    /// Hands out pre-baked embeddings, one per face, in order.
    struct QueueEncoder(Vec<Embedding>);

    impl FaceEncoder for QueueEncoder {
        fn encode(&mut self, _image: &RgbImage, faces: &[Detection]) -> Result<Vec<Embedding>, RecognizerError> {
            Ok(self.0.iter().take(faces.len()).cloned().collect())
        }
    }

    fn store(entries: &[(&str, Vec<f32>)]) -> EnrollmentStore {
        EnrollmentStore::from_entries(
            entries
                .iter()
                .map(|(name, v)| EnrollmentEntry {
                    name: name.to_string(),
                    embedding: Embedding::new(v.clone()),
                })
                .collect(),
        )
    }

    fn frame(width: u32, height: u32) -> Vec<u8> {
        vec![0u8; (width * height * 3) as usize]
    }

    #[test]
    fn test_known_face_gets_name_and_confidence() {
        let region = FaceRegion::new(10, 30, 40, 5);
        let mut engine = RecognitionEngine::new(
            FixedDetector::new(vec![region]),
            QueueEncoder(vec![Embedding::new(vec![0.0, 0.0])]),
        );
        let store = store(&[("bob.jpg", vec![3.0, 4.0]), ("alice.jpg", vec![0.0, 0.0])]);

        let faces = engine.recognize(&frame(64, 48), 64, 48, &store).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, region);
        assert_eq!(faces[0].result.display_label(), "alice.jpg(100.0%)");
    }

    #[test]
    fn test_nearest_but_too_far_is_unknown() {
        let mut engine = RecognitionEngine::new(
            FixedDetector::new(vec![FaceRegion::new(0, 4, 4, 0)]),
            QueueEncoder(vec![Embedding::new(vec![0.0, 0.0])]),
        );
        let store = store(&[("alice.jpg", vec![0.0, 0.9])]);

        let faces = engine.recognize(&frame(16, 16), 16, 16, &store).unwrap();

        assert_eq!(faces[0].result, MatchResult::unknown());
        assert_eq!(faces[0].result.display_label(), "Unknown(Unknown)");
    }

    #[test]
    fn test_tie_goes_to_first_enrolled() {
        let mut engine = RecognitionEngine::new(
            FixedDetector::new(vec![FaceRegion::new(0, 4, 4, 0)]),
            QueueEncoder(vec![Embedding::new(vec![0.0, 0.0])]),
        );
        let store = store(&[("first.jpg", vec![0.3, 0.0]), ("second.jpg", vec![0.0, 0.3])]);

        let faces = engine.recognize(&frame(16, 16), 16, 16, &store).unwrap();

        assert_eq!(faces[0].result.label.as_deref(), Some("first.jpg"));
    }

    #[test]
    fn test_multiple_faces_stay_index_aligned() {
        let regions = vec![FaceRegion::new(0, 4, 4, 0), FaceRegion::new(8, 12, 12, 8)];
        let mut engine = RecognitionEngine::new(
            FixedDetector::new(regions.clone()),
            QueueEncoder(vec![Embedding::new(vec![5.0, 5.0]), Embedding::new(vec![1.0, 0.0])]),
        );
        let store = store(&[("carol.png", vec![1.0, 0.0])]);

        let faces = engine.recognize(&frame(64, 64), 64, 64, &store).unwrap();

        assert_eq!(faces.iter().map(|f| f.region).collect::<Vec<_>>(), regions);
        assert!(!faces[0].result.is_known());
        assert_eq!(faces[1].result.label.as_deref(), Some("carol.png"));
    }

    #[test]
    fn test_empty_enrollment_is_an_error() {
        let mut detector = FixedDetector::new(vec![FaceRegion::new(0, 4, 4, 0)]);
        let mut engine = RecognitionEngine::new(&mut detector, QueueEncoder(Vec::new()));

        let err = engine.recognize(&frame(16, 16), 16, 16, &EnrollmentStore::default()).unwrap_err();

        assert!(matches!(err, EngineError::EmptyEnrollment));
        drop(engine);
        assert!(detector.seen.is_empty(), "detector must not run without references");
    }

    #[test]
    fn test_detector_sees_quarter_scale_frame() {
        let mut detector = FixedDetector::new(Vec::new());
        let mut engine = RecognitionEngine::new(&mut detector, QueueEncoder(Vec::new()));
        let store = store(&[("alice.jpg", vec![0.0])]);

        let faces = engine.recognize(&frame(640, 480), 640, 480, &store).unwrap();

        assert!(faces.is_empty());
        assert_eq!(engine.upscale_factor(), 4);
        drop(engine);
        assert_eq!(detector.seen, vec![(160, 120)]);
    }

    #[test]
    fn test_encoder_count_mismatch() {
        let mut engine = RecognitionEngine::new(
            FixedDetector::new(vec![FaceRegion::new(0, 4, 4, 0), FaceRegion::new(4, 8, 8, 4)]),
            QueueEncoder(vec![Embedding::new(vec![0.0])]),
        );
        let store = store(&[("alice.jpg", vec![0.0])]);

        let err = engine.recognize(&frame(16, 16), 16, 16, &store).unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingCountMismatch { faces: 2, embeddings: 1 }));
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let mut engine = RecognitionEngine::new(FixedDetector::new(Vec::new()), QueueEncoder(Vec::new()));
        let store = store(&[("alice.jpg", vec![0.0])]);
        let err = engine.recognize(&[0u8; 10], 16, 16, &store).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFrame { expected: 768, actual: 10, .. }));
    }

    #[test]
    fn test_downscale_swaps_bgr_to_rgb() {
        let bgr: Vec<u8> = [10u8, 20, 30].repeat(8 * 8);
        let small = downscale_bgr_to_rgb(&bgr, 8, 8, 0.25).unwrap();
        assert_eq!(small.dimensions(), (2, 2));
        assert_eq!(small.get_pixel(0, 0).0, [30, 20, 10]);
    }
}
