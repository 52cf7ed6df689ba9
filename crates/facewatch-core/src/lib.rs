//! facewatch-core: enrollment and live face recognition pipeline.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime, behind the [`FaceDetector`] and [`FaceEncoder`]
//! traits.

pub mod alignment;
pub mod capability;
pub mod confidence;
pub mod detector;
pub mod engine;
pub mod enrollment;
pub mod matcher;
pub mod recognizer;
pub mod smoothing;
pub mod types;

pub use capability::{FaceDetector, FaceEncoder};
pub use confidence::{confidence, DEFAULT_MATCH_THRESHOLD};
pub use detector::ScrfdDetector;
pub use engine::{EngineError, RecognitionEngine, DETECTION_SCALE};
pub use enrollment::{EnrollmentError, EnrollmentStore};
pub use matcher::{EuclideanMatcher, Matcher};
pub use recognizer::ArcFaceEncoder;
pub use smoothing::{LocationSmoother, SMOOTHING_FACTOR};
pub use types::{Detection, Embedding, EnrollmentEntry, FaceRegion, FramePhase, MatchResult, RecognizedFace};

/// Default directory for the ONNX model files.
///
/// `$XDG_DATA_HOME/facewatch/models`, falling back to
/// `$HOME/.local/share/facewatch/models`.
pub fn default_model_dir() -> std::path::PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        });
    data_home.join("facewatch").join("models")
}
