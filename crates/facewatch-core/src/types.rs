use serde::{Deserialize, Serialize};

/// Face rectangle in pixel coordinates, ordered `(top, right, bottom, left)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceRegion {
    pub const fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    /// Build a region from a float `x, y, width, height` box, truncating toward zero.
    pub fn from_bounding_box(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            top: y as i32,
            right: (x + width) as i32,
            bottom: (y + height) as i32,
            left: x as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Multiply every coordinate by `factor` (e.g. 4 to undo a 0.25x downscale).
    pub fn scaled(&self, factor: i32) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    pub fn from_array(coords: [i32; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }
}

/// One face found by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub region: FaceRegion,
    /// Detector score in [0, 1].
    pub score: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl Detection {
    pub fn new(region: FaceRegion) -> Self {
        Self {
            region,
            score: 1.0,
            landmarks: None,
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A reference face: display name (the source file name) and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Outcome of matching one probe embedding against the enrollment store.
///
/// `None` in either field renders as `Unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub label: Option<String>,
    /// Formatted percentage, e.g. "93.41%".
    pub confidence: Option<String>,
}

impl MatchResult {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.label.is_some()
    }

    /// Overlay text in the form `name(confidence)`.
    pub fn display_label(&self) -> String {
        format!(
            "{}({})",
            self.label.as_deref().unwrap_or(Self::UNKNOWN),
            self.confidence.as_deref().unwrap_or(Self::UNKNOWN)
        )
    }
}

/// A face region paired with its match result from one recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFace {
    pub region: FaceRegion,
    pub result: MatchResult,
}

/// Whether the current frame runs full recognition or reuses the last pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Recognize,
    Reuse,
}

impl FramePhase {
    pub fn next(self) -> Self {
        match self {
            FramePhase::Recognize => FramePhase::Reuse,
            FramePhase::Reuse => FramePhase::Recognize,
        }
    }
}
