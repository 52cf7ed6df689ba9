use std::path::PathBuf;

use facewatch_core::DEFAULT_MATCH_THRESHOLD;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of reference face images (default: ./face).
    pub faces_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Embedding distance at or below which a face is recognized.
    pub match_tolerance: f32,
    /// Delay after opening the camera before the first read, for AGC/AE to settle.
    pub warmup_ms: u64,
    /// Title of the display window.
    pub window_title: String,
}

impl Config {
    /// Load configuration from `FACEWATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("FACEWATCH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facewatch_core::default_model_dir);

        let match_tolerance = parse_or(&lookup, "FACEWATCH_MATCH_TOLERANCE", DEFAULT_MATCH_THRESHOLD as f32);
        let match_tolerance = if match_tolerance > 0.0 && match_tolerance < 1.0 {
            match_tolerance
        } else {
            tracing::warn!(
                value = match_tolerance,
                "FACEWATCH_MATCH_TOLERANCE must be in (0, 1); using default"
            );
            DEFAULT_MATCH_THRESHOLD as f32
        };

        Self {
            faces_dir: lookup("FACEWATCH_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("face")),
            model_dir,
            camera_device: lookup("FACEWATCH_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            match_tolerance,
            warmup_ms: parse_or(&lookup, "FACEWATCH_WARMUP_MS", 1000),
            window_title: lookup("FACEWATCH_WINDOW_TITLE").unwrap_or_else(|| "Face Recognition".to_string()),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[("FACEWATCH_MODEL_DIR", "/models")]);
        assert_eq!(c.faces_dir, PathBuf::from("face"));
        assert_eq!(c.camera_device, "/dev/video0");
        assert!((c.match_tolerance - 0.6).abs() < 1e-6);
        assert_eq!(c.warmup_ms, 1000);
        assert_eq!(c.window_title, "Face Recognition");
        assert_eq!(c.scrfd_model_path(), "/models/det_10g.onnx");
        assert_eq!(c.arcface_model_path(), "/models/w600k_r50.onnx");
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("FACEWATCH_FACES_DIR", "/srv/refs"),
            ("FACEWATCH_CAMERA_DEVICE", "/dev/video2"),
            ("FACEWATCH_MATCH_TOLERANCE", "0.45"),
            ("FACEWATCH_WARMUP_MS", "0"),
        ]);
        assert_eq!(c.faces_dir, PathBuf::from("/srv/refs"));
        assert_eq!(c.camera_device, "/dev/video2");
        assert!((c.match_tolerance - 0.45).abs() < 1e-6);
        assert_eq!(c.warmup_ms, 0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let c = config(&[("FACEWATCH_MATCH_TOLERANCE", "1.5"), ("FACEWATCH_WARMUP_MS", "soon")]);
        assert!((c.match_tolerance - 0.6).abs() < 1e-6);
        assert_eq!(c.warmup_ms, 1000);
    }
}
