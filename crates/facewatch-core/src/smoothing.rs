//! Exponential moving-average smoothing of face boxes across recognition passes.
//!
//! Faces are matched between passes by list position only; there is no
//! identity tracking, so reordered detections blend into each other.

use crate::types::FaceRegion;

/// Weight of the newest observation.
pub const SMOOTHING_FACTOR: f64 = 0.2;

/// Blend `current` into `previous`, coordinate by coordinate.
///
/// - `previous` empty: `current` is returned verbatim.
/// - index present in both: `trunc(alpha * raw + (1 - alpha) * prev)`.
/// - index only in `current`: reset to the raw region.
///
/// The output always has `current.len()` entries; smoothed state for faces
/// that disappeared is dropped.
pub fn smooth(previous: &[FaceRegion], current: &[FaceRegion], alpha: f64) -> Vec<FaceRegion> {
    current
        .iter()
        .enumerate()
        .map(|(i, raw)| match previous.get(i) {
            Some(prev) => blend(prev, raw, alpha),
            None => *raw,
        })
        .collect()
}

fn blend(prev: &FaceRegion, raw: &FaceRegion, alpha: f64) -> FaceRegion {
    let p = prev.as_array();
    let r = raw.as_array();
    // `as i32` truncates toward zero.
    FaceRegion::from_array(std::array::from_fn(|i| {
        (alpha * r[i] as f64 + (1.0 - alpha) * p[i] as f64) as i32
    }))
}

/// Smoothed region state carried between recognition passes.
#[derive(Debug, Clone)]
pub struct LocationSmoother {
    alpha: f64,
    regions: Vec<FaceRegion>,
}

impl Default for LocationSmoother {
    fn default() -> Self {
        Self::new(SMOOTHING_FACTOR)
    }
}

impl LocationSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            regions: Vec::new(),
        }
    }

    /// Fold one pass of raw regions into the state and return the result.
    pub fn update(&mut self, raw: &[FaceRegion]) -> &[FaceRegion] {
        self.regions = smooth(&self.regions, raw, self.alpha);
        &self.regions
    }

    pub fn regions(&self) -> &[FaceRegion] {
        &self.regions
    }
}
