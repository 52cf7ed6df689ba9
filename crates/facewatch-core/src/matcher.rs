//! Distance-based comparison of a probe embedding against enrolled embeddings.

use crate::types::Embedding;

/// Strategy for comparing a probe embedding against a list of known embeddings.
///
/// Both methods return one value per known embedding, in the same order.
pub trait Matcher {
    fn distances(&self, known: &[&Embedding], probe: &Embedding) -> Vec<f32>;

    /// Per-entry match flags: `true` where the distance is within `tolerance`.
    fn compare(&self, known: &[&Embedding], probe: &Embedding, tolerance: f32) -> Vec<bool> {
        self.distances(known, probe)
            .into_iter()
            .map(|d| d <= tolerance)
            .collect()
    }
}

/// Euclidean distance matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn distances(&self, known: &[&Embedding], probe: &Embedding) -> Vec<f32> {
        known.iter().map(|k| k.euclidean_distance(probe)).collect()
    }
}

/// Index of the smallest distance, first occurrence on ties.
///
/// Returns `None` for an empty slice. NaN distances never win.
pub fn argmin(distances: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &d) in distances.iter().enumerate() {
        match best {
            Some((_, b)) if !(d < b) => {}
            _ if d.is_nan() => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}
