// Quantile estimation from observed feature values.
//
// Used for local normalization (only the visible sibling set) and to fill in
// global bands the manifest does not ship.

use crate::manifest::{Feature, FeatureVector, QuantileBand, Quantiles};

/// Percentile `q` in `[0, 1]` of an ascending, non-empty slice, with linear
/// interpolation between closest ranks.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// p10/p50/p90 of the finite values in `values`, None if there are none.
pub fn band_of(values: impl IntoIterator<Item = f64>) -> Option<QuantileBand> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(QuantileBand::new(
        percentile(&sorted, 0.1),
        percentile(&sorted, 0.5),
        percentile(&sorted, 0.9),
    ))
}

impl Quantiles {
    /// Estimate bands for `features` from a population of vectors.
    /// Features nobody observed get no band.
    pub fn from_vectors<'a>(
        vectors: impl IntoIterator<Item = &'a FeatureVector>,
        features: &[Feature],
    ) -> Quantiles {
        let vectors: Vec<&FeatureVector> = vectors.into_iter().collect();
        features
            .iter()
            .filter_map(|&f| {
                let band = band_of(vectors.iter().filter_map(|v| v.get(f)))?;
                Some((f, band))
            })
            .collect()
    }
}
