// Percentile normalization against quantile breakpoints.
//
// Raw feature values live on unrelated scales (popularity 0-100, most others
// roughly 0-1) and are far from uniformly distributed. Mapping them through
// the p10/p50/p90 breakpoints of a reference population gives a bounded,
// outlier-resistant score that the projector can treat uniformly.

use crate::manifest::QuantileBand;

/// Score for missing data: no directional bias.
pub const NEUTRAL: f64 = 0.5;

/// Percentile of `raw` within `band`, or None when either side is unusable
/// (missing/NaN value, missing band, non-finite or fully collapsed band).
pub fn percentile_of(raw: Option<f64>, band: Option<&QuantileBand>) -> Option<f64> {
    let v = raw.filter(|v| !v.is_nan())?;
    let band = band.filter(|b| b.is_finite() && !b.is_collapsed())?;
    let QuantileBand { p10, p50, p90 } = *band;

    let p = if v <= p10 {
        0.1
    } else if v <= p50 {
        0.1 + 0.4 * fraction(v, p10, p10, p50)
    } else if v <= p90 {
        0.5 + 0.4 * fraction(v, p50, p50, p90)
    } else {
        0.9 + 0.1 * fraction(v, p90, p50, p90).min(1.0)
    };
    if p.is_nan() {
        return None;
    }
    Some(p.clamp(0.0, 1.0))
}

/// Percentile of `raw` within `band`, falling back to [`NEUTRAL`].
pub fn normalize(raw: Option<f64>, band: Option<&QuantileBand>) -> f64 {
    percentile_of(raw, band).unwrap_or(NEUTRAL)
}

/// Distance from `from` to `v`, in widths of the interval `lo..hi`.
///
/// Operands are halved first so that differences of huge finite quantiles
/// cannot overflow. Zero-width intervals are expected for constant features.
fn fraction(v: f64, from: f64, lo: f64, hi: f64) -> f64 {
    let den = hi / 2.0 - lo / 2.0;
    if den == 0.0 { 0.0 } else { (v / 2.0 - from / 2.0) / den }
}
