// Per-feature contrast curves applied after normalization.
//
// Some features (speechiness in the shipped manifest) cluster near the bottom
// of their range even after percentile mapping. A gamma curve spreads that
// cluster. Which features get a curve is data, not engine logic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::manifest::Feature;

pub const DEFAULT_SPEECHINESS_GAMMA: f64 = 2.0;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum ContrastCurve {
    Identity,
    /// `p^(1/gamma)`; gamma > 1 lifts low percentiles.
    Gamma { gamma: f64 },
}

impl ContrastCurve {
    pub fn apply(self, percentile: f64) -> f64 {
        match self {
            ContrastCurve::Identity => percentile,
            ContrastCurve::Gamma { gamma } if gamma.is_finite() && gamma > 0.0 => {
                percentile.clamp(0.0, 1.0).powf(1.0 / gamma)
            }
            // unusable gamma
            ContrastCurve::Gamma { .. } => percentile,
        }
    }
}

/// Feature -> curve table. Features without an entry are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContrastPolicy {
    curves: BTreeMap<Feature, ContrastCurve>,
}

impl Default for ContrastPolicy {
    fn default() -> Self {
        Self::identity().with(
            Feature::Speechiness,
            ContrastCurve::Gamma { gamma: DEFAULT_SPEECHINESS_GAMMA },
        )
    }
}

impl ContrastPolicy {
    /// A table with no curves at all.
    pub fn identity() -> Self {
        Self { curves: BTreeMap::new() }
    }

    pub fn with(mut self, feature: Feature, curve: ContrastCurve) -> Self {
        self.curves.insert(feature, curve);
        self
    }

    pub fn set(&mut self, feature: Feature, curve: ContrastCurve) {
        self.curves.insert(feature, curve);
    }

    pub fn curve(&self, feature: Feature) -> ContrastCurve {
        self.curves.get(&feature).copied().unwrap_or(ContrastCurve::Identity)
    }

    pub fn reshape(&self, percentile: f64, feature: Feature) -> f64 {
        self.curve(feature).apply(percentile)
    }

    /// Replace the gamma of every gamma curve in the table.
    pub fn set_gamma(&mut self, gamma: f64) {
        for curve in self.curves.values_mut() {
            if let ContrastCurve::Gamma { gamma: g } = curve {
                *g = gamma;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, ContrastCurve)> + '_ {
        self.curves.iter().map(|(&f, &c)| (f, c))
    }
}
