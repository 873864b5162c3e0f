// Angular vector-sum projection of feature percentiles onto the plane.
//
// Each axis feature owns a fixed direction on a 2N-segment ring:
//
//     angle(i) = i * (2π / (2N))
//
// so the N features fill half the circle and the opposite half holds their own
// "low" poles. The renderer draws its label ring from `AxisSet::ring`, which
// uses the same formula; changing one without the other breaks the map's
// reading ("up means happy").
//
// A node's point is the sum of signed, exaggerated deviations from 0.5 along
// those directions. Disabled features keep their angle and contribute zero.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use serde::Serialize;

use super::Position;
use super::contrast::ContrastPolicy;
use super::normalize::{percentile_of, NEUTRAL};
use crate::manifest::{Feature, FeatureVector, Quantiles};

/// Direction of axis `index` among `count` axes, in radians.
pub fn axis_angle(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    index as f64 * (2.0 * PI / (2 * count) as f64)
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub feature: Feature,
    pub angle: f64,
    pub enabled: bool,
}

impl Axis {
    pub fn unit(&self) -> Position {
        Position::new(self.angle.cos(), self.angle.sin())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pole {
    High,
    Low,
}

/// One label position on the ring drawn around the map.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct AxisPole {
    pub feature: Feature,
    pub pole: Pole,
    pub angle: f64,
    pub enabled: bool,
}

/// Ordered axes with their angles and enabled flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSet {
    axes: Vec<Axis>,
}

impl AxisSet {
    /// `enabled == None` enables every axis.
    pub fn new(features: &[Feature], enabled: Option<&BTreeSet<Feature>>) -> Self {
        let n = features.len();
        let axes = features
            .iter()
            .enumerate()
            .map(|(i, &feature)| Axis {
                feature,
                angle: axis_angle(i, n),
                enabled: enabled.is_none_or(|set| set.contains(&feature)),
            })
            .collect();
        Self { axes }
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> + '_ {
        self.axes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Axis> {
        self.axes.get(index)
    }

    /// High poles in axis order, then the matching low poles half a turn away.
    pub fn ring(&self) -> Vec<AxisPole> {
        let high = self.axes.iter().map(|a| AxisPole {
            feature: a.feature,
            pole: Pole::High,
            angle: a.angle,
            enabled: a.enabled,
        });
        let low = self.axes.iter().map(|a| AxisPole {
            feature: a.feature,
            pole: Pole::Low,
            angle: a.angle + PI,
            enabled: a.enabled,
        });
        high.chain(low).collect()
    }
}

/// Contrast-adjusted percentiles of one node, aligned with an [`AxisSet`].
/// `None` marks a disabled axis or a feature with no usable observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub percentiles: Vec<Option<f64>>,
}

impl Profile {
    pub fn has_observations(&self) -> bool {
        self.percentiles.iter().any(Option::is_some)
    }

    /// Unit vector along the node's most extreme feature: toward the high pole
    /// when the feature is above the midpoint, toward the low pole otherwise.
    /// Ties go to the earlier axis. None without any deviation to follow.
    pub fn dominant_direction(&self, axes: &AxisSet) -> Option<Position> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.percentiles.iter().enumerate() {
            let Some(p) = *p else { continue };
            let dev = p - NEUTRAL;
            if dev == 0.0 {
                continue;
            }
            if best.is_none_or(|(_, b)| dev.abs() > b.abs()) {
                best = Some((i, dev));
            }
        }
        let (i, dev) = best?;
        let unit = axes.get(i)?.unit();
        Some(if dev > 0.0 { unit } else { unit.scaled(-1.0) })
    }
}

/// Normalize and reshape every enabled axis feature of `features`.
pub fn profile(
    features: &FeatureVector,
    quantiles: &Quantiles,
    axes: &AxisSet,
    contrast: &ContrastPolicy,
) -> Profile {
    let percentiles = axes
        .iter()
        .map(|axis| {
            if !axis.enabled {
                return None;
            }
            percentile_of(features.get(axis.feature), quantiles.get(axis.feature))
                .map(|p| contrast.reshape(p, axis.feature))
        })
        .collect();
    Profile { percentiles }
}

/// Raw layout point of a profile.
pub fn project(
    profile: &Profile,
    axes: &AxisSet,
    exaggeration: f64,
    projection_scale: f64,
) -> Position {
    let mut sum = Position::ORIGIN;
    for (axis, p) in axes.iter().zip(&profile.percentiles) {
        let p = p.unwrap_or(NEUTRAL);
        let weight = (p - NEUTRAL) * 2.0 * exaggeration;
        sum = sum + axis.unit().scaled(weight);
    }
    sum.scaled(projection_scale)
}
