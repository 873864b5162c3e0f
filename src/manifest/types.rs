use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An audio descriptor that owns one axis of the constellation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Danceability,
    Energy,
    Speechiness,
    Acousticness,
    Valence,
    TempoNorm,
    Popularity,
    Instrumentalness,
}

impl Feature {
    /// Default axis order.
    pub const ALL: [Feature; 8] = [
        Feature::Danceability,
        Feature::Energy,
        Feature::Speechiness,
        Feature::Acousticness,
        Feature::Valence,
        Feature::TempoNorm,
        Feature::Popularity,
        Feature::Instrumentalness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Speechiness => "speechiness",
            Feature::Acousticness => "acousticness",
            Feature::Valence => "valence",
            Feature::TempoNorm => "tempo_norm",
            Feature::Popularity => "popularity",
            Feature::Instrumentalness => "instrumentalness",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFeature(pub String);

impl fmt::Display for UnknownFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown feature: {}", self.0)
    }
}

impl std::error::Error for UnknownFeature {}

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// Raw audio descriptors of a node or track.
///
/// Entries may be missing. Unknown names and `null` values in the manifest are
/// dropped on load; the layout treats an absent entry as neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Option<f64>>",
    into = "BTreeMap<String, f64>"
)]
pub struct FeatureVector {
    values: BTreeMap<Feature, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.values.insert(feature, value);
        self
    }

    pub fn insert(&mut self, feature: Feature, value: f64) {
        self.values.insert(feature, value);
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(&f, &v)| (f, v))
    }
}

impl FromIterator<(Feature, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

impl From<BTreeMap<String, Option<f64>>> for FeatureVector {
    fn from(raw: BTreeMap<String, Option<f64>>) -> Self {
        raw.into_iter()
            .filter_map(|(name, value)| Some((name.parse::<Feature>().ok()?, value?)))
            .collect()
    }
}

impl From<FeatureVector> for BTreeMap<String, f64> {
    fn from(vector: FeatureVector) -> Self {
        vector
            .values
            .into_iter()
            .map(|(f, v)| (f.as_str().to_string(), v))
            .collect()
    }
}

/// 10th/50th/90th percentile of one feature over a reference population.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileBand {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl QuantileBand {
    /// Build a band, sorting the breakpoints so that `p10 <= p50 <= p90`.
    pub fn new(p10: f64, p50: f64, p90: f64) -> Self {
        let mut v = [p10, p50, p90];
        v.sort_by(|a, b| a.total_cmp(b));
        Self { p10: v[0], p50: v[1], p90: v[2] }
    }

    pub fn ordered(self) -> Self {
        Self::new(self.p10, self.p50, self.p90)
    }

    pub fn is_finite(&self) -> bool {
        self.p10.is_finite() && self.p50.is_finite() && self.p90.is_finite()
    }

    /// All three breakpoints equal: the feature was constant in the population.
    pub fn is_collapsed(&self) -> bool {
        self.p10 == self.p90
    }
}

/// Quantile bands keyed by feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, QuantileBand>",
    into = "BTreeMap<String, QuantileBand>"
)]
pub struct Quantiles {
    bands: BTreeMap<Feature, QuantileBand>,
}

impl Quantiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same band for every feature in `features`.
    pub fn uniform(features: &[Feature], band: QuantileBand) -> Self {
        features.iter().map(|&f| (f, band)).collect()
    }

    pub fn insert(&mut self, feature: Feature, band: QuantileBand) {
        self.bands.insert(feature, band);
    }

    pub fn get(&self, feature: Feature) -> Option<&QuantileBand> {
        self.bands.get(&feature)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.bands.contains_key(&feature)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, &QuantileBand)> + '_ {
        self.bands.iter().map(|(&f, b)| (f, b))
    }
}

impl FromIterator<(Feature, QuantileBand)> for Quantiles {
    fn from_iter<I: IntoIterator<Item = (Feature, QuantileBand)>>(iter: I) -> Self {
        Self { bands: iter.into_iter().collect() }
    }
}

impl From<BTreeMap<String, QuantileBand>> for Quantiles {
    fn from(raw: BTreeMap<String, QuantileBand>) -> Self {
        raw.into_iter()
            .filter_map(|(name, band)| Some((name.parse::<Feature>().ok()?, band)))
            .collect()
    }
}

impl From<Quantiles> for BTreeMap<String, QuantileBand> {
    fn from(q: Quantiles) -> Self {
        q.bands
            .into_iter()
            .map(|(f, b)| (f.as_str().to_string(), b))
            .collect()
    }
}

/// The static game manifest as shipped to the browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub config: ManifestConfig,
    #[serde(default)]
    pub tree: Vec<NodeAst>,
}

/// Global configuration block of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Axis order. Kept as strings so unknown names can be reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast_gamma: Option<f64>,
    #[serde(default)]
    pub quantiles: Quantiles,
}

/// A genre or subgenre as written in the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeAst {
    pub name: String,
    /// None => purely structural container
    #[serde(default)]
    pub features: Option<FeatureVector>,
    #[serde(default, alias = "subgenres")]
    pub children: Vec<NodeAst>,
    #[serde(default, alias = "seed_tracks")]
    pub leaves: Vec<LeafAst>,
}

/// A seed track under a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafAst {
    #[serde(alias = "title")]
    pub name: String,
    /// None until the track's features are loaded
    #[serde(default)]
    pub features: Option<FeatureVector>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_roundtrip() {
        for f in Feature::ALL {
            assert_eq!(f.as_str().parse::<Feature>(), Ok(f));
        }
        assert!("loudness".parse::<Feature>().is_err());
    }

    #[test]
    fn test_feature_vector_drops_unknown_and_null() {
        let v: FeatureVector = serde_json::from_str(
            r#"{"energy": 0.7, "loudness": -5.0, "valence": null, "tempo_norm": 0.4}"#,
        )
        .unwrap();
        assert_eq!(v.get(Feature::Energy), Some(0.7));
        assert_eq!(v.get(Feature::TempoNorm), Some(0.4));
        assert_eq!(v.get(Feature::Valence), None);
        assert_eq!(v.iter().count(), 2);
    }

    #[test]
    fn test_band_is_ordered() {
        let b = QuantileBand::new(0.9, 0.1, 0.5);
        assert_eq!((b.p10, b.p50, b.p90), (0.1, 0.5, 0.9));
        assert!(QuantileBand::new(5.0, 5.0, 5.0).is_collapsed());
    }

    #[test]
    fn test_manifest_aliases() {
        let m: Manifest = serde_json::from_str(
            r#"{"tree": [{"name": "Rock", "subgenres": [{"name": "Punk"}],
                "seed_tracks": [{"title": "Song"}]}]}"#,
        )
        .unwrap();
        assert_eq!(m.tree[0].children[0].name, "Punk");
        assert_eq!(m.tree[0].leaves[0].name, "Song");
        assert!(m.tree[0].features.is_none());
    }
}
