// Feature-space constellation layout.
//
// Goals:
// - Deterministic: no randomness, no time budgets, key-ordered relaxation
// - Pure: (constellation, config, options) -> positions, nothing retained
// - Legible: robust percentile normalization, log radial compression
// - Meaningful: collisions resolve along each node's defining feature axis
// - Bounded: every output position lies within the target radius
//
// Submodules:
// - normalize: raw value -> percentile via p10/p50/p90
// - contrast: per-feature reshaping curves
// - quantiles: band estimation for local/missing quantiles
// - projection: axis angles, label ring, vector-sum projection
// - radial_scale: adaptive fit + log compression
// - relation / spatial_grid: pair classes and neighbor queries
// - collision: damped pairwise relaxation
// - cache: optional caller-owned memoization
//
// Output:
// - LayoutResult with final positions keyed by path key, plus the raw and
//   scaled stages and the collision report.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::manifest::{Constellation, Feature, FeatureVector, ManifestConfig, ManifestError, NodeId, Quantiles};

pub mod cache;
pub mod collision;
pub mod contrast;
pub mod normalize;
pub mod projection;
pub mod quantiles;
pub mod radial_scale;
pub mod relation;
mod spatial_grid;

use collision::{resolve_collisions, Body, CollisionReport};
use contrast::ContrastPolicy;
use projection::{profile, project, AxisPole, AxisSet, Profile};
use radial_scale::scale_to_radius;
use relation::MinDistances;

/// A point in layout units, origin at the map center.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn scaled(&self, k: f64) -> Position {
        Position { x: self.x * k, y: self.y * k }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Pull the point back onto the circle of `radius` if it lies outside,
    /// keeping its direction.
    pub fn clamp_to_radius(self, radius: f64) -> Position {
        let radius = radius.max(0.0);
        let len = self.length();
        if len > radius { self.scaled(radius / len) } else { self }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

/// Hard ceiling on collision sweeps, whatever the config asks for.
pub const MAX_ITERATIONS_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Axis order; index i sits at angle i * π / N.
    #[serde(default = "LayoutConfig::default_features")]
    pub features: Vec<Feature>,
    /// Amplifies percentile deviation from the midpoint.
    #[serde(default = "LayoutConfig::default_exaggeration")]
    pub exaggeration: f64,
    /// Multiplier per tree depth (root genres first). The last entry repeats.
    #[serde(default = "LayoutConfig::default_depth_exaggeration")]
    pub depth_exaggeration: Vec<f64>,
    /// Raw unit -> layout unit.
    #[serde(default = "LayoutConfig::default_projection_scale")]
    pub projection_scale: f64,
    /// Canvas boundary.
    #[serde(default = "LayoutConfig::default_target_radius")]
    pub target_radius: f64,
    #[serde(default)]
    pub min_distance: MinDistances,
    #[serde(default = "LayoutConfig::default_push_strength")]
    pub push_strength: f64,
    /// Per-iteration decay of the push.
    #[serde(default = "LayoutConfig::default_damping")]
    pub damping: f64,
    #[serde(default = "LayoutConfig::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub contrast: ContrastPolicy,
}

impl LayoutConfig {
    fn default_features() -> Vec<Feature> {
        Feature::ALL.to_vec()
    }
    fn default_exaggeration() -> f64 {
        1.0
    }
    fn default_depth_exaggeration() -> Vec<f64> {
        vec![1.25, 1.1, 1.0]
    }
    fn default_projection_scale() -> f64 {
        100.0
    }
    fn default_target_radius() -> f64 {
        220.0
    }
    fn default_push_strength() -> f64 {
        0.6
    }
    fn default_damping() -> f64 {
        0.92
    }
    fn default_max_iterations() -> usize {
        60
    }

    /// Engine defaults overlaid with the manifest's global config block.
    pub fn from_manifest(manifest: &ManifestConfig) -> Result<Self, ManifestError> {
        let mut cfg = Self::default();
        if let Some(names) = &manifest.features {
            if names.is_empty() {
                return Err(ManifestError::NoAxes);
            }
            let mut seen = BTreeSet::new();
            let mut features = Vec::with_capacity(names.len());
            for name in names {
                let f: Feature = name.parse()?;
                if !seen.insert(f) {
                    return Err(ManifestError::DuplicateAxis(f));
                }
                features.push(f);
            }
            cfg.features = features;
        }
        if let Some(scale) = manifest.projection_scale {
            cfg.projection_scale = scale;
        }
        if let Some(gamma) = manifest.contrast_gamma {
            cfg.contrast.set_gamma(gamma);
        }
        Ok(cfg)
    }

    /// Effective exaggeration for a node at `depth`.
    pub fn exaggeration_at(&self, depth: usize) -> f64 {
        let multiplier = self
            .depth_exaggeration
            .get(depth)
            .or(self.depth_exaggeration.last())
            .copied()
            .unwrap_or(1.0);
        self.exaggeration * multiplier
    }

    pub fn axes(&self, enabled: Option<&BTreeSet<Feature>>) -> AxisSet {
        AxisSet::new(&self.features, enabled)
    }

    /// Label ring for the renderer; same angles the projector uses.
    pub fn axis_ring(&self, enabled: Option<&BTreeSet<Feature>>) -> Vec<AxisPole> {
        self.axes(enabled).ring()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            features: Self::default_features(),
            exaggeration: Self::default_exaggeration(),
            depth_exaggeration: Self::default_depth_exaggeration(),
            projection_scale: Self::default_projection_scale(),
            target_radius: Self::default_target_radius(),
            min_distance: MinDistances::default(),
            push_strength: Self::default_push_strength(),
            damping: Self::default_damping(),
            max_iterations: Self::default_max_iterations(),
            contrast: ContrastPolicy::default(),
        }
    }
}

/// Per-request tweaks layered over the manifest-derived config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOverrides {
    pub features: Option<Vec<Feature>>,
    pub exaggeration: Option<f64>,
    pub depth_exaggeration: Option<Vec<f64>>,
    pub projection_scale: Option<f64>,
    pub target_radius: Option<f64>,
    pub min_distance: Option<MinDistances>,
    pub push_strength: Option<f64>,
    pub damping: Option<f64>,
    pub max_iterations: Option<usize>,
    pub contrast: Option<ContrastPolicy>,
}

impl LayoutOverrides {
    pub fn apply(&self, cfg: &mut LayoutConfig) {
        if let Some(features) = &self.features {
            // first occurrence wins
            let mut seen = BTreeSet::new();
            let features: Vec<Feature> = features.iter().copied().filter(|f| seen.insert(*f)).collect();
            if features.is_empty() {
                log::warn!("ignoring empty axis override");
            } else {
                cfg.features = features;
            }
        }
        if let Some(v) = self.exaggeration {
            cfg.exaggeration = v;
        }
        if let Some(v) = &self.depth_exaggeration {
            cfg.depth_exaggeration = v.clone();
        }
        if let Some(v) = self.projection_scale {
            cfg.projection_scale = v;
        }
        if let Some(v) = self.target_radius {
            cfg.target_radius = v;
        }
        if let Some(v) = self.min_distance {
            cfg.min_distance = v;
        }
        if let Some(v) = self.push_strength {
            cfg.push_strength = v;
        }
        if let Some(v) = self.damping {
            cfg.damping = v;
        }
        if let Some(v) = self.max_iterations {
            if v > MAX_ITERATIONS_LIMIT {
                log::warn!("max_iterations {} capped at {}", v, MAX_ITERATIONS_LIMIT);
            }
            cfg.max_iterations = v.min(MAX_ITERATIONS_LIMIT);
        }
        if let Some(v) = &self.contrast {
            cfg.contrast = v.clone();
        }
    }
}

/// Which part of the tree to lay out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutScope {
    /// Every node carrying features.
    #[default]
    Tree,
    /// Top-level genres only.
    Roots,
    /// Direct children (and leaves) of one node: the zoomed or preview view.
    Children { parent: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub scope: LayoutScope,
    /// Normalize each sibling set against its own quantiles.
    pub use_local_quantiles: bool,
    /// Lay out seed tracks alongside nodes.
    pub include_leaves: bool,
    /// None => all axes enabled.
    pub enabled_features: Option<BTreeSet<Feature>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    /// Final positions, all within the target radius.
    pub positions: BTreeMap<String, Position>,
    /// Projector output, before any scaling.
    pub raw: BTreeMap<String, Position>,
    /// After radial scaling, before collision resolution.
    pub scaled: BTreeMap<String, Position>,
    pub adaptive_scale: f64,
    pub report: CollisionReport,
}

/// An entity selected for layout.
#[derive(Debug, Clone, Copy)]
struct Member<'a> {
    key: &'a str,
    path: &'a [String],
    features: &'a FeatureVector,
}

impl<'a> Member<'a> {
    fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    fn parent_path(&self) -> &'a [String] {
        &self.path[..self.path.len().saturating_sub(1)]
    }
}

pub fn layout(constellation: &Constellation, cfg: &LayoutConfig, options: &LayoutOptions) -> LayoutResult {
    let members = collect_members(constellation, options);
    if members.is_empty() {
        return LayoutResult::default();
    }

    let axes = cfg.axes(options.enabled_features.as_ref());

    // Local mode: each sibling set is its own reference population.
    let local = options
        .use_local_quantiles
        .then(|| local_quantiles(&members, &cfg.features));

    let profiles: Vec<Profile> = members
        .iter()
        .map(|m| {
            let quantiles = local
                .as_ref()
                .and_then(|l| l.get(m.parent_path()))
                .unwrap_or(&constellation.quantiles);
            profile(m.features, quantiles, &axes, &cfg.contrast)
        })
        .collect();

    let mut points: Vec<Position> = members
        .iter()
        .zip(&profiles)
        .map(|(m, p)| project(p, &axes, cfg.exaggeration_at(m.depth()), cfg.projection_scale))
        .collect();
    let raw = keyed(&members, &points);

    let adaptive_scale = scale_to_radius(&mut points, cfg.target_radius);
    let scaled = keyed(&members, &points);

    let mut bodies: Vec<Body> = members
        .iter()
        .zip(points)
        .zip(&profiles)
        .map(|((m, position), p)| Body {
            key: m.key.to_string(),
            path: m.path.to_vec(),
            position,
            push: p.dominant_direction(&axes),
        })
        .collect();
    let report = resolve_collisions(&mut bodies, cfg);

    let positions: BTreeMap<String, Position> = bodies
        .into_iter()
        .map(|b| (b.key, b.position.clamp_to_radius(cfg.target_radius)))
        .collect();

    log::debug!(
        "laid out {} members (scope {:?}, local quantiles {}), scale {:.3}, {} collision iterations",
        positions.len(),
        options.scope,
        options.use_local_quantiles,
        adaptive_scale,
        report.iterations
    );

    LayoutResult { positions, raw, scaled, adaptive_scale, report }
}

/// Depth-first selection of feature-bearing nodes (and leaves) in scope.
fn collect_members<'a>(c: &'a Constellation, options: &LayoutOptions) -> Vec<Member<'a>> {
    let mut out = Vec::new();
    let push_node = move |out: &mut Vec<Member<'a>>, nid: NodeId| {
        let node = c.node(nid);
        if let Some(features) = &node.features {
            out.push(Member { key: &node.key, path: &node.path, features });
        }
    };
    let push_leaves = move |out: &mut Vec<Member<'a>>, nid: NodeId| {
        if !options.include_leaves {
            return;
        }
        for leaf in &c.node(nid).leaves {
            if let Some(features) = &leaf.features {
                out.push(Member { key: &leaf.key, path: &leaf.path, features });
            }
        }
    };

    match &options.scope {
        LayoutScope::Tree => {
            for nid in c.pre_order() {
                push_node(&mut out, nid);
                push_leaves(&mut out, nid);
            }
        }
        LayoutScope::Roots => {
            for &nid in &c.roots {
                push_node(&mut out, nid);
            }
        }
        LayoutScope::Children { parent } => match c.find(parent) {
            Some(node) => {
                for &child in &node.children {
                    push_node(&mut out, child);
                }
                push_leaves(&mut out, node.nid);
            }
            None => log::warn!("layout scope names unknown parent {:?}", parent),
        },
    }
    out
}

/// Quantiles per sibling set, keyed by the shared parent path.
fn local_quantiles<'a>(members: &[Member<'a>], features: &[Feature]) -> BTreeMap<&'a [String], Quantiles> {
    let mut groups: BTreeMap<&'a [String], Vec<&'a FeatureVector>> = BTreeMap::new();
    for m in members {
        groups.entry(m.parent_path()).or_default().push(m.features);
    }
    groups
        .into_iter()
        .map(|(parent, vectors)| (parent, Quantiles::from_vectors(vectors, features)))
        .collect()
}

fn keyed(members: &[Member<'_>], points: &[Position]) -> BTreeMap<String, Position> {
    members
        .iter()
        .zip(points)
        .map(|(m, p)| (m.key.to_string(), *p))
        .collect()
}
