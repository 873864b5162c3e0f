//! Feature-space layout for the genre constellation map.
//!
//! Genres, subgenres and seed tracks are placed on a 2D canvas from their
//! audio features: each feature owns an angular axis, a node's position is
//! the vector sum of its percentile deviations, and overlaps are relaxed along
//! the node's own dominant axis so the map stays readable.

pub mod layout;
pub mod manifest;
pub mod output;
mod wasm;

pub use layout::cache::{LayoutCache, LayoutCacheStats};
pub use layout::collision::CollisionReport;
pub use layout::contrast::{ContrastCurve, ContrastPolicy};
pub use layout::projection::{AxisPole, Pole};
pub use layout::relation::MinDistances;
pub use layout::{
    layout, LayoutConfig, LayoutOptions, LayoutOverrides, LayoutResult, LayoutScope, Position,
};
pub use manifest::{compile, parse_manifest, Constellation, Feature, FeatureVector, ManifestError, QuantileBand, Quantiles};
pub use output::{build_axis_ring, build_layout, LayoutOutput, LayoutRequest, LayoutSession};
pub use wasm::{axis_ring, compute_layout, init_logging, ConstellationSession};
