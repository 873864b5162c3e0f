//! JSON request/response types for the frontend.
//!
//! Everything here is plain Rust returning `Result`, so it runs (and is
//! tested) natively; `wasm.rs` only forwards strings across the boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout::cache::LayoutCache;
use crate::layout::collision::CollisionReport;
use crate::layout::projection::AxisPole;
use crate::layout::{LayoutConfig, LayoutOptions, LayoutOverrides, LayoutResult};
use crate::manifest::{compile, parse_manifest, Constellation, ManifestError};

/// A laid-out node or track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionOutput {
    /// Dot-joined path key, e.g. "Rock.Punk".
    pub key: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
}

/// The combined output sent to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutOutput {
    /// In key order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<PositionOutput>,
    /// Label ring: high poles, then low poles.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub axes: Vec<AxisPole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CollisionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl LayoutOutput {
    pub fn from_error(e: &impl fmt::Display) -> Self {
        Self {
            error: Some(ErrorInfo { message: e.to_string() }),
            ..Self::default()
        }
    }

    fn from_result(result: LayoutResult, axes: Vec<AxisPole>) -> Self {
        let positions = result
            .positions
            .into_iter()
            .map(|(key, p)| PositionOutput { key, x: p.x, y: p.y })
            .collect();
        Self { positions, axes, report: Some(result.report), error: None }
    }
}

/// What the frontend asks for. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutRequest {
    #[serde(flatten)]
    pub options: LayoutOptions,
    pub overrides: LayoutOverrides,
}

impl LayoutRequest {
    /// Blank input means the default request.
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(input).map_err(ManifestError::Request)
    }
}

/// Manifest JSON -> compiled constellation plus its layout config.
pub fn load_manifest(manifest_json: &str) -> Result<(Constellation, LayoutConfig), ManifestError> {
    let manifest = parse_manifest(manifest_json)?;
    let cfg = LayoutConfig::from_manifest(&manifest.config)?;
    let constellation = compile(&manifest)?;
    log::debug!(
        "loaded manifest: {} nodes, {} roots, {} quantile bands",
        constellation.len(),
        constellation.roots.len(),
        constellation.quantiles.len()
    );
    Ok((constellation, cfg))
}

/// One-shot layout: parse, compile, configure, lay out.
pub fn build_layout(manifest_json: &str, request_json: &str) -> Result<LayoutOutput, ManifestError> {
    let (constellation, cfg) = load_manifest(manifest_json)?;
    let request = LayoutRequest::parse(request_json)?;
    Ok(run(&constellation, cfg, &request, None))
}

/// Just the label ring for a manifest's axes.
pub fn build_axis_ring(manifest_json: &str) -> Result<Vec<AxisPole>, ManifestError> {
    let manifest = parse_manifest(manifest_json)?;
    Ok(LayoutConfig::from_manifest(&manifest.config)?.axis_ring(None))
}

fn run(
    constellation: &Constellation,
    mut cfg: LayoutConfig,
    request: &LayoutRequest,
    cache: Option<&mut LayoutCache>,
) -> LayoutOutput {
    request.overrides.apply(&mut cfg);
    let result = match cache {
        Some(cache) => cache.get_or_compute(constellation, &cfg, &request.options),
        None => crate::layout::layout(constellation, &cfg, &request.options),
    };
    let axes = cfg.axis_ring(request.options.enabled_features.as_ref());
    LayoutOutput::from_result(result, axes)
}

/// A loaded manifest kept across requests, with a result cache.
#[derive(Debug)]
pub struct LayoutSession {
    loaded: Option<(Constellation, LayoutConfig)>,
    cache: LayoutCache,
}

impl LayoutSession {
    pub fn new(cache_capacity: usize) -> Self {
        Self { loaded: None, cache: LayoutCache::new(cache_capacity) }
    }

    /// Replace the current manifest. On error the previous one stays loaded.
    pub fn load(&mut self, manifest_json: &str) -> Result<(), ManifestError> {
        self.loaded = Some(load_manifest(manifest_json)?);
        self.cache.invalidate_all();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Lay out the loaded manifest; empty output before the first load.
    pub fn layout(&mut self, request_json: &str) -> Result<LayoutOutput, ManifestError> {
        let request = LayoutRequest::parse(request_json)?;
        let Some((constellation, cfg)) = &self.loaded else {
            log::warn!("layout requested before a manifest was loaded");
            return Ok(LayoutOutput::default());
        };
        Ok(run(constellation, cfg.clone(), &request, Some(&mut self.cache)))
    }

    pub fn cache(&self) -> &LayoutCache {
        &self.cache
    }
}
