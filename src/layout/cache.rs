//! Memoization of whole layout results.
//!
//! Layout is pure, so identical (constellation, config, options) triples always
//! produce identical results. A UI that re-requests the same view while
//! panning or toggling back and forth can keep a [`LayoutCache`] next to its
//! constellation and skip the recomputation.
//!
//! # Invalidation
//!
//! The constellation fingerprint is part of the key, so loading a new manifest
//! never returns a stale result. [`LayoutCache::invalidate_all`] is there for
//! callers that want to drop memory eagerly.
//!
//! # Eviction
//!
//! Least recently used entry first, tracked by a monotonic access tick.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use super::{layout, LayoutConfig, LayoutOptions, LayoutResult};
use crate::manifest::Constellation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayoutCacheKey {
    pub constellation: u64,
    pub config: u64,
    pub options: u64,
}

impl LayoutCacheKey {
    pub fn new(constellation: &Constellation, cfg: &LayoutConfig, options: &LayoutOptions) -> Self {
        let mut h = FxHasher::default();
        options.hash(&mut h);
        Self {
            constellation: constellation.fingerprint(),
            config: hash_config(cfg),
            options: h.finish(),
        }
    }
}

fn hash_config(cfg: &LayoutConfig) -> u64 {
    let mut h = FxHasher::default();
    cfg.features.hash(&mut h);
    cfg.exaggeration.to_bits().hash(&mut h);
    cfg.depth_exaggeration.len().hash(&mut h);
    for m in &cfg.depth_exaggeration {
        m.to_bits().hash(&mut h);
    }
    cfg.projection_scale.to_bits().hash(&mut h);
    cfg.target_radius.to_bits().hash(&mut h);
    cfg.min_distance.sibling.to_bits().hash(&mut h);
    cfg.min_distance.parent_child.to_bits().hash(&mut h);
    cfg.min_distance.unrelated.to_bits().hash(&mut h);
    cfg.push_strength.to_bits().hash(&mut h);
    cfg.damping.to_bits().hash(&mut h);
    cfg.max_iterations.hash(&mut h);
    for (feature, curve) in cfg.contrast.iter() {
        feature.hash(&mut h);
        std::mem::discriminant(&curve).hash(&mut h);
        if let super::contrast::ContrastCurve::Gamma { gamma } = curve {
            gamma.to_bits().hash(&mut h);
        }
    }
    h.finish()
}

#[derive(Debug, Clone)]
struct CachedLayout {
    result: LayoutResult,
    generation: u64,
    last_access: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct LayoutCache {
    entries: FxHashMap<LayoutCacheKey, CachedLayout>,
    generation: u64,
    tick: u64,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    /// A capacity of 0 disables caching; every call recomputes.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            generation: 0,
            tick: 0,
            max_entries,
            hits: 0,
            misses: 0,
        }
    }

    /// Cached result for this triple, computing and storing it on a miss.
    pub fn get_or_compute(
        &mut self,
        constellation: &Constellation,
        cfg: &LayoutConfig,
        options: &LayoutOptions,
    ) -> LayoutResult {
        let key = LayoutCacheKey::new(constellation, cfg, options);
        self.tick += 1;

        if let Some(entry) = self.entries.get_mut(&key)
            && entry.generation == self.generation
        {
            self.hits += 1;
            entry.last_access = self.tick;
            return entry.result.clone();
        }

        self.misses += 1;
        let result = layout(constellation, cfg, options);
        if self.max_entries == 0 {
            return result;
        }

        // drop stale generations before evicting live entries
        let generation = self.generation;
        self.entries.retain(|_, e| e.generation == generation);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CachedLayout { result: result.clone(), generation, last_access: self.tick },
        );
        result
    }

    /// Make every stored entry stale.
    pub fn invalidate_all(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.generation == self.generation).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> LayoutCacheStats {
        LayoutCacheStats { entries: self.len(), hits: self.hits, misses: self.misses }
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| *k);
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutScope;
    use crate::manifest::{compile, parse_manifest};

    fn constellation(energy: f64) -> Constellation {
        let json = format!(
            r#"{{"tree": [
                {{"name": "Rock", "features": {{"energy": {energy}, "valence": 0.4}}}},
                {{"name": "Jazz", "features": {{"energy": 0.3, "valence": 0.6}}}}
            ]}}"#
        );
        compile(&parse_manifest(&json).unwrap()).unwrap()
    }

    #[test]
    fn test_hit_returns_same_result() {
        let c = constellation(0.8);
        let cfg = LayoutConfig::default();
        let opts = LayoutOptions::default();
        let mut cache = LayoutCache::new(4);

        let first = cache.get_or_compute(&c, &cfg, &opts);
        let second = cache.get_or_compute(&c, &cfg, &opts);
        assert_eq!(first, second);
        assert_eq!(first, layout(&c, &cfg, &opts));
        assert_eq!(cache.stats(), LayoutCacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_key_covers_all_inputs() {
        let c = constellation(0.8);
        let cfg = LayoutConfig::default();
        let opts = LayoutOptions::default();
        let base = LayoutCacheKey::new(&c, &cfg, &opts);

        assert_ne!(base, LayoutCacheKey::new(&constellation(0.9), &cfg, &opts));
        let wider = LayoutConfig { target_radius: 300.0, ..cfg.clone() };
        assert_ne!(base, LayoutCacheKey::new(&c, &wider, &opts));
        let mut contrast = cfg.clone();
        contrast.contrast.set_gamma(3.0);
        assert_ne!(base, LayoutCacheKey::new(&c, &contrast, &opts));
        let roots = LayoutOptions { scope: LayoutScope::Roots, ..opts.clone() };
        assert_ne!(base, LayoutCacheKey::new(&c, &cfg, &roots));
        assert_eq!(base, LayoutCacheKey::new(&constellation(0.8), &cfg.clone(), &opts.clone()));
    }

    #[test]
    fn test_lru_eviction() {
        let c = constellation(0.8);
        let opts = LayoutOptions::default();
        let radius = |r: f64| LayoutConfig { target_radius: r, ..LayoutConfig::default() };
        let mut cache = LayoutCache::new(2);

        cache.get_or_compute(&c, &radius(100.0), &opts);
        cache.get_or_compute(&c, &radius(200.0), &opts);
        // touch 100 so 200 becomes the oldest
        cache.get_or_compute(&c, &radius(100.0), &opts);
        cache.get_or_compute(&c, &radius(300.0), &opts);
        assert_eq!(cache.len(), 2);

        let misses = cache.stats().misses;
        cache.get_or_compute(&c, &radius(100.0), &opts);
        assert_eq!(cache.stats().misses, misses);
        cache.get_or_compute(&c, &radius(200.0), &opts);
        assert_eq!(cache.stats().misses, misses + 1);
    }

    #[test]
    fn test_invalidate_all() {
        let c = constellation(0.8);
        let cfg = LayoutConfig::default();
        let opts = LayoutOptions::default();
        let mut cache = LayoutCache::new(4);

        cache.get_or_compute(&c, &cfg, &opts);
        cache.invalidate_all();
        assert!(cache.is_empty());
        cache.get_or_compute(&c, &cfg, &opts);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let c = constellation(0.8);
        let mut cache = LayoutCache::new(0);
        cache.get_or_compute(&c, &LayoutConfig::default(), &LayoutOptions::default());
        cache.get_or_compute(&c, &LayoutConfig::default(), &LayoutOptions::default());
        assert_eq!(cache.stats(), LayoutCacheStats { entries: 0, hits: 0, misses: 2 });
    }

    #[test]
    fn test_huge_capacity_is_only_a_limit() {
        let c = constellation(0.8);
        let cfg = LayoutConfig::default();
        let opts = LayoutOptions::default();
        let mut cache = LayoutCache::new(usize::MAX);
        assert!(cache.is_empty());

        cache.get_or_compute(&c, &cfg, &opts);
        cache.get_or_compute(&c, &cfg, &opts);
        assert_eq!(cache.stats(), LayoutCacheStats { entries: 1, hits: 1, misses: 1 });
    }
}
