//
// Compile step: Manifest (nested JSON model) -> Constellation (layout-friendly IR)
//
// What this does:
// - Flattens nested NodeAst/LeafAst into indexed vectors with parent pointers
// - Derives dot-joined path keys and depths (dots inside a name are escaped)
// - Enforces global uniqueness of path keys (nodes and leaves share one namespace)
// - Resolves the global quantile table (manifest bands, estimated where absent)
// - Preserves deterministic order: manifest order among siblings

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::Serialize;
use thiserror::Error;

use super::types::{Feature, FeatureVector, LeafAst, Manifest, NodeAst, Quantiles, UnknownFeature};

/// Joins path segments into a node key.
pub const KEY_SEPARATOR: &str = ".";
const KEY_ESCAPE: char = '\\';

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid layout request: {0}")]
    Request(serde_json::Error),
    #[error("duplicate path key: {0}")]
    DuplicateKey(String),
    #[error("invalid name {name:?} under {parent:?}: {reason}")]
    InvalidName {
        parent: String,
        name: String,
        reason: &'static str,
    },
    #[error("the manifest lists no feature axes")]
    NoAxes,
    #[error("feature axis listed twice: {0}")]
    DuplicateAxis(Feature),
    #[error(transparent)]
    UnknownAxis(#[from] UnknownFeature),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// Read-only, flattened view of the manifest tree.
#[derive(Debug, Clone)]
pub struct Constellation {
    pub roots: Vec<NodeId>,
    pub nodes: Vec<Node>,
    /// Global reference quantiles.
    pub quantiles: Quantiles,
    by_key: FxHashMap<String, NodeId>,
    fingerprint: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub nid: NodeId,
    pub name: String,
    pub key: String,
    pub path: Vec<String>,
    pub parent: Option<NodeId>,
    /// Root genres are depth 0.
    pub depth: usize,
    /// None => structural container, never laid out
    pub features: Option<FeatureVector>,
    pub children: Vec<NodeId>,
    pub leaves: Vec<Leaf>,
    /// Stable traversal order index.
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaf {
    pub name: String,
    pub key: String,
    pub path: Vec<String>,
    pub features: Option<FeatureVector>,
}

impl Constellation {
    pub fn node(&self, nid: NodeId) -> &Node {
        &self.nodes[nid.0]
    }

    /// Look a node up by its path key.
    pub fn find(&self, key: &str) -> Option<&Node> {
        self.by_key.get(key).map(|&nid| self.node(nid))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Content hash of keys, feature values and quantiles.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Pre-order traversal: parent before children, manifest order among siblings.
    pub fn pre_order(&self) -> Vec<NodeId> {
        fn dfs(c: &Constellation, nid: NodeId, out: &mut Vec<NodeId>) {
            out.push(nid);
            for &child in &c.node(nid).children {
                dfs(c, child, out);
            }
        }
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            dfs(self, root, &mut out);
        }
        out
    }
}

/// Parse manifest JSON.
pub fn parse_manifest(input: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_str(input)?)
}

pub fn compile(manifest: &Manifest) -> Result<Constellation, ManifestError> {
    let mut ctx = CompileCtx::default();
    for ast in &manifest.tree {
        let nid = ctx.compile_node(ast, None)?;
        ctx.roots.push(nid);
    }
    Ok(ctx.finish(&manifest.config.quantiles))
}

#[derive(Default)]
struct CompileCtx {
    roots: Vec<NodeId>,
    nodes: Vec<Node>,
    by_key: FxHashMap<String, NodeId>,
    leaf_keys: FxHashSet<String>,
}

impl CompileCtx {
    fn finish(self, manifest_quantiles: &Quantiles) -> Constellation {
        // Manifest bands win; anything missing is estimated from the nodes themselves.
        let estimated = Quantiles::from_vectors(
            self.nodes.iter().filter_map(|n| n.features.as_ref()),
            &Feature::ALL,
        );
        let mut quantiles: Quantiles = manifest_quantiles
            .iter()
            .map(|(f, band)| (f, band.ordered()))
            .collect();
        for (f, band) in estimated.iter() {
            if !quantiles.contains(f) {
                quantiles.insert(f, *band);
            }
        }

        let fingerprint = fingerprint(&self.nodes, &quantiles);
        Constellation {
            roots: self.roots,
            nodes: self.nodes,
            quantiles,
            by_key: self.by_key,
            fingerprint,
        }
    }

    fn compile_node(&mut self, ast: &NodeAst, parent: Option<NodeId>) -> Result<NodeId, ManifestError> {
        let parent_path: Vec<String> = parent
            .map(|p| self.nodes[p.0].path.clone())
            .unwrap_or_default();
        let path = child_path(&parent_path, &ast.name)?;
        let key = join_key(&path);
        if self.by_key.contains_key(&key) || self.leaf_keys.contains(&key) {
            return Err(ManifestError::DuplicateKey(key));
        }

        let nid = NodeId(self.nodes.len());
        self.nodes.push(Node {
            nid,
            name: ast.name.clone(),
            key: key.clone(),
            depth: path.len() - 1,
            path,
            parent,
            features: ast.features.clone(),
            children: Vec::new(),
            leaves: Vec::new(),
            order: nid.0,
        });
        self.by_key.insert(key, nid);

        for leaf in &ast.leaves {
            self.compile_leaf(leaf, nid)?;
        }
        for child in &ast.children {
            let cid = self.compile_node(child, Some(nid))?;
            self.nodes[nid.0].children.push(cid);
        }
        Ok(nid)
    }

    fn compile_leaf(&mut self, ast: &LeafAst, parent: NodeId) -> Result<(), ManifestError> {
        let path = child_path(&self.nodes[parent.0].path, &ast.name)?;
        let key = join_key(&path);
        if self.by_key.contains_key(&key) || self.leaf_keys.contains(&key) {
            return Err(ManifestError::DuplicateKey(key));
        }
        self.leaf_keys.insert(key.clone());
        self.nodes[parent.0].leaves.push(Leaf {
            name: ast.name.clone(),
            key,
            path,
            features: ast.features.clone(),
        });
        Ok(())
    }
}

fn child_path(parent: &[String], name: &str) -> Result<Vec<String>, ManifestError> {
    let invalid = |reason| ManifestError::InvalidName {
        parent: join_key(parent),
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let mut path = parent.to_vec();
    path.push(name.to_string());
    Ok(path)
}

/// Segments are escaped so that "Mr. Brightside" cannot collide with a
/// child named " Brightside" under "Mr".
pub fn join_key(path: &[String]) -> String {
    let mut key = String::new();
    for (i, segment) in path.iter().enumerate() {
        if i > 0 {
            key.push_str(KEY_SEPARATOR);
        }
        for ch in segment.chars() {
            if ch == KEY_ESCAPE || KEY_SEPARATOR.contains(ch) {
                key.push(KEY_ESCAPE);
            }
            key.push(ch);
        }
    }
    key
}

fn fingerprint(nodes: &[Node], quantiles: &Quantiles) -> u64 {
    fn hash_features(h: &mut FxHasher, features: Option<&FeatureVector>) {
        match features {
            None => 0u8.hash(h),
            Some(v) => {
                1u8.hash(h);
                for (f, x) in v.iter() {
                    f.hash(h);
                    x.to_bits().hash(h);
                }
            }
        }
    }

    let mut h = FxHasher::default();
    for n in nodes {
        n.key.hash(&mut h);
        n.parent.hash(&mut h);
        hash_features(&mut h, n.features.as_ref());
        for leaf in &n.leaves {
            leaf.key.hash(&mut h);
            hash_features(&mut h, leaf.features.as_ref());
        }
    }
    for (f, band) in quantiles.iter() {
        f.hash(&mut h);
        band.p10.to_bits().hash(&mut h);
        band.p50.to_bits().hash(&mut h);
        band.p90.to_bits().hash(&mut h);
    }
    h.finish()
}
