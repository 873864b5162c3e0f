mod types;
pub mod compile;

pub use compile::{
    compile, join_key, parse_manifest, Constellation, Leaf, ManifestError, Node, NodeId,
    KEY_SEPARATOR,
};
pub use types::*;
