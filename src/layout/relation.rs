// Relationship classes between two laid-out entities, derived from their paths.
//
// The class decides how much room a pair needs:
// - parent/child: one path is the other plus exactly one segment
// - sibling: same parent (same length, all but the last segment equal)
// - unrelated: anything else

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Sibling,
    ParentChild,
    Unrelated,
}

pub fn classify<S: AsRef<str>>(a: &[S], b: &[S]) -> Relation {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shared = short
        .iter()
        .zip(long)
        .take_while(|(x, y)| x.as_ref() == y.as_ref())
        .count();

    if long.len() == short.len() + 1 && shared == short.len() {
        Relation::ParentChild
    } else if a.len() == b.len() && !a.is_empty() && shared + 1 == a.len() {
        Relation::Sibling
    } else {
        Relation::Unrelated
    }
}

/// Minimum center distance per relation class, in layout units.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinDistances {
    #[serde(default = "MinDistances::default_sibling")]
    pub sibling: f64,
    #[serde(default = "MinDistances::default_parent_child")]
    pub parent_child: f64,
    #[serde(default = "MinDistances::default_unrelated")]
    pub unrelated: f64,
}

impl MinDistances {
    fn default_sibling() -> f64 {
        26.0
    }
    fn default_parent_child() -> f64 {
        22.0
    }
    fn default_unrelated() -> f64 {
        16.0
    }

    pub fn uniform(d: f64) -> Self {
        Self { sibling: d, parent_child: d, unrelated: d }
    }

    pub fn for_relation(&self, relation: Relation) -> f64 {
        match relation {
            Relation::Sibling => self.sibling,
            Relation::ParentChild => self.parent_child,
            Relation::Unrelated => self.unrelated,
        }
    }

    /// Largest threshold of any class.
    pub fn max(&self) -> f64 {
        self.sibling.max(self.parent_child).max(self.unrelated)
    }
}

impl Default for MinDistances {
    fn default() -> Self {
        Self {
            sibling: Self::default_sibling(),
            parent_child: Self::default_parent_child(),
            unrelated: Self::default_unrelated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(key: &str) -> Vec<&str> {
        key.split('.').collect()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&p("Rock"), &p("Jazz")), Relation::Sibling);
        assert_eq!(classify(&p("Rock.Punk"), &p("Rock.Grunge")), Relation::Sibling);
        assert_eq!(classify(&p("Rock"), &p("Rock.Punk")), Relation::ParentChild);
        assert_eq!(classify(&p("Rock.Punk.Track"), &p("Rock.Punk")), Relation::ParentChild);
        assert_eq!(classify(&p("Rock"), &p("Rock.Punk.Track")), Relation::Unrelated);
        assert_eq!(classify(&p("Rock.Punk"), &p("Jazz.Bebop")), Relation::Unrelated);
        assert_eq!(classify(&p("Jazz"), &p("Rock.Punk")), Relation::Unrelated);
    }

    #[test]
    fn test_thresholds() {
        let d = MinDistances::default();
        assert_eq!(d.for_relation(Relation::Sibling), 26.0);
        assert_eq!(d.for_relation(Relation::Unrelated), 16.0);
        assert_eq!(d.max(), 26.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let d: MinDistances = serde_json::from_str(r#"{"sibling": 40}"#).unwrap();
        assert_eq!(d.sibling, 40.0);
        assert_eq!(d.parent_child, 22.0);
    }
}
