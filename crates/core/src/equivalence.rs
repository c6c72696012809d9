//! Equivalence Rules (§3, §4.11 tie-break, §9 graph cycles): per-family
//! tolerance overrides and tie-break ordering, plus the bounded-depth
//! relationship-graph traversal used by "equivalents-of".

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::conflict::DEFAULT_TOLERANCE;
use crate::types::{EquivalenceRule, Product, ProductRelationship, RelationshipKind};

/// Per-spec tolerance for a family, falling back to the 5% default (§9).
pub fn tolerance_for(rule: Option<&EquivalenceRule>, spec_name: &str) -> f64 {
    rule.and_then(|r| r.tolerance_map.get(spec_name)).copied().unwrap_or(DEFAULT_TOLERANCE)
}

fn spec_equal(a: &crate::types::SpecValue, b: &crate::types::SpecValue, tolerance: f64) -> bool {
    match (a, b) {
        (crate::types::SpecValue::Numeric { value: x, .. }, crate::types::SpecValue::Numeric { value: y, .. }) => {
            let denom = x.abs().max(y.abs()).max(f64::EPSILON);
            (x - y).abs() / denom <= tolerance
        }
        (crate::types::SpecValue::Text(x), crate::types::SpecValue::Text(y)) => x.eq_ignore_ascii_case(y),
        (crate::types::SpecValue::Enum(x), crate::types::SpecValue::Enum(y)) => x.eq_ignore_ascii_case(y),
        (crate::types::SpecValue::Boolean(x), crate::types::SpecValue::Boolean(y)) => x == y,
        _ => false,
    }
}

/// Two products are equivalent (§3, §4.11 step 3, §9 graph cycles) when they
/// share a family and agree, within the rule's per-spec tolerance, on every
/// `required_match` spec. Products missing a required spec are never
/// equivalent to anything.
pub fn are_equivalent(a: &Product, b: &Product, rule: &EquivalenceRule) -> bool {
    if a.id == b.id || a.family != b.family || a.family != rule.family {
        return false;
    }
    rule.required_match.iter().all(|spec_name| {
        let tolerance = tolerance_for(Some(rule), spec_name);
        match (a.specs.get(spec_name), b.specs.get(spec_name)) {
            (Some(x), Some(y)) => spec_equal(x, y, tolerance),
            _ => false,
        }
    })
}

/// Comparator for tie-breaking near-equivalent candidates by priority spec
/// order (§4.11 step 3): products whose priority specs appear earlier in
/// `priority_specs` with higher values sort first.
pub fn priority_rank(rule: &EquivalenceRule, specs: &BTreeMap<String, crate::types::SpecValue>) -> Vec<f64> {
    rule.priority_specs
        .iter()
        .map(|name| specs.get(name).and_then(|v| v.as_numeric()).unwrap_or(f64::MIN))
        .collect()
}

/// Directed edge index over Product Relationships, mirroring the
/// forward/reverse adjacency pattern used elsewhere for graph traversal.
#[derive(Default)]
pub struct RelationshipGraph {
    edges: Vec<ProductRelationship>,
    by_source: HashMap<uuid::Uuid, Vec<usize>>,
    by_target: HashMap<uuid::Uuid, Vec<usize>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rel: ProductRelationship) {
        let idx = self.edges.len();
        self.by_source.entry(rel.source).or_default().push(idx);
        if rel.kind.is_symmetric() {
            self.by_target.entry(rel.source).or_default().push(idx);
            self.by_source.entry(rel.target).or_default().push(idx);
        }
        self.by_target.entry(rel.target).or_default().push(idx);
        self.edges.push(rel);
    }

    /// Bounded-depth traversal of "equivalents of" a product (§9): follows
    /// `equivalent_to`/`compatible_with` edges (symmetric, so BFS over the
    /// undirected view), detecting cycles explicitly via a visited set.
    pub fn equivalents_of(&self, product_id: uuid::Uuid, max_depth: usize) -> Vec<uuid::Uuid> {
        let mut visited: HashSet<uuid::Uuid> = HashSet::from([product_id]);
        let mut frontier = vec![product_id];
        let mut result = Vec::new();

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for node in &frontier {
                for &idx in self.by_source.get(node).into_iter().flatten() {
                    let edge = &self.edges[idx];
                    if !matches!(edge.kind, RelationshipKind::EquivalentTo | RelationshipKind::CompatibleWith) {
                        continue;
                    }
                    let neighbor = if edge.source == *node { edge.target } else { edge.source };
                    if visited.insert(neighbor) {
                        result.push(neighbor);
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn equivalents_of_respects_depth_bound() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();
        let mut g = RelationshipGraph::new();
        g.push(ProductRelationship { source: a, target: b, kind: RelationshipKind::EquivalentTo, confidence: 1.0, auto_detected: false });
        g.push(ProductRelationship { source: b, target: c, kind: RelationshipKind::EquivalentTo, confidence: 1.0, auto_detected: false });
        g.push(ProductRelationship { source: c, target: d, kind: RelationshipKind::EquivalentTo, confidence: 1.0, auto_detected: false });

        let depth_1 = g.equivalents_of(a, 1);
        assert_eq!(depth_1, vec![b]);
        let depth_3 = g.equivalents_of(a, 3);
        assert_eq!(depth_3.len(), 3);
    }

    #[test]
    fn equivalence_requires_every_required_match_spec_to_agree() {
        use crate::types::SpecValue;
        use std::collections::{BTreeMap, BTreeSet};

        let rule = EquivalenceRule {
            family: "refrigerator".into(),
            required_match: BTreeSet::from(["refrigerant".to_string()]),
            tolerance_map: BTreeMap::new(),
            priority_specs: vec![],
        };
        let mut a = Product::new("ABT-HC-26S", "ABS", "refrigerator");
        a.specs.insert("refrigerant".into(), SpecValue::Text("R290".into()));
        let mut b = Product::new("ABT-HC-26G", "ABS", "refrigerator");
        b.specs.insert("refrigerant".into(), SpecValue::Text("r290".into()));
        assert!(are_equivalent(&a, &b, &rule));

        let mut c = Product::new("ABT-HC-26SG", "ABS", "refrigerator");
        c.specs.insert("refrigerant".into(), SpecValue::Text("R404A".into()));
        assert!(!are_equivalent(&a, &c, &rule));
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut g = RelationshipGraph::new();
        g.push(ProductRelationship { source: a, target: b, kind: RelationshipKind::EquivalentTo, confidence: 1.0, auto_detected: false });
        g.push(ProductRelationship { source: b, target: a, kind: RelationshipKind::EquivalentTo, confidence: 1.0, auto_detected: false });
        let result = g.equivalents_of(a, 5);
        assert_eq!(result, vec![b]);
    }
}
