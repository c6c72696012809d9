//! Reciprocal Rank Fusion (§4.10 step 5, GLOSSARY): `score(d) = Σ 1/(k +
//! rank_d)` across sub-rankings, `k=60` by default.

use std::collections::HashMap;
use std::hash::Hash;

pub const DEFAULT_K: f64 = 60.0;

/// Fuse any number of rankings (each a list of document ids in rank order,
/// best first) into a single score-ordered list.
///
/// §8 invariant 5: a document that ranks first in every sub-ranking ranks
/// first in the fused ranking, and ties are broken stably (by first
/// appearance order across rankings) rather than arbitrarily.
pub fn fuse<D: Eq + Hash + Clone>(rankings: &[Vec<D>], k: f64) -> Vec<(D, f64)> {
    let mut scores: HashMap<D, f64> = HashMap::new();
    let mut first_seen: HashMap<D, usize> = HashMap::new();
    let mut order_counter = 0usize;

    for ranking in rankings {
        for (rank, doc) in ranking.iter().enumerate() {
            let contribution = 1.0 / (k + (rank + 1) as f64);
            *scores.entry(doc.clone()).or_insert(0.0) += contribution;
            first_seen.entry(doc.clone()).or_insert_with(|| {
                let seen = order_counter;
                order_counter += 1;
                seen
            });
        }
    }

    let mut fused: Vec<(D, f64)> = scores.into_iter().collect();
    fused.sort_by(|(doc_a, score_a), (doc_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| first_seen[doc_a].cmp(&first_seen[doc_b]))
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_first_in_both_rankings_ranks_first() {
        let vector = vec!["a", "b", "c"];
        let lexical = vec!["a", "c", "b"];
        let fused = fuse(&[vector, lexical], DEFAULT_K);
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn fused_ranks_are_stable_under_tie() {
        let vector = vec!["a", "b"];
        let lexical = vec!["b", "a"];
        let fused = fuse(&[vector, lexical], DEFAULT_K);
        // both get the same total score (1/(k+1) + 1/(k+2) each); ties
        // break by first-appearance order, so "a" (seen first overall) wins.
        assert!((fused[0].1 - fused[1].1).abs() < 1e-12);
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn document_present_in_only_one_ranking_still_scores() {
        let vector = vec!["a"];
        let lexical: Vec<&str> = vec![];
        let fused = fuse(&[vector, lexical], DEFAULT_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].0, "a");
    }
}
