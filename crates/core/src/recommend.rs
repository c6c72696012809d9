//! Recommendation Engine (§4.11): use-case profile + hard constraints ->
//! weighted-score-ranked products.

use std::collections::BTreeMap;

use crate::equivalence::priority_rank;
use crate::types::{EquivalenceRule, Product, SpecValue};

#[derive(Debug, Clone)]
pub struct TargetBand {
    pub min: f64,
    pub max: f64,
}

impl TargetBand {
    fn width(&self) -> f64 {
        (self.max - self.min).abs()
    }

    /// `1.0` inside the band, decaying linearly to `0.0` at twice the band
    /// width from the nearer edge (§4.11 step 2).
    fn feature(&self, value: f64) -> f64 {
        if value >= self.min && value <= self.max {
            return 1.0;
        }
        let distance = if value < self.min { self.min - value } else { value - self.max };
        let width = self.width().max(f64::EPSILON);
        (1.0 - distance / width).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct SpecWeight {
    pub spec_name: String,
    pub weight: f64,
    pub target_band: TargetBand,
    /// Required specs score `0.0` (not skipped) when missing.
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct UseCaseProfile {
    pub name: String,
    pub synonyms: Vec<String>,
    pub weights: Vec<SpecWeight>,
}

/// Resolve a free-text use-case description to a profile by keyword
/// matching over profile synonyms (§4.11).
pub fn resolve_profile<'a>(text: &str, profiles: &'a [UseCaseProfile]) -> Option<&'a UseCaseProfile> {
    let lower = text.to_lowercase();
    profiles
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(text) || p.synonyms.iter().any(|s| lower.contains(&s.to_lowercase())))
}

#[derive(Debug, Clone)]
pub struct HardConstraints {
    pub capacity_min: Option<f64>,
    pub capacity_max: Option<f64>,
    pub certifications_required: Vec<String>,
    pub brand: Option<String>,
    pub family: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub spec_name: String,
    pub contribution: f64,
}

#[derive(Debug, Clone)]
pub struct RecommendationResult {
    pub product_id: uuid::Uuid,
    pub score: f64,
    pub breakdown: Vec<ScoreBreakdown>,
}

/// §4.11 step 1: hard constraints as predicates.
pub fn passes_constraints(product: &Product, constraints: &HardConstraints) -> bool {
    if let Some(min) = constraints.capacity_min {
        if product.fixed.capacity_cuft.map(|c| c < min).unwrap_or(true) {
            return false;
        }
    }
    if let Some(max) = constraints.capacity_max {
        if product.fixed.capacity_cuft.map(|c| c > max).unwrap_or(true) {
            return false;
        }
    }
    if let Some(brand) = &constraints.brand {
        if !product.brand.eq_ignore_ascii_case(brand) {
            return false;
        }
    }
    if let Some(family) = &constraints.family {
        if !product.family.eq_ignore_ascii_case(family) {
            return false;
        }
    }
    for cert in &constraints.certifications_required {
        if !product.certifications.iter().any(|c| c.eq_ignore_ascii_case(cert)) {
            return false;
        }
    }
    true
}

/// §4.11 step 2: weighted feature scoring against the profile's target bands.
pub fn score_product(product: &Product, profile: &UseCaseProfile) -> (f64, Vec<ScoreBreakdown>) {
    let mut total = 0.0;
    let mut breakdown = Vec::new();
    for spec_weight in &profile.weights {
        let value = product.specs.get(&spec_weight.spec_name).and_then(|v| v.as_numeric());
        let feature = match value {
            Some(v) => spec_weight.target_band.feature(v),
            None => 0.0,
        };
        let contribution = spec_weight.weight * feature;
        total += contribution;
        breakdown.push(ScoreBreakdown { spec_name: spec_weight.spec_name.clone(), contribution });
    }
    (total, breakdown)
}

/// Top-level orchestration of §4.11: filter, score, tie-break, truncate.
pub fn recommend(
    products: &[Product],
    profile: &UseCaseProfile,
    constraints: &HardConstraints,
    equivalence_rule: Option<&EquivalenceRule>,
    max_results: usize,
) -> Vec<RecommendationResult> {
    let mut candidates: Vec<(&Product, f64, Vec<ScoreBreakdown>)> = products
        .iter()
        .filter(|p| passes_constraints(p, constraints))
        .map(|p| {
            let (score, breakdown) = score_product(p, profile);
            (p, score, breakdown)
        })
        .collect();

    candidates.sort_by(|(a, score_a, _), (b, score_b, _)| {
        score_b.partial_cmp(score_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| {
            match equivalence_rule {
                Some(rule) => {
                    let rank_a = priority_rank(rule, &a.specs);
                    let rank_b = priority_rank(rule, &b.specs);
                    rank_b.partial_cmp(&rank_a).unwrap_or(std::cmp::Ordering::Equal)
                }
                None => std::cmp::Ordering::Equal,
            }
        })
    });

    candidates
        .into_iter()
        .take(max_results)
        .map(|(p, score, breakdown)| RecommendationResult { product_id: p.id, score, breakdown })
        .collect()
}

pub const DEFAULT_MAX_RESULTS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixedColumns;
    use std::collections::BTreeSet;

    fn product_with(capacity: f64, uniformity: f64, certs: &[&str]) -> Product {
        let mut p = Product::new("ABT-HC-26S", "ABS", "refrigerator");
        p.fixed = FixedColumns { capacity_cuft: Some(capacity), ..Default::default() };
        p.specs.insert("uniformity_c".to_string(), SpecValue::Numeric { value: uniformity, unit: Some("c".into()) });
        p.certifications = certs.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>();
        p
    }

    fn vaccine_profile() -> UseCaseProfile {
        UseCaseProfile {
            name: "vaccine_storage".into(),
            synonyms: vec!["vaccine".into(), "vaccination".into()],
            weights: vec![SpecWeight {
                spec_name: "uniformity_c".into(),
                weight: 0.25,
                target_band: TargetBand { min: 0.0, max: 1.5 },
                required: true,
            }],
        }
    }

    #[test]
    fn recommend_by_use_case_spec_scenario() {
        let a = product_with(14.8, 1.0, &["NSF/ANSI 456"]);
        let b = product_with(15.0, 2.0, &[]);
        let constraints = HardConstraints {
            capacity_min: Some(10.0),
            capacity_max: Some(20.0),
            certifications_required: vec!["NSF/ANSI 456".to_string()],
            brand: None,
            family: None,
        };
        let results = recommend(&[a.clone(), b], &vaccine_profile(), &constraints, None, DEFAULT_MAX_RESULTS);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_id, a.id);
        assert!(results[0].breakdown[0].contribution > 0.0);
    }

    #[test]
    fn empty_result_on_impossible_constraints() {
        let a = product_with(14.8, 1.0, &[]);
        let constraints = HardConstraints {
            capacity_min: Some(100.0),
            capacity_max: None,
            certifications_required: vec![],
            brand: None,
            family: None,
        };
        let results = recommend(&[a], &vaccine_profile(), &constraints, None, DEFAULT_MAX_RESULTS);
        assert!(results.is_empty());
    }

    #[test]
    fn target_band_decays_linearly_to_zero_at_twice_width() {
        let band = TargetBand { min: 0.0, max: 1.5 };
        assert_eq!(band.feature(0.75), 1.0);
        assert!((band.feature(3.0) - 0.0).abs() < 1e-9);
        assert!((band.feature(2.25) - 0.5).abs() < 1e-9);
    }
}
