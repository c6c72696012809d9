//! Server-side wiring for the Recommendation Engine (§4.11): resolves a
//! use-case profile by name, pulls the hard-constraint-filtered candidate
//! set out of the `CatalogStore`, then hands both to
//! `catalog_core::recommend::recommend`, which does the actual scoring.

use catalog_core::error::{CoreError, CoreResult};
use catalog_core::recommend::{recommend as recommend_core, HardConstraints, RecommendationResult, UseCaseProfile};
use catalog_core::types::EquivalenceRule;

use crate::store::{CatalogStore, ProductFilter};

pub async fn recommend_for_use_case(
    store: &dyn CatalogStore,
    use_case_text: &str,
    constraints: HardConstraints,
    profiles: &[UseCaseProfile],
    equivalence_rules: &[EquivalenceRule],
    max_results: usize,
) -> CoreResult<Vec<RecommendationResult>> {
    let profile = catalog_core::recommend::resolve_profile(use_case_text, profiles)
        .ok_or_else(|| CoreError::not_found(format!("no use-case profile matches '{use_case_text}'")))?;

    let filter = ProductFilter {
        brand: constraints.brand.clone(),
        family: constraints.family.clone(),
        capacity_min: constraints.capacity_min,
        capacity_max: constraints.capacity_max,
        certifications: constraints.certifications_required.clone(),
        ..Default::default()
    };
    let candidates = store.list_products(&filter).await?;

    let rule = constraints.family.as_ref().and_then(|family| equivalence_rules.iter().find(|r| &r.family == family));

    Ok(recommend_core(&candidates, profile, &constraints, rule, max_results))
}
