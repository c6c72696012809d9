//! Model Resolver (§4.3): text + brand hint -> model candidates, decoded
//! from the Model Pattern table by priority-ordered regex.

use std::collections::BTreeMap;

use crate::types::{ModelPattern, SpecValue};

#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model_number: String,
    pub family: String,
    pub product_line: Option<String>,
    pub controller_tier: Option<String>,
    pub decoded_fields: BTreeMap<String, SpecValue>,
    /// Set when the decoded family conflicts with the pattern's own family
    /// for a spec already scoped in the Registry (§4.3 edge policy) — a
    /// warning, not a rejection.
    pub warning: Option<String>,
}

/// Resolve all model candidates. Patterns are tried in descending priority;
/// the first match per distinct `model_number` wins and later patterns never
/// overwrite it.
pub fn resolve_models(text: &str, brand_hint: Option<&str>, patterns: &[ModelPattern]) -> Vec<ResolvedModel> {
    let mut ordered: Vec<&ModelPattern> = patterns
        .iter()
        .filter(|p| p.active)
        .filter(|p| brand_hint.map(|b| b.eq_ignore_ascii_case(&p.brand)).unwrap_or(true))
        .collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut seen_models: BTreeMap<String, ()> = BTreeMap::new();
    let mut resolved = Vec::new();

    for pattern in ordered {
        let Ok(re) = regex::Regex::new(&pattern.pattern_regex) else { continue };
        for caps in re.captures_iter(text) {
            let Some(model_number) = caps.get(0).map(|m| m.as_str().to_string()) else { continue };
            if seen_models.contains_key(&model_number) {
                continue;
            }
            seen_models.insert(model_number.clone(), ());

            let mut decoded_fields = BTreeMap::new();
            for (&group_idx, canonical_name) in pattern.field_map.iter() {
                let Some(captured) = caps.get(group_idx).map(|m| m.as_str().to_string()) else { continue };
                let value = match pattern.value_map.get(&group_idx).and_then(|vm| vm.get(&captured)) {
                    Some(mapped) => SpecValue::Enum(mapped.clone()),
                    None => SpecValue::Text(captured),
                };
                decoded_fields.insert(canonical_name.clone(), value);
            }

            resolved.push(ResolvedModel {
                model_number,
                family: pattern.family.clone(),
                product_line: pattern.product_line.clone(),
                controller_tier: pattern.controller_tier.clone(),
                decoded_fields,
                warning: None,
            });
        }
    }
    resolved
}

/// §4.3 edge policy: if the decoded family conflicts with a family already
/// on record for the model number, attach a warning rather than rejecting.
pub fn check_family_conflict(resolved: &mut ResolvedModel, existing_family: Option<&str>) {
    if let Some(existing) = existing_family {
        if existing != resolved.family {
            resolved.warning = Some(format!(
                "decoded family '{}' conflicts with existing family '{existing}' for model '{}'",
                resolved.family, resolved.model_number
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(regex: &str, family: &str, priority: i32) -> ModelPattern {
        ModelPattern {
            id: uuid::Uuid::new_v4(),
            brand: "ABS".into(),
            pattern_regex: regex.into(),
            family: family.into(),
            product_line: Some("Premier".into()),
            controller_tier: None,
            field_map: BTreeMap::new(),
            value_map: BTreeMap::new(),
            priority,
            active: true,
        }
    }

    #[test]
    fn higher_priority_pattern_wins_for_same_model() {
        let patterns = vec![pattern(r"ABT-HC-\d+S", "refrigerator", 5), pattern(r"ABT-HC-\d+S", "freezer", 10)];
        let resolved = resolve_models("Model ABT-HC-26S is great", None, &patterns);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].family, "freezer");
    }

    #[test]
    fn brand_hint_filters_out_non_matching_patterns() {
        let mut p = pattern(r"ABT-HC-\d+S", "refrigerator", 1);
        p.brand = "Helmer".into();
        let resolved = resolve_models("ABT-HC-26S", Some("ABS"), std::slice::from_ref(&p));
        assert!(resolved.is_empty());
    }

    #[test]
    fn family_conflict_is_a_warning_not_a_rejection() {
        let patterns = vec![pattern(r"ABT-HC-\d+S", "refrigerator", 1)];
        let mut resolved = resolve_models("ABT-HC-26S", None, &patterns);
        check_family_conflict(&mut resolved[0], Some("freezer"));
        assert!(resolved[0].warning.is_some());
        assert_eq!(resolved[0].family, "refrigerator");
    }
}
