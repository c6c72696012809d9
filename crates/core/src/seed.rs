//! Curated, static catalog data (§3: Brand and Family are "static,
//! curated"): the starter Spec Registry, Model Pattern table, Equivalence
//! Rules and Recommendation profiles a fresh deployment boots with.

use std::collections::{BTreeMap, BTreeSet};

use crate::recommend::{SpecWeight, TargetBand, UseCaseProfile};
use crate::registry::SpecRegistry;
use crate::types::{
    AllowedValues, Brand, DataType, EquivalenceRule, Family, ModelPattern, SpecRegistryEntry, SuperCategory, UnitConversion,
    UnitSystem,
};

pub fn default_brands() -> Vec<Brand> {
    vec![
        Brand { code: "ABS".into(), name: "American BioTech Supply".into(), parent_org: Some("AGEM".into()), is_active: true },
        Brand { code: "HELMER".into(), name: "Helmer Scientific".into(), parent_org: None, is_active: true },
        Brand { code: "THERMOFISHER".into(), name: "Thermo Fisher Scientific".into(), parent_org: None, is_active: true },
    ]
}

pub fn default_families() -> Vec<Family> {
    vec![
        Family { code: "refrigerator".into(), super_category: SuperCategory::Refrigerator },
        Family { code: "freezer".into(), super_category: SuperCategory::Freezer },
        Family { code: "cryogenic".into(), super_category: SuperCategory::Cryogenic },
        Family { code: "accessory".into(), super_category: SuperCategory::Accessory },
    ]
}

fn entry(canonical_name: &str, display_name: &str, data_type: DataType, unit: Option<&str>, is_critical: bool) -> SpecRegistryEntry {
    SpecRegistryEntry {
        canonical_name: canonical_name.to_string(),
        display_name: display_name.to_string(),
        data_type,
        unit: unit.map(|u| u.to_string()),
        unit_system: if unit.is_some() { UnitSystem::Imperial } else { UnitSystem::None },
        family_scope: BTreeSet::new(),
        synonyms: BTreeSet::new(),
        unit_conversions: BTreeMap::new(),
        allowed_values: AllowedValues::default(),
        is_filterable: true,
        is_comparable: true,
        is_searchable: true,
        is_critical,
        sort_order: 0,
        auto_discovered: false,
        approved: true,
    }
}

fn with_synonyms(mut e: SpecRegistryEntry, synonyms: &[&str]) -> SpecRegistryEntry {
    e.synonyms = synonyms.iter().map(|s| s.to_string()).collect();
    e
}

fn with_conversions(mut e: SpecRegistryEntry, conversions: &[(&str, UnitConversion)]) -> SpecRegistryEntry {
    e.unit_conversions = conversions.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    e
}

/// Build a fresh registry seeded with the universal fixed-column specs
/// (§3 FixedColumns) plus the ones the §8 end-to-end scenarios exercise.
pub fn seed_registry() -> SpecRegistry {
    let registry = SpecRegistry::new();

    registry.seed(with_synonyms(
        entry("storage_capacity_cuft", "Storage Capacity", DataType::Numeric, Some("cuft"), true),
        &["capacity", "storage capacity", "net capacity"],
    ));
    registry.seed(with_conversions(
        with_synonyms(
            entry("temp_range_min_c", "Minimum Temperature", DataType::Numeric, Some("c"), true),
            &["min temp", "temperature min", "temp min"],
        ),
        &[("f", UnitConversion::Named("convert_f_to_c".into()))],
    ));
    registry.seed(with_conversions(
        with_synonyms(
            entry("temp_range_max_c", "Maximum Temperature", DataType::Numeric, Some("c"), true),
            &["max temp", "temperature max", "temp max"],
        ),
        &[("f", UnitConversion::Named("convert_f_to_c".into()))],
    ));
    registry.seed(with_synonyms(
        entry("door_count", "Door Count", DataType::Numeric, None, false),
        &["doors", "number of doors"],
    ));
    registry.seed(with_synonyms(
        entry("door_type", "Door Type", DataType::Enum, None, false),
        &["door style"],
    ));
    registry.seed(with_synonyms(
        entry("shelf_count", "Shelf Count", DataType::Numeric, None, false),
        &["shelves", "number of shelves"],
    ));
    registry.seed(with_synonyms(
        entry("voltage_v", "Voltage", DataType::Numeric, Some("v"), true),
        &["voltage", "electrical"],
    ));
    registry.seed(with_synonyms(
        entry("amperage", "Amperage", DataType::Numeric, Some("a"), false),
        &["amps", "current"],
    ));
    registry.seed(with_synonyms(
        entry("refrigerant", "Refrigerant", DataType::Text, None, false),
        &["refrigerant type"],
    ));
    registry.seed(with_synonyms(
        entry("weight_lbs", "Weight", DataType::Numeric, Some("lbs"), false),
        &["shipping weight", "net weight"],
    ));
    registry.seed(with_synonyms(
        entry("certifications", "Certifications", DataType::List, None, true),
        &["certification", "certs", "listings"],
    ));
    registry.seed(with_synonyms(
        entry("uniformity_c", "Temperature Uniformity", DataType::Numeric, Some("c"), false),
        &["uniformity", "temperature uniformity"],
    ));

    registry
}

/// A handful of representative Model Patterns (§3, §4.3) — the real table
/// in a production deployment is operator-curated and much larger; these
/// are the seed entries a fresh install ships with.
pub fn default_model_patterns() -> Vec<ModelPattern> {
    vec![ModelPattern {
        id: uuid::Uuid::new_v4(),
        brand: "ABS".into(),
        pattern_regex: r"ABT-HC-\d+[SG]".into(),
        family: "refrigerator".into(),
        product_line: Some("Premier".into()),
        controller_tier: Some("standard".into()),
        field_map: BTreeMap::new(),
        value_map: BTreeMap::new(),
        priority: 10,
        active: true,
    }]
}

pub fn default_equivalence_rules() -> Vec<EquivalenceRule> {
    vec![EquivalenceRule {
        family: "refrigerator".into(),
        required_match: BTreeSet::from(["refrigerant".to_string()]),
        tolerance_map: BTreeMap::from([("storage_capacity_cuft".to_string(), 0.05)]),
        priority_specs: vec!["uniformity_c".to_string(), "storage_capacity_cuft".to_string()],
    }]
}

/// Recommendation profiles (§4.11): weights and target bands per use case.
pub fn default_use_case_profiles() -> Vec<UseCaseProfile> {
    vec![UseCaseProfile {
        name: "vaccine_storage".into(),
        synonyms: vec!["vaccine".into(), "vaccination".into(), "immunization".into()],
        weights: vec![
            SpecWeight {
                spec_name: "uniformity_c".into(),
                weight: 0.25,
                target_band: TargetBand { min: 0.0, max: 1.5 },
                required: true,
            },
            SpecWeight {
                spec_name: "storage_capacity_cuft".into(),
                weight: 0.15,
                target_band: TargetBand { min: 10.0, max: 20.0 },
                required: false,
            },
        ],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_registry_resolves_common_synonyms() {
        let reg = seed_registry();
        assert_eq!(reg.resolve("Storage Capacity"), Some("storage_capacity_cuft".to_string()));
        assert_eq!(reg.resolve("Amps"), Some("amperage".to_string()));
    }
}
