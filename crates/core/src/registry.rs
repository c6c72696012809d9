//! The Spec Registry (§4.6): canonical spec catalog, synonym resolution and
//! unit normalization. Read-mostly, served from an in-memory cache that
//! invalidates on write (§5, §9 "global mutable state becomes an explicit
//! registry object").

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::types::{AllowedValues, DataType, SpecRegistryEntry, SpecValue, UnitConversion, UnitSystem};

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn infer_data_type(raw_value: &str) -> DataType {
    let trimmed = raw_value.trim();
    if trimmed.eq_ignore_ascii_case("yes")
        || trimmed.eq_ignore_ascii_case("no")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("false")
    {
        return DataType::Boolean;
    }
    if trimmed.parse::<f64>().is_ok() {
        return DataType::Numeric;
    }
    if trimmed.contains(',') && trimmed.split(',').count() > 1 {
        return DataType::List;
    }
    DataType::Text
}

/// Shared, cloneable handle to the registry. Clones share the same
/// underlying maps, so a "write -> invalidate" notification is simply the
/// write itself becoming visible to every holder.
#[derive(Clone)]
pub struct SpecRegistry {
    by_name: Arc<DashMap<String, SpecRegistryEntry>>,
    /// normalized synonym -> canonical_name
    synonym_index: Arc<DashMap<String, String>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self {
            by_name: Arc::new(DashMap::new()),
            synonym_index: Arc::new(DashMap::new()),
        }
    }

    /// Load a curated entry, indexing its synonyms and its own display name.
    /// Idempotent on `canonical_name` (§4.6).
    pub fn seed(&self, entry: SpecRegistryEntry) {
        for syn in entry.synonyms.iter() {
            self.synonym_index.insert(normalize_label(syn), entry.canonical_name.clone());
        }
        self.synonym_index
            .insert(normalize_label(&entry.canonical_name), entry.canonical_name.clone());
        self.by_name.insert(entry.canonical_name.clone(), entry);
    }

    pub fn lookup(&self, canonical_name: &str) -> Option<SpecRegistryEntry> {
        self.by_name.get(canonical_name).map(|e| e.clone())
    }

    /// `label -> canonical_name`, pure and idempotent (§4.6).
    pub fn resolve(&self, label: &str) -> Option<String> {
        self.synonym_index.get(&normalize_label(label)).map(|r| r.clone())
    }

    /// Add a synonym to an existing entry. Idempotent; never touches stored
    /// product data (§3 invariant).
    pub fn add_synonym(&self, canonical_name: &str, synonym: &str) {
        if let Some(mut entry) = self.by_name.get_mut(canonical_name) {
            entry.synonyms.insert(synonym.to_string());
            self.synonym_index.insert(normalize_label(synonym), canonical_name.to_string());
        }
    }

    /// Registry auto-discovery (§4.4, §4.6): create a pending entry for an
    /// unseen label. Idempotent — a second call with the same label returns
    /// the canonical name already minted for it.
    pub fn register_auto(&self, label: &str, raw_value: &str) -> String {
        let normalized = normalize_label(label);
        if let Some(existing) = self.synonym_index.get(&normalized) {
            return existing.clone();
        }
        let canonical_name = normalized.clone();
        let data_type = infer_data_type(raw_value);
        let entry = SpecRegistryEntry {
            canonical_name: canonical_name.clone(),
            display_name: label.trim().to_string(),
            data_type,
            unit: None,
            unit_system: UnitSystem::None,
            family_scope: BTreeSet::new(),
            synonyms: BTreeSet::from([normalized.clone()]),
            unit_conversions: Default::default(),
            allowed_values: AllowedValues::default(),
            is_filterable: false,
            is_comparable: false,
            is_searchable: true,
            is_critical: false,
            sort_order: i32::MAX,
            auto_discovered: true,
            approved: false,
        };
        self.synonym_index.insert(normalized, canonical_name.clone());
        self.by_name.insert(canonical_name.clone(), entry);
        canonical_name
    }

    pub fn approve(&self, canonical_name: &str) -> bool {
        if let Some(mut entry) = self.by_name.get_mut(canonical_name) {
            entry.approved = true;
            true
        } else {
            false
        }
    }

    pub fn all(&self) -> Vec<SpecRegistryEntry> {
        self.by_name.iter().map(|e| e.clone()).collect()
    }

    /// Convert `raw` (already a parsed f64 in `from_unit`) into the entry's
    /// canonical unit, applying either a flat factor or a named conversion.
    /// Converting twice is idempotent (§8 invariant 4): once a value is
    /// already in canonical units there is no matching `from_unit` entry, so
    /// a second pass is a no-op that returns the input unchanged.
    pub fn convert_to_canonical(&self, canonical_name: &str, value: f64, from_unit: Option<&str>) -> f64 {
        let Some(entry) = self.lookup(canonical_name) else {
            return value;
        };
        let Some(from_unit) = from_unit else {
            return value;
        };
        if entry.unit.as_deref() == Some(from_unit) {
            return value;
        }
        match entry.unit_conversions.get(from_unit) {
            Some(UnitConversion::Factor(factor)) => value * factor,
            Some(UnitConversion::Named(name)) => apply_named_conversion(name, value),
            None => value,
        }
    }
}

impl Default for SpecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed dispatch table of named unit conversions (§4.6).
fn apply_named_conversion(name: &str, value: f64) -> f64 {
    match name {
        "convert_f_to_c" => (value - 32.0) / 1.8,
        "convert_c_to_f" => value * 1.8 + 32.0,
        "convert_lb_to_kg" => value * 0.45359237,
        "convert_kg_to_lb" => value / 0.45359237,
        _ => value,
    }
}

/// Builds the type that `SpecValue` carries for a numeric field by resolving
/// it against the registry entry's declared unit, converting if needed.
pub fn build_numeric_value(registry: &SpecRegistry, canonical_name: &str, raw: f64, source_unit: Option<&str>) -> SpecValue {
    let converted = registry.convert_to_canonical(canonical_name, raw, source_unit);
    let unit = registry.lookup(canonical_name).and_then(|e| e.unit);
    SpecValue::Numeric { value: converted, unit }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fahrenheit_entry() -> SpecRegistryEntry {
        SpecRegistryEntry {
            canonical_name: "temp_range_min_c".into(),
            display_name: "Min Temperature".into(),
            data_type: DataType::Numeric,
            unit: Some("c".into()),
            unit_system: UnitSystem::Metric,
            family_scope: BTreeSet::new(),
            synonyms: BTreeSet::from(["min temp".to_string(), "temperature min".to_string()]),
            unit_conversions: [("f".to_string(), UnitConversion::Named("convert_f_to_c".to_string()))]
                .into_iter()
                .collect(),
            allowed_values: AllowedValues::default(),
            is_filterable: true,
            is_comparable: true,
            is_searchable: false,
            is_critical: true,
            sort_order: 0,
            auto_discovered: false,
            approved: true,
        }
    }

    #[test]
    fn resolve_is_case_and_punctuation_insensitive() {
        let reg = SpecRegistry::new();
        reg.seed(fahrenheit_entry());
        assert_eq!(reg.resolve("Min Temp."), Some("temp_range_min_c".to_string()));
        assert_eq!(reg.resolve("  MIN-TEMP  "), Some("temp_range_min_c".to_string()));
    }

    #[test]
    fn register_auto_is_idempotent() {
        let reg = SpecRegistry::new();
        let a = reg.register_auto("Compressor Type", "Hermetic");
        let b = reg.register_auto("compressor type", "Hermetic");
        assert_eq!(a, b);
        let entry = reg.lookup(&a).unwrap();
        assert!(entry.auto_discovered);
        assert!(!entry.approved);
    }

    #[test]
    fn unit_conversion_is_idempotent_when_applied_twice() {
        let reg = SpecRegistry::new();
        reg.seed(fahrenheit_entry());
        let once = reg.convert_to_canonical("temp_range_min_c", 32.0, Some("f"));
        assert!((once - 0.0).abs() < 1e-9);
        // second pass: value is already canonical, `from_unit` no longer applies
        let twice = reg.convert_to_canonical("temp_range_min_c", once, Some("c"));
        assert!((twice - once).abs() < 1e-9);
    }
}
