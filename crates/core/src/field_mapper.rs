//! Field Mapper (§4.4): raw labelled fields harvested from text -> canonical
//! spec names via the Registry's synonym table, with auto-discovery for
//! unknown labels.

use crate::registry::SpecRegistry;

#[derive(Debug, Clone)]
pub struct RawField {
    pub label: String,
    pub raw_value: String,
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct MappedField {
    pub canonical_name: String,
    pub raw_value: String,
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct UnmappedField {
    pub label: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Default)]
pub struct FieldMappingResult {
    pub mapped: Vec<MappedField>,
    pub unmapped: Vec<UnmappedField>,
}

/// Harvest `(label, raw_value, context)` triples from table rows, key:value
/// lines, and section-heading-followed-by-scalar patterns.
pub fn harvest_fields(text: &str) -> Vec<RawField> {
    let mut fields = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((label, value)) = trimmed.split_once(':') {
            let label = label.trim();
            let value = value.trim();
            if !label.is_empty() && !value.is_empty() && label.len() < 64 {
                fields.push(RawField { label: label.to_string(), raw_value: value.to_string(), context: trimmed.to_string() });
                continue;
            }
        }
        if let Some((label, value)) = split_table_row(trimmed) {
            fields.push(RawField { label, raw_value: value, context: trimmed.to_string() });
        }
    }
    fields
}

/// A "table row" harvested from pipe- or multi-space-delimited text: first
/// cell is the label, second is the value.
fn split_table_row(line: &str) -> Option<(String, String)> {
    if line.contains('|') {
        let cells: Vec<&str> = line.split('|').map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
        if cells.len() >= 2 {
            return Some((cells[0].to_string(), cells[1].to_string()));
        }
    } else if let Some(idx) = line.find("  ") {
        let (label, rest) = line.split_at(idx);
        let value = rest.trim();
        if !label.trim().is_empty() && !value.is_empty() {
            return Some((label.trim().to_string(), value.to_string()));
        }
    }
    None
}

/// Resolve harvested fields against the registry; unknown labels trigger
/// auto-discovery (§4.4) rather than silent drop.
pub fn map_fields(registry: &SpecRegistry, fields: &[RawField], auto_discover: bool) -> FieldMappingResult {
    let mut result = FieldMappingResult::default();
    for field in fields {
        match registry.resolve(&field.label) {
            Some(canonical_name) => result.mapped.push(MappedField {
                canonical_name,
                raw_value: field.raw_value.clone(),
                context: field.context.clone(),
            }),
            None if auto_discover => {
                let canonical_name = registry.register_auto(&field.label, &field.raw_value);
                result.mapped.push(MappedField {
                    canonical_name,
                    raw_value: field.raw_value.clone(),
                    context: field.context.clone(),
                });
            }
            None => result.unmapped.push(UnmappedField {
                label: field.label.clone(),
                raw_value: field.raw_value.clone(),
            }),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllowedValues, DataType, SpecRegistryEntry, UnitSystem};
    use std::collections::BTreeSet;

    fn registry_with_capacity() -> SpecRegistry {
        let reg = SpecRegistry::new();
        reg.seed(SpecRegistryEntry {
            canonical_name: "storage_capacity_cuft".into(),
            display_name: "Storage Capacity".into(),
            data_type: DataType::Numeric,
            unit: Some("cuft".into()),
            unit_system: UnitSystem::Imperial,
            family_scope: BTreeSet::new(),
            synonyms: BTreeSet::from(["capacity".to_string(), "storage capacity".to_string()]),
            unit_conversions: Default::default(),
            allowed_values: AllowedValues::default(),
            is_filterable: true,
            is_comparable: true,
            is_searchable: true,
            is_critical: true,
            sort_order: 0,
            auto_discovered: false,
            approved: true,
        });
        reg
    }

    #[test]
    fn harvest_key_value_lines() {
        let fields = harvest_fields("Capacity: 26 cu ft\nVoltage: 115V\n");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].label, "Capacity");
    }

    #[test]
    fn known_synonym_maps_to_canonical_name() {
        let reg = registry_with_capacity();
        let fields = harvest_fields("Capacity: 26 cu ft");
        let result = map_fields(&reg, &fields, true);
        assert_eq!(result.mapped.len(), 1);
        assert_eq!(result.mapped[0].canonical_name, "storage_capacity_cuft");
        assert!(result.unmapped.is_empty());
    }

    #[test]
    fn unknown_label_triggers_auto_discovery() {
        let reg = registry_with_capacity();
        let fields = harvest_fields("Compressor Type: Hermetic");
        let result = map_fields(&reg, &fields, true);
        assert_eq!(result.mapped.len(), 1);
        let entry = reg.lookup(&result.mapped[0].canonical_name).unwrap();
        assert!(entry.auto_discovered);
        assert!(!entry.approved);
    }

    #[test]
    fn unknown_label_without_auto_discover_is_unmapped() {
        let reg = registry_with_capacity();
        let fields = harvest_fields("Compressor Type: Hermetic");
        let result = map_fields(&reg, &fields, false);
        assert!(result.mapped.is_empty());
        assert_eq!(result.unmapped.len(), 1);
    }
}
