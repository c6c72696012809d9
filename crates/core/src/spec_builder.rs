//! Spec Builder: the glue between the Field Mapper (§4.4) and the Compound
//! Parser (§4.5) — turns a document's mapped `(canonical_name, raw_value)`
//! pairs into fully typed `SpecValue`s, fanning a single compound field out
//! into the several canonical specs it actually describes (e.g. a
//! "Door Configuration" line becomes `door_count`, `door_type`,
//! `door_hinge`, `door_features`).

use std::collections::BTreeMap;

use crate::compound::{parse_certifications, parse_door_config, parse_electrical, parse_fractional_dimension, parse_refrigerant, parse_shelf_config, parse_temperature_range, DoorHinge, DoorType, ParseFailed, ShelfType};
use crate::field_mapper::MappedField;
use crate::registry::SpecRegistry;
use crate::types::{DataType, SpecValue};

fn door_type_name(t: &DoorType) -> &'static str {
    match t {
        DoorType::Solid => "solid",
        DoorType::Glass => "glass",
        DoorType::GlassSliding => "glass_sliding",
    }
}

fn door_hinge_name(h: &DoorHinge) -> &'static str {
    match h {
        DoorHinge::Left => "left",
        DoorHinge::Right => "right",
        DoorHinge::Both => "both",
    }
}

fn shelf_type_name(t: &ShelfType) -> &'static str {
    match t {
        ShelfType::Adjustable => "adjustable",
        ShelfType::Fixed => "fixed",
        ShelfType::Mixed => "mixed",
    }
}

/// Coerce a raw string into the `SpecValue` shape the Registry entry
/// declares, applying unit conversion when the raw text carries a unit
/// token that differs from the entry's canonical unit. Falls back to `Text`
/// when no registry entry is known (the auto-discovery path already minted
/// one with an inferred `data_type`, so this should rarely happen).
fn coerce_generic(registry: &SpecRegistry, canonical_name: &str, raw: &str) -> SpecValue {
    let Some(entry) = registry.lookup(canonical_name) else {
        return SpecValue::Text(raw.trim().to_string());
    };
    match entry.data_type {
        DataType::Numeric => {
            let trimmed = raw.trim();
            let numeric_part: String = trimmed.chars().take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();
            let value = match numeric_part.parse::<f64>() {
                Ok(v) => v,
                Err(_) => match parse_fractional_dimension(trimmed) {
                    Some(v) => v,
                    // §4.5 fail-soft: a genuinely unparseable numeric field
                    // (e.g. "TBD") becomes a tagged `Text`, not a fabricated
                    // 0.0 that would corrupt downstream conflict decisions.
                    None => return ParseFailed::tag(trimmed).into_spec_value(),
                },
            };
            let unit_token = trimmed[numeric_part.len()..].trim().split_whitespace().next();
            crate::registry::build_numeric_value(registry, canonical_name, value, unit_token)
        }
        DataType::Boolean => {
            let lower = raw.trim().to_lowercase();
            SpecValue::Boolean(lower == "yes" || lower == "true")
        }
        DataType::Enum => SpecValue::Enum(raw.trim().to_string()),
        DataType::List => SpecValue::List(raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()),
        DataType::Text => SpecValue::Text(raw.trim().to_string()),
        DataType::Range => {
            let range = parse_temperature_range(raw);
            SpecValue::Range { min: range.temp_range_min_c.unwrap_or(0.0), max: range.temp_range_max_c.unwrap_or(0.0) }
        }
    }
}

/// Build the full typed spec map for one document's mapped fields (§4.4 +
/// §4.5 combined). A handful of canonical names are known compound fields
/// and dispatch to a dedicated parser that can write more than one
/// canonical name; everything else goes through generic unit-aware
/// coercion. Compound parse failures fail soft into the generic path rather
/// than dropping the field (§4.5 "fails soft").
pub fn build_specs(registry: &SpecRegistry, mapped: &[MappedField]) -> BTreeMap<String, SpecValue> {
    let mut specs = BTreeMap::new();

    for field in mapped {
        match field.canonical_name.as_str() {
            "door_count" => match parse_door_config(&field.raw_value) {
                Some(cfg) => {
                    specs.insert("door_count".to_string(), SpecValue::Numeric { value: cfg.door_count as f64, unit: None });
                    specs.insert("door_type".to_string(), SpecValue::Enum(door_type_name(&cfg.door_type).to_string()));
                    if let Some(hinge) = &cfg.door_hinge {
                        let canonical = registry.resolve("door hinge").unwrap_or_else(|| registry.register_auto("Door Hinge", "left"));
                        specs.insert(canonical, SpecValue::Enum(door_hinge_name(hinge).to_string()));
                    }
                    if !cfg.door_features.is_empty() {
                        let canonical = registry.resolve("door features").unwrap_or_else(|| registry.register_auto("Door Features", "self_closing"));
                        specs.insert(canonical, SpecValue::List(cfg.door_features.into_iter().collect()));
                    }
                }
                None => {
                    specs.insert("door_count".to_string(), coerce_generic(registry, "door_count", &field.raw_value));
                }
            },
            "shelf_count" => match parse_shelf_config(&field.raw_value) {
                Some(cfg) => {
                    specs.insert("shelf_count".to_string(), SpecValue::Numeric { value: cfg.shelf_count as f64, unit: None });
                    let type_canonical = registry.resolve("shelf type").unwrap_or_else(|| registry.register_auto("Shelf Type", "adjustable"));
                    specs.insert(type_canonical, SpecValue::Enum(shelf_type_name(&cfg.shelf_type).to_string()));
                    if let Some(increment) = cfg.shelf_adjustment_increment {
                        let inc_canonical = registry
                            .resolve("shelf adjustment increment")
                            .unwrap_or_else(|| registry.register_auto("Shelf Adjustment Increment", "0.5"));
                        specs.insert(inc_canonical, SpecValue::Numeric { value: increment, unit: Some("in".to_string()) });
                    }
                }
                None => {
                    specs.insert("shelf_count".to_string(), coerce_generic(registry, "shelf_count", &field.raw_value));
                }
            },
            "temp_range_min_c" | "temp_range_max_c" => {
                let range = parse_temperature_range(&field.raw_value);
                if let Some(min) = range.temp_range_min_c {
                    specs.insert("temp_range_min_c".to_string(), SpecValue::Numeric { value: min, unit: Some("c".to_string()) });
                }
                if let Some(max) = range.temp_range_max_c {
                    specs.insert("temp_range_max_c".to_string(), SpecValue::Numeric { value: max, unit: Some("c".to_string()) });
                }
                if range.temp_range_min_c.is_none() && range.temp_range_max_c.is_none() {
                    specs.insert(field.canonical_name.clone(), coerce_generic(registry, &field.canonical_name, &field.raw_value));
                }
            }
            "voltage_v" => {
                let electrical = parse_electrical(&field.raw_value);
                if let Some(v) = electrical.voltage_v {
                    specs.insert("voltage_v".to_string(), SpecValue::Numeric { value: v, unit: Some("v".to_string()) });
                }
                if let (Some(min), Some(max)) = (electrical.voltage_min, electrical.voltage_max) {
                    let min_canonical = registry.resolve("voltage min").unwrap_or_else(|| registry.register_auto("Voltage Min", "110"));
                    let max_canonical = registry.resolve("voltage max").unwrap_or_else(|| registry.register_auto("Voltage Max", "120"));
                    specs.insert(min_canonical, SpecValue::Numeric { value: min, unit: Some("v".to_string()) });
                    specs.insert(max_canonical, SpecValue::Numeric { value: max, unit: Some("v".to_string()) });
                }
                if let Some(hz) = electrical.frequency_hz {
                    let canonical = registry.resolve("frequency").unwrap_or_else(|| registry.register_auto("Frequency", "60"));
                    specs.insert(canonical, SpecValue::Numeric { value: hz, unit: Some("hz".to_string()) });
                }
                if let Some(amps) = electrical.amperage {
                    specs.insert("amperage".to_string(), SpecValue::Numeric { value: amps, unit: Some("a".to_string()) });
                }
                if let Some(hp) = electrical.horsepower {
                    let canonical = registry.resolve("horsepower").unwrap_or_else(|| registry.register_auto("Horsepower", "0.2"));
                    specs.insert(canonical, SpecValue::Numeric { value: hp, unit: Some("hp".to_string()) });
                }
                if electrical.voltage_v.is_none() {
                    specs.insert("voltage_v".to_string(), coerce_generic(registry, "voltage_v", &field.raw_value));
                }
            }
            "refrigerant" => {
                let value = parse_refrigerant(&field.raw_value).unwrap_or_else(|| field.raw_value.trim().to_string());
                specs.insert("refrigerant".to_string(), SpecValue::Text(value));
            }
            "certifications" => {
                let certs = parse_certifications(&field.raw_value);
                if certs.is_empty() {
                    specs.insert("certifications".to_string(), coerce_generic(registry, "certifications", &field.raw_value));
                } else {
                    specs.insert("certifications".to_string(), SpecValue::List(certs));
                }
            }
            "width_in" | "depth_in" | "height_in" => match parse_fractional_dimension(&field.raw_value) {
                Some(value) => {
                    specs.insert(field.canonical_name.clone(), SpecValue::Numeric { value, unit: Some("in".to_string()) });
                }
                None => {
                    specs.insert(field.canonical_name.clone(), coerce_generic(registry, &field.canonical_name, &field.raw_value));
                }
            },
            _ => {
                specs.insert(field.canonical_name.clone(), coerce_generic(registry, &field.canonical_name, &field.raw_value));
            }
        }
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_registry;

    fn mapped(canonical_name: &str, raw_value: &str) -> MappedField {
        MappedField { canonical_name: canonical_name.to_string(), raw_value: raw_value.to_string(), context: raw_value.to_string() }
    }

    #[test]
    fn door_compound_fans_out_into_several_canonical_specs() {
        let registry = seed_registry();
        let fields = vec![mapped("door_count", "One swing solid door, self-closing, right hinged")];
        let specs = build_specs(&registry, &fields);
        assert_eq!(specs.get("door_count"), Some(&SpecValue::Numeric { value: 1.0, unit: None }));
        assert_eq!(specs.get("door_type"), Some(&SpecValue::Enum("solid".to_string())));
    }

    #[test]
    fn electrical_compound_writes_voltage_frequency_amperage_and_hp() {
        let registry = seed_registry();
        let fields = vec![mapped("voltage_v", "115V, 60 Hz, 3 Amps, 1/5 HP")];
        let specs = build_specs(&registry, &fields);
        assert_eq!(specs.get("voltage_v"), Some(&SpecValue::Numeric { value: 115.0, unit: Some("v".to_string()) }));
        assert_eq!(specs.get("amperage"), Some(&SpecValue::Numeric { value: 3.0, unit: Some("a".to_string()) }));
    }

    #[test]
    fn temperature_range_writes_both_bounds_from_one_field() {
        let registry = seed_registry();
        let fields = vec![mapped("temp_range_min_c", "33.8\u{b0}F to 50\u{b0}F")];
        let specs = build_specs(&registry, &fields);
        assert_eq!(specs.get("temp_range_min_c"), Some(&SpecValue::Numeric { value: 1.0, unit: Some("c".to_string()) }));
        assert_eq!(specs.get("temp_range_max_c"), Some(&SpecValue::Numeric { value: 10.0, unit: Some("c".to_string()) }));
    }

    #[test]
    fn generic_numeric_field_picks_up_declared_unit_conversion() {
        let registry = seed_registry();
        let fields = vec![mapped("weight_lbs", "45 kg")];
        let specs = build_specs(&registry, &fields);
        // no kg conversion seeded for weight_lbs, so the raw numeric passes through
        assert_eq!(specs.get("weight_lbs"), Some(&SpecValue::Numeric { value: 45.0, unit: Some("lbs".to_string()) }));
    }

    #[test]
    fn door_config_parse_failure_falls_back_to_generic_numeric() {
        let registry = seed_registry();
        let fields = vec![mapped("door_count", "2")];
        let specs = build_specs(&registry, &fields);
        assert_eq!(specs.get("door_count"), Some(&SpecValue::Numeric { value: 2.0, unit: None }));
    }

    #[test]
    fn unparseable_numeric_field_tags_as_text_instead_of_zero() {
        let registry = seed_registry();
        let fields = vec![mapped("weight_lbs", "see datasheet")];
        let specs = build_specs(&registry, &fields);
        assert_eq!(specs.get("weight_lbs"), Some(&SpecValue::Text("see datasheet".to_string())));
    }
}
