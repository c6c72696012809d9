//! Conflict Engine (§4.7): compares an incoming spec value to the stored
//! value and decides update-vs-flag, applying revision precedence.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::types::{ConflictSeverity, SpecRegistryEntry, SpecValue};

/// Default numeric equality tolerance when no per-spec override exists in
/// the family's Equivalence Rule (§9: "per-spec tolerance with a 5%
/// default").
pub const DEFAULT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictDecision {
    /// No existing value: write straight through.
    WriteNew,
    /// Equal under the type rule: no-op.
    NoOp,
    /// Not equal, new document strictly newer: overwrite, emit audit entry.
    Overwrite,
    /// Not equal, revisions tied or missing: raise a pending conflict.
    RaiseConflict { severity: ConflictSeverity },
}

fn numeric_equal(a: f64, b: f64, tolerance: f64) -> bool {
    let denom = a.abs().max(b.abs()).max(f64::EPSILON);
    (a - b).abs() / denom <= tolerance
}

fn values_equal(existing: &SpecValue, new: &SpecValue, tolerance: f64) -> bool {
    match (existing, new) {
        (SpecValue::Numeric { value: a, .. }, SpecValue::Numeric { value: b, .. }) => numeric_equal(*a, *b, tolerance),
        (SpecValue::Text(a), SpecValue::Text(b)) => a.to_lowercase() == b.to_lowercase(),
        (SpecValue::Enum(a), SpecValue::Enum(b)) => a.eq_ignore_ascii_case(b),
        (SpecValue::Boolean(a), SpecValue::Boolean(b)) => a == b,
        (SpecValue::List(a), SpecValue::List(b)) => {
            let mut a_sorted: Vec<String> = a.iter().map(|s| s.to_lowercase()).collect();
            let mut b_sorted: Vec<String> = b.iter().map(|s| s.to_lowercase()).collect();
            a_sorted.sort();
            b_sorted.sort();
            a_sorted == b_sorted
        }
        (SpecValue::Range { min: a_min, max: a_max }, SpecValue::Range { min: b_min, max: b_max }) => {
            numeric_equal(*a_min, *b_min, tolerance) && numeric_equal(*a_max, *b_max, tolerance)
        }
        _ => false,
    }
}

/// Decide how to apply `new_value` against `existing_value` (if any), per
/// the §4.7 decision table.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    existing_value: Option<&SpecValue>,
    new_value: &SpecValue,
    registry_entry: &SpecRegistryEntry,
    tolerance: f64,
    new_revision: Option<NaiveDate>,
    existing_revision: Option<NaiveDate>,
) -> ConflictDecision {
    let Some(existing_value) = existing_value else {
        return ConflictDecision::WriteNew;
    };

    if values_equal(existing_value, new_value, tolerance) {
        return ConflictDecision::NoOp;
    }

    if crate::types::outranks(new_revision, existing_revision) {
        return ConflictDecision::Overwrite;
    }

    let severity = if registry_entry.is_critical { ConflictSeverity::Critical } else { ConflictSeverity::Medium };
    // §8 boundary behavior: conflicts on unapproved auto-discovered specs
    // are capped at `medium` severity even if flagged critical.
    let severity = if !registry_entry.approved && registry_entry.auto_discovered {
        ConflictSeverity::Medium
    } else {
        severity
    };
    ConflictDecision::RaiseConflict { severity }
}

/// Resolution endpoints (§4.7): each mutates a conflict exactly once.
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    WroteValue(SpecValue),
    KeptExisting,
    Dismissed,
}

pub fn apply_resolution(
    resolution: crate::types::ConflictResolution,
    existing_value: SpecValue,
    new_value: SpecValue,
    override_value: Option<SpecValue>,
) -> Option<ResolutionOutcome> {
    use crate::types::ConflictResolution as R;
    match resolution {
        R::AcceptNew => Some(ResolutionOutcome::WroteValue(new_value)),
        R::KeepExisting => {
            let _ = existing_value;
            Some(ResolutionOutcome::KeptExisting)
        }
        R::ManualOverride => override_value.map(ResolutionOutcome::WroteValue),
        R::Dismissed => Some(ResolutionOutcome::Dismissed),
        R::Pending => None,
    }
}

/// A conflict's lifecycle may transition from `pending` to a terminal state
/// exactly once (§8 invariant 6).
pub fn can_transition(current: crate::types::ConflictResolution) -> bool {
    matches!(current, crate::types::ConflictResolution::Pending)
}

pub fn new_conflict_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllowedValues, DataType, UnitSystem};
    use std::collections::{BTreeMap, BTreeSet};

    fn entry(is_critical: bool, approved: bool, auto_discovered: bool) -> SpecRegistryEntry {
        SpecRegistryEntry {
            canonical_name: "storage_capacity_cuft".into(),
            display_name: "Storage Capacity".into(),
            data_type: DataType::Numeric,
            unit: Some("cuft".into()),
            unit_system: UnitSystem::Imperial,
            family_scope: BTreeSet::new(),
            synonyms: BTreeSet::new(),
            unit_conversions: BTreeMap::new(),
            allowed_values: AllowedValues::default(),
            is_filterable: true,
            is_comparable: true,
            is_searchable: true,
            is_critical,
            sort_order: 0,
            auto_discovered,
            approved,
        }
    }

    #[test]
    fn no_existing_value_writes_through() {
        let decision = decide(None, &SpecValue::Numeric { value: 26.0, unit: None }, &entry(true, true, false), DEFAULT_TOLERANCE, None, None);
        assert_eq!(decision, ConflictDecision::WriteNew);
    }

    #[test]
    fn numeric_tolerance_exactly_at_threshold_is_equal() {
        // numeric_equal divides by max(|a|, |b|), so the boundary sits at
        // new = existing / (1 - tolerance), not existing * (1 + tolerance).
        let existing_value = 100.0;
        let new_value = existing_value / (1.0 - DEFAULT_TOLERANCE);
        assert!((((new_value - existing_value).abs() / new_value) - DEFAULT_TOLERANCE).abs() < 1e-12);

        let existing = SpecValue::Numeric { value: existing_value, unit: None };
        let new = SpecValue::Numeric { value: new_value, unit: None };
        let decision = decide(Some(&existing), &new, &entry(false, true, false), DEFAULT_TOLERANCE, None, None);
        assert_eq!(decision, ConflictDecision::NoOp);
    }

    #[test]
    fn strictly_newer_revision_overwrites() {
        let existing = SpecValue::Numeric { value: 26.0, unit: None };
        let new = SpecValue::Numeric { value: 25.8, unit: None };
        let older = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let newer = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let decision = decide(Some(&existing), &new, &entry(true, true, false), DEFAULT_TOLERANCE, Some(newer), Some(older));
        assert_eq!(decision, ConflictDecision::Overwrite);
    }

    #[test]
    fn tied_revision_raises_critical_conflict_for_critical_spec() {
        let existing = SpecValue::Numeric { value: 26.0, unit: None };
        let new = SpecValue::Numeric { value: 25.8, unit: None };
        let decision = decide(Some(&existing), &new, &entry(true, true, false), DEFAULT_TOLERANCE, None, None);
        assert_eq!(decision, ConflictDecision::RaiseConflict { severity: ConflictSeverity::Critical });
    }

    #[test]
    fn unapproved_auto_discovered_spec_is_capped_at_medium() {
        let existing = SpecValue::Text("a".into());
        let new = SpecValue::Text("b".into());
        let decision = decide(Some(&existing), &new, &entry(true, false, true), DEFAULT_TOLERANCE, None, None);
        assert_eq!(decision, ConflictDecision::RaiseConflict { severity: ConflictSeverity::Medium });
    }

    #[test]
    fn conflict_lifecycle_transitions_exactly_once() {
        use crate::types::ConflictResolution as R;
        assert!(can_transition(R::Pending));
        assert!(!can_transition(R::AcceptNew));
        assert!(!can_transition(R::Dismissed));
    }
}
