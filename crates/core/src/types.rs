//! Core data model (§3): the entities every other module reads and writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A normalized, typed spec value. The variant a given `canonical_name` takes
/// is fixed by its Registry entry's `data_type`, never chosen ad hoc at write
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecValue {
    Numeric { value: f64, unit: Option<String> },
    Text(String),
    Boolean(bool),
    Enum(String),
    Range { min: f64, max: f64 },
    List(Vec<String>),
}

impl SpecValue {
    pub fn data_type(&self) -> DataType {
        match self {
            SpecValue::Numeric { .. } => DataType::Numeric,
            SpecValue::Text(_) => DataType::Text,
            SpecValue::Boolean(_) => DataType::Boolean,
            SpecValue::Enum(_) => DataType::Enum,
            SpecValue::Range { .. } => DataType::Range,
            SpecValue::List(_) => DataType::List,
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            SpecValue::Numeric { value, .. } => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Numeric,
    Text,
    Boolean,
    Enum,
    Range,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Imperial,
    Metric,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperCategory {
    Refrigerator,
    Freezer,
    Cryogenic,
    Accessory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub code: String,
    pub name: String,
    pub parent_org: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub code: String,
    pub super_category: SuperCategory,
}

/// A numeric allowed-value range, or a closed enum set — whichever applies
/// to the entry's `data_type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowedValues {
    pub enum_values: Option<BTreeSet<String>>,
    pub numeric_min: Option<f64>,
    pub numeric_max: Option<f64>,
}

/// A unit conversion: either a flat multiplicative factor, or the name of a
/// fixed function in the Registry's conversion dispatch table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitConversion {
    Factor(f64),
    Named(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecRegistryEntry {
    pub canonical_name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub unit: Option<String>,
    pub unit_system: UnitSystem,
    /// Empty set means "applies to every family" (§8 boundary behavior).
    pub family_scope: BTreeSet<String>,
    pub synonyms: BTreeSet<String>,
    pub unit_conversions: BTreeMap<String, UnitConversion>,
    pub allowed_values: AllowedValues,
    pub is_filterable: bool,
    pub is_comparable: bool,
    pub is_searchable: bool,
    /// Capacity, temperature range, voltage, certifications are flagged
    /// `is_critical` (§4.7): conflicts on them get `critical` severity.
    pub is_critical: bool,
    pub sort_order: i32,
    pub auto_discovered: bool,
    pub approved: bool,
}

impl SpecRegistryEntry {
    pub fn applies_to(&self, family: &str) -> bool {
        self.family_scope.is_empty() || self.family_scope.contains(family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    PendingReview,
    Active,
    Discontinued,
    Deprecated,
}

/// The fixed universal columns every product carries, denormalized out of
/// `specs` for fast filtering. §3 invariant: when populated, these must
/// agree with the same field under `specs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixedColumns {
    pub capacity_cuft: Option<f64>,
    pub temp_range_min_c: Option<f64>,
    pub temp_range_max_c: Option<f64>,
    pub door_count: Option<i32>,
    pub door_type: Option<String>,
    pub shelf_count: Option<i32>,
    pub refrigerant: Option<String>,
    pub voltage_v: Option<f64>,
    pub amperage: Option<f64>,
    pub weight_lbs: Option<f64>,
    pub width_in: Option<f64>,
    pub depth_in: Option<f64>,
    pub height_in: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub model_number: String,
    pub version: i32,
    pub brand: String,
    pub family: String,
    pub product_line: Option<String>,
    pub controller_tier: Option<String>,
    pub status: ProductStatus,
    pub fixed: FixedColumns,
    pub specs: BTreeMap<String, SpecValue>,
    pub certifications: BTreeSet<String>,
    pub revision: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(model_number: impl Into<String>, brand: impl Into<String>, family: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model_number: model_number.into(),
            version: 1,
            brand: brand.into(),
            family: family.into(),
            product_line: None,
            controller_tier: None,
            status: ProductStatus::Draft,
            fixed: FixedColumns::default(),
            specs: BTreeMap::new(),
            certifications: BTreeSet::new(),
            revision: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVersionSnapshot {
    pub product_id: Uuid,
    pub version: i32,
    pub record: serde_json::Value,
    pub change_summary: String,
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Supersedes,
    EquivalentTo,
    CompatibleWith,
    AccessoryFor,
    VariantOf,
    RebrandOf,
}

impl RelationshipKind {
    /// §3: cycles are allowed only for symmetric kinds.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationshipKind::EquivalentTo | RelationshipKind::CompatibleWith)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRelationship {
    pub source: Uuid,
    pub target: Uuid,
    pub kind: RelationshipKind,
    pub confidence: f64,
    pub auto_detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    ProductDataSheet,
    CutSheet,
    FeatureList,
    PerformanceDataSheet,
    DimensionalDrawing,
    ProductImage,
    SelectionGuide,
    InstallManual,
    Marketing,
    Catalog,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Superseded,
    Quarantined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub stage: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub doc_type: DocType,
    pub mime_type: String,
    pub source_uri: String,
    pub checksum_sha256: String,
    pub page_count: i32,
    pub extracted_text: String,
    pub brand: Option<String>,
    pub status: DocumentStatus,
    pub processing_log: Vec<ProcessingLogEntry>,
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRelevance {
    Primary,
    Mentioned,
    Accessory,
    Related,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProductLink {
    pub document_id: Uuid,
    pub product_id: Uuid,
    pub relevance: LinkRelevance,
    pub extracted_specs: BTreeMap<String, SpecValue>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    SpecBlock,
    Header,
    PerformanceData,
    Dimensional,
    Description,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub chunk_type: ChunkType,
    pub page_number: Option<i32>,
    pub section_title: Option<String>,
    pub product_ids: BTreeSet<Uuid>,
    pub spec_names: BTreeSet<String>,
    pub embedding: Option<Vec<f32>>,
    pub token_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Pending,
    KeepExisting,
    AcceptNew,
    ManualOverride,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecConflict {
    pub id: Uuid,
    pub product_id: Uuid,
    pub spec_name: String,
    pub existing_value: SpecValue,
    pub new_value: SpecValue,
    pub source_doc_id: Uuid,
    pub existing_doc_id: Option<Uuid>,
    pub severity: ConflictSeverity,
    pub resolution: ConflictResolution,
    pub resolved_value: Option<SpecValue>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquivalenceRule {
    pub family: String,
    pub required_match: BTreeSet<String>,
    pub tolerance_map: BTreeMap<String, f64>,
    pub priority_specs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPattern {
    pub id: Uuid,
    pub brand: String,
    pub pattern_regex: String,
    pub family: String,
    pub product_line: Option<String>,
    pub controller_tier: Option<String>,
    /// capture-group index -> canonical_name
    pub field_map: BTreeMap<usize, String>,
    /// capture-group index -> (captured literal -> canonical enum value)
    pub value_map: BTreeMap<usize, BTreeMap<String, String>>,
    pub priority: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCounters {
    pub total_files: i32,
    pub processed_files: i32,
    pub failed_files: i32,
    pub new_products: i32,
    pub updated_products: i32,
    pub conflicts_raised: i32,
    pub duplicate_documents: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub caller_id: Option<String>,
    pub role: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A parsed revision date, used only for precedence comparisons (§9).
/// `outranks` encodes "missing revision never wins against a present one".
pub fn outranks(candidate: Option<NaiveDate>, incumbent: Option<NaiveDate>) -> bool {
    match (candidate, incumbent) {
        (Some(c), Some(i)) => c.signed_duration_since(i).num_days() >= 1,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_family_scope_matches_everything() {
        let entry = SpecRegistryEntry {
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
            is_critical: true,
            sort_order: 0,
            auto_discovered: false,
            approved: true,
        };
        assert!(entry.applies_to("refrigerator"));
        assert!(entry.applies_to("cryogenic"));
    }

    #[test]
    fn missing_revision_never_outranks() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        assert!(!outranks(None, Some(d)));
        assert!(outranks(Some(d), None));
        assert!(!outranks(None, None));
    }

    #[test]
    fn revision_strictly_one_day_newer_outranks() {
        let older = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let newer = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
        let tied = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(outranks(Some(newer), Some(older)));
        assert!(!outranks(Some(tied), Some(older)));
    }
}
