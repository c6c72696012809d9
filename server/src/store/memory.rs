//! In-memory `CatalogStore` used by the integration test harness (§10.4).
//! Implements the same upsert/versioning/conflict-lifecycle contract as
//! `postgres::PostgresStore`, just backed by `std::sync::Mutex` maps
//! instead of a real connection pool.

use async_trait::async_trait;
use catalog_core::error::{CoreError, CoreResult};
use catalog_core::types::{
    AuditLogEntry, Chunk, Document, DocumentProductLink, Product, ProductVersionSnapshot, SpecConflict,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{CatalogStore, ChunkSearchHit, ProductFilter};

#[derive(Default)]
struct Inner {
    products_by_id: HashMap<Uuid, Product>,
    model_index: HashMap<String, Uuid>,
    snapshots: HashMap<Uuid, Vec<ProductVersionSnapshot>>,
    documents_by_id: HashMap<Uuid, Document>,
    documents_by_checksum: HashMap<String, Uuid>,
    links: Vec<DocumentProductLink>,
    conflicts: HashMap<Uuid, SpecConflict>,
    chunks: Vec<Chunk>,
    audit_log: Vec<AuditLogEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn upsert_product(&self, mut product: Product, change_summary: &str, changed_by: Option<&str>) -> CoreResult<Product> {
        let mut inner = self.inner.lock().expect("catalog store mutex poisoned");

        if let Some(&existing_id) = inner.model_index.get(&product.model_number) {
            let pre_image = inner.products_by_id.get(&existing_id).cloned();
            if let Some(pre) = pre_image {
                product.id = pre.id;
                product.version = pre.version + 1;
                let snapshot = ProductVersionSnapshot {
                    product_id: pre.id,
                    version: pre.version,
                    record: serde_json::to_value(&pre).unwrap_or(serde_json::Value::Null),
                    change_summary: change_summary.to_string(),
                    changed_by: changed_by.map(|s| s.to_string()),
                    created_at: chrono::Utc::now(),
                };
                inner.snapshots.entry(pre.id).or_default().push(snapshot);
            }
        } else {
            inner.model_index.insert(product.model_number.clone(), product.id);
        }

        product.updated_at = chrono::Utc::now();
        inner.products_by_id.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        Ok(self.inner.lock().expect("poisoned").products_by_id.get(&id).cloned())
    }

    async fn get_product_by_model_number(&self, model_number: &str) -> CoreResult<Option<Product>> {
        let inner = self.inner.lock().expect("poisoned");
        Ok(inner.model_index.get(model_number).and_then(|id| inner.products_by_id.get(id)).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>> {
        let inner = self.inner.lock().expect("poisoned");
        Ok(inner
            .products_by_id
            .values()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect())
    }

    async fn list_version_snapshots(&self, product_id: Uuid) -> CoreResult<Vec<ProductVersionSnapshot>> {
        Ok(self.inner.lock().expect("poisoned").snapshots.get(&product_id).cloned().unwrap_or_default())
    }

    async fn get_document_by_checksum(&self, checksum: &str) -> CoreResult<Option<Document>> {
        let inner = self.inner.lock().expect("poisoned");
        Ok(inner.documents_by_checksum.get(checksum).and_then(|id| inner.documents_by_id.get(id)).cloned())
    }

    async fn insert_document(&self, document: Document) -> CoreResult<Document> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.documents_by_checksum.insert(document.checksum_sha256.clone(), document.id);
        inner.documents_by_id.insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_document(&self, document: Document) -> CoreResult<Document> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.documents_by_id.insert(document.id, document.clone());
        Ok(document)
    }

    async fn link_document_product(&self, link: DocumentProductLink) -> CoreResult<()> {
        self.inner.lock().expect("poisoned").links.push(link);
        Ok(())
    }

    async fn raise_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.conflicts.insert(conflict.id, conflict.clone());
        Ok(conflict)
    }

    async fn list_pending_conflicts(&self, product_id: Option<Uuid>) -> CoreResult<Vec<SpecConflict>> {
        let inner = self.inner.lock().expect("poisoned");
        Ok(inner
            .conflicts
            .values()
            .filter(|c| matches!(c.resolution, catalog_core::types::ConflictResolution::Pending))
            .filter(|c| product_id.map(|pid| pid == c.product_id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_conflict(&self, id: Uuid) -> CoreResult<Option<SpecConflict>> {
        Ok(self.inner.lock().expect("poisoned").conflicts.get(&id).cloned())
    }

    async fn resolve_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict> {
        let mut inner = self.inner.lock().expect("poisoned");
        let current = inner.conflicts.get(&conflict.id).cloned();
        match current {
            Some(c) if matches!(c.resolution, catalog_core::types::ConflictResolution::Pending) => {
                inner.conflicts.insert(conflict.id, conflict.clone());
                Ok(conflict)
            }
            Some(_) => Err(CoreError::validation("conflict_resolution", "conflict already resolved")),
            None => Err(CoreError::not_found("conflict not found")),
        }
    }

    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> CoreResult<()> {
        self.inner.lock().expect("poisoned").chunks.extend(chunks);
        Ok(())
    }

    async fn vector_search(&self, query_embedding: &[f32], top_k: usize) -> CoreResult<Vec<ChunkSearchHit>> {
        let inner = self.inner.lock().expect("poisoned");
        let mut hits: Vec<ChunkSearchHit> = inner
            .chunks
            .iter()
            .filter_map(|c| c.embedding.as_ref().map(|e| (c, cosine_similarity(query_embedding, e))))
            .map(|(chunk, score)| ChunkSearchHit { chunk: chunk.clone(), score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn lexical_search(&self, query: &str, top_k: usize) -> CoreResult<Vec<ChunkSearchHit>> {
        let terms: Vec<String> = query.to_lowercase().split_whitespace().map(|s| s.to_string()).collect();
        let inner = self.inner.lock().expect("poisoned");
        let mut hits: Vec<ChunkSearchHit> = inner
            .chunks
            .iter()
            .map(|c| {
                let lower = c.content.to_lowercase();
                let score = terms.iter().filter(|t| lower.contains(t.as_str())).count() as f64;
                ChunkSearchHit { chunk: c.clone(), score }
            })
            .filter(|h| h.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn append_audit_entry(&self, entry: AuditLogEntry) -> CoreResult<()> {
        self.inner.lock().expect("poisoned").audit_log.push(entry);
        Ok(())
    }

    async fn stats(&self) -> CoreResult<serde_json::Value> {
        let inner = self.inner.lock().expect("poisoned");
        Ok(serde_json::json!({
            "products": inner.products_by_id.len(),
            "documents": inner.documents_by_id.len(),
            "chunks": inner.chunks.len(),
            "pending_conflicts": inner.conflicts.values().filter(|c| matches!(c.resolution, catalog_core::types::ConflictResolution::Pending)).count(),
        }))
    }
}

fn matches_filter(p: &Product, filter: &ProductFilter) -> bool {
    if let Some(brand) = &filter.brand {
        if !p.brand.eq_ignore_ascii_case(brand) {
            return false;
        }
    }
    if let Some(family) = &filter.family {
        if !p.family.eq_ignore_ascii_case(family) {
            return false;
        }
    }
    if let Some(min) = filter.capacity_min {
        if p.fixed.capacity_cuft.map(|c| c < min).unwrap_or(true) {
            return false;
        }
    }
    if let Some(max) = filter.capacity_max {
        if p.fixed.capacity_cuft.map(|c| c > max).unwrap_or(true) {
            return false;
        }
    }
    if let Some(min) = filter.temp_min_c {
        if p.fixed.temp_range_min_c.map(|t| t < min).unwrap_or(true) {
            return false;
        }
    }
    if let Some(max) = filter.temp_max_c {
        if p.fixed.temp_range_max_c.map(|t| t > max).unwrap_or(true) {
            return false;
        }
    }
    if let Some(door_type) = &filter.door_type {
        if p.fixed.door_type.as_deref() != Some(door_type.as_str()) {
            return false;
        }
    }
    for cert in &filter.certifications {
        if !p.certifications.iter().any(|c| c.eq_ignore_ascii_case(cert)) {
            return false;
        }
    }
    if let Some(text) = &filter.free_text {
        let haystack = format!("{} {} {}", p.model_number, p.product_line.clone().unwrap_or_default(), p.description.clone().unwrap_or_default());
        if !haystack.to_lowercase().contains(&text.to_lowercase()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::types::SpecValue;

    #[tokio::test]
    async fn second_upsert_with_same_model_number_increments_version_and_snapshots() {
        let store = InMemoryStore::new();
        let mut product = Product::new("ABT-HC-26S", "ABS", "refrigerator");
        product.specs.insert("storage_capacity_cuft".into(), SpecValue::Numeric { value: 26.0, unit: None });
        let first = store.upsert_product(product.clone(), "initial ingest", None).await.unwrap();
        assert_eq!(first.version, 1);

        let mut updated = first.clone();
        updated.specs.insert("storage_capacity_cuft".into(), SpecValue::Numeric { value: 25.8, unit: None });
        let second = store.upsert_product(updated, "revision update", None).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.id, first.id);

        let snapshots = store.list_version_snapshots(first.id).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].version, 1);
    }

    #[tokio::test]
    async fn conflict_cannot_be_resolved_twice() {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();
        let conflict = SpecConflict {
            id: Uuid::new_v4(),
            product_id,
            spec_name: "storage_capacity_cuft".into(),
            existing_value: SpecValue::Numeric { value: 26.0, unit: None },
            new_value: SpecValue::Numeric { value: 25.8, unit: None },
            source_doc_id: Uuid::new_v4(),
            existing_doc_id: None,
            severity: catalog_core::types::ConflictSeverity::Medium,
            resolution: catalog_core::types::ConflictResolution::Pending,
            resolved_value: None,
            resolved_at: None,
            created_at: chrono::Utc::now(),
        };
        store.raise_conflict(conflict.clone()).await.unwrap();

        let mut resolved = conflict.clone();
        resolved.resolution = catalog_core::types::ConflictResolution::AcceptNew;
        store.resolve_conflict(resolved.clone()).await.unwrap();

        let second_attempt = store.resolve_conflict(resolved).await;
        assert!(second_attempt.is_err());
    }
}
