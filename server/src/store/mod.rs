//! Catalog Store (§4.8, §6): the trait every pipeline stage and HTTP
//! handler depends on. Two implementors: `postgres` (the real relational +
//! vector store) and `memory` (an in-process fake for integration tests,
//! following the standard Rust pattern of testing an async trait without a
//! live database).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use catalog_core::error::CoreResult;
use catalog_core::types::{
    AuditLogEntry, Chunk, Document, DocumentProductLink, Product, ProductVersionSnapshot, SpecConflict,
};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub brand: Option<String>,
    pub family: Option<String>,
    pub capacity_min: Option<f64>,
    pub capacity_max: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub door_type: Option<String>,
    /// contains-all
    pub certifications: Vec<String>,
    pub free_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChunkSearchHit {
    pub chunk: Chunk,
    pub score: f64,
}

/// §4.8: transactional upsert, version snapshotting, finder API, append-only
/// audit log and conflict lifecycle, all behind one trait so the pipeline
/// and retrieval engine never depend on a concrete database driver.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// §3 invariant: `version` increases monotonically per `model_number`;
    /// every mutation snapshots the pre-image in the same transaction.
    async fn upsert_product(&self, product: Product, change_summary: &str, changed_by: Option<&str>) -> CoreResult<Product>;

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>>;

    async fn get_product_by_model_number(&self, model_number: &str) -> CoreResult<Option<Product>>;

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>>;

    async fn list_version_snapshots(&self, product_id: Uuid) -> CoreResult<Vec<ProductVersionSnapshot>>;

    /// §3 invariant: `checksum_sha256` is the idempotency key.
    async fn get_document_by_checksum(&self, checksum: &str) -> CoreResult<Option<Document>>;

    async fn insert_document(&self, document: Document) -> CoreResult<Document>;

    async fn update_document(&self, document: Document) -> CoreResult<Document>;

    async fn link_document_product(&self, link: DocumentProductLink) -> CoreResult<()>;

    async fn raise_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict>;

    async fn list_pending_conflicts(&self, product_id: Option<Uuid>) -> CoreResult<Vec<SpecConflict>>;

    async fn get_conflict(&self, id: Uuid) -> CoreResult<Option<SpecConflict>>;

    /// Terminal resolution (§4.7): each conflict mutates exactly once.
    async fn resolve_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict>;

    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> CoreResult<()>;

    /// Cosine-distance nearest-neighbor search over chunk embeddings
    /// (§4.10 step 3).
    async fn vector_search(&self, query_embedding: &[f32], top_k: usize) -> CoreResult<Vec<ChunkSearchHit>>;

    /// Full-text search over product + chunk content (§4.10 step 4).
    async fn lexical_search(&self, query: &str, top_k: usize) -> CoreResult<Vec<ChunkSearchHit>>;

    /// Append-only, immutable once written (§3 Audit Log Entry).
    async fn append_audit_entry(&self, entry: AuditLogEntry) -> CoreResult<()>;

    async fn stats(&self) -> CoreResult<serde_json::Value>;
}
