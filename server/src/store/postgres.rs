//! Postgres-backed `CatalogStore` (§4.8, §6): the production implementor.
//! Schema assumptions (migrations live under `migrations/`):
//!   products(id uuid pk, model_number text unique, version int, brand text,
//!            family text, fixed jsonb, specs jsonb, certifications text[],
//!            status text, revision text, description text, ...)
//!   product_version_snapshots(product_id, version, record jsonb, ...)
//!   documents(id uuid pk, checksum_sha256 text unique, ...)
//!   document_product_links(document_id, product_id, ...)
//!   spec_conflicts(id uuid pk, resolution text, ...)
//!   chunks(id uuid pk, document_id, embedding vector(N), content text, ...)
//!   audit_log(id uuid pk, ..., append-only — no UPDATE/DELETE grant)
//!
//! Row-level locking on `upsert_product` and `resolve_conflict` uses
//! `SELECT ... FOR UPDATE` inside a transaction so two concurrent ingests
//! of the same `model_number` serialize instead of racing.

use async_trait::async_trait;
use catalog_core::error::{CoreError, CoreResult};
use catalog_core::types::{
    AuditLogEntry, Chunk, ChunkType, Document, DocumentProductLink, FixedColumns, Product, ProductStatus,
    ProductVersionSnapshot, SpecConflict, SpecValue,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{CatalogStore, ChunkSearchHit, ProductFilter};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> CoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> CoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))
    }

    fn row_to_product(row: &sqlx::postgres::PgRow) -> Result<Product, sqlx::Error> {
        let specs_json: serde_json::Value = row.try_get("specs")?;
        let specs: BTreeMap<String, SpecValue> = serde_json::from_value(specs_json).unwrap_or_default();
        let fixed_json: serde_json::Value = row.try_get("fixed")?;
        let fixed: FixedColumns = serde_json::from_value(fixed_json).unwrap_or_default();
        let certs: Vec<String> = row.try_get("certifications")?;
        let status_str: String = row.try_get("status")?;
        let status = match status_str.as_str() {
            "draft" => ProductStatus::Draft,
            "pending_review" => ProductStatus::PendingReview,
            "active" => ProductStatus::Active,
            "discontinued" => ProductStatus::Discontinued,
            _ => ProductStatus::Deprecated,
        };
        Ok(Product {
            id: row.try_get("id")?,
            model_number: row.try_get("model_number")?,
            version: row.try_get("version")?,
            brand: row.try_get("brand")?,
            family: row.try_get("family")?,
            product_line: row.try_get("product_line")?,
            controller_tier: row.try_get("controller_tier")?,
            status,
            fixed,
            specs,
            certifications: certs.into_iter().collect::<BTreeSet<_>>(),
            revision: row.try_get("revision")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn status_str(status: ProductStatus) -> &'static str {
        match status {
            ProductStatus::Draft => "draft",
            ProductStatus::PendingReview => "pending_review",
            ProductStatus::Active => "active",
            ProductStatus::Discontinued => "discontinued",
            ProductStatus::Deprecated => "deprecated",
        }
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn upsert_product(&self, mut product: Product, change_summary: &str, changed_by: Option<&str>) -> CoreResult<Product> {
        let mut tx = self.pool.begin().await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        let existing = sqlx::query(
            "SELECT id, model_number, version, brand, family, product_line, controller_tier, status, \
             fixed, specs, certifications, revision, description, created_at, updated_at \
             FROM products WHERE model_number = $1 FOR UPDATE",
        )
        .bind(&product.model_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        if let Some(row) = existing {
            let pre = Self::row_to_product(&row).map_err(|e| CoreError::store_unavailable(e.to_string()))?;
            product.id = pre.id;
            product.version = pre.version + 1;

            sqlx::query(
                "INSERT INTO product_version_snapshots (product_id, version, record, change_summary, changed_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, now())",
            )
            .bind(pre.id)
            .bind(pre.version)
            .bind(serde_json::to_value(&pre).unwrap_or(serde_json::Value::Null))
            .bind(change_summary)
            .bind(changed_by)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

            sqlx::query(
                "UPDATE products SET version = $2, brand = $3, family = $4, product_line = $5, \
                 controller_tier = $6, status = $7, fixed = $8, specs = $9, certifications = $10, \
                 revision = $11, description = $12, updated_at = now() WHERE id = $1",
            )
            .bind(product.id)
            .bind(product.version)
            .bind(&product.brand)
            .bind(&product.family)
            .bind(&product.product_line)
            .bind(&product.controller_tier)
            .bind(Self::status_str(product.status))
            .bind(serde_json::to_value(&product.fixed).unwrap_or(serde_json::Value::Null))
            .bind(serde_json::to_value(&product.specs).unwrap_or(serde_json::Value::Null))
            .bind(product.certifications.iter().cloned().collect::<Vec<_>>())
            .bind(&product.revision)
            .bind(&product.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        } else {
            sqlx::query(
                "INSERT INTO products (id, model_number, version, brand, family, product_line, \
                 controller_tier, status, fixed, specs, certifications, revision, description, \
                 created_at, updated_at) \
                 VALUES ($1, $2, 1, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now(), now())",
            )
            .bind(product.id)
            .bind(&product.model_number)
            .bind(&product.brand)
            .bind(&product.family)
            .bind(&product.product_line)
            .bind(&product.controller_tier)
            .bind(Self::status_str(product.status))
            .bind(serde_json::to_value(&product.fixed).unwrap_or(serde_json::Value::Null))
            .bind(serde_json::to_value(&product.specs).unwrap_or(serde_json::Value::Null))
            .bind(product.certifications.iter().cloned().collect::<Vec<_>>())
            .bind(&product.revision)
            .bind(&product.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
            product.version = 1;
        }

        tx.commit().await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, model_number, version, brand, family, product_line, controller_tier, status, \
             fixed, specs, certifications, revision, description, created_at, updated_at \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        row.map(|r| Self::row_to_product(&r).map_err(|e| CoreError::store_unavailable(e.to_string()))).transpose()
    }

    async fn get_product_by_model_number(&self, model_number: &str) -> CoreResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, model_number, version, brand, family, product_line, controller_tier, status, \
             fixed, specs, certifications, revision, description, created_at, updated_at \
             FROM products WHERE model_number = $1",
        )
        .bind(model_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        row.map(|r| Self::row_to_product(&r).map_err(|e| CoreError::store_unavailable(e.to_string()))).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>> {
        let mut sql = String::from(
            "SELECT id, model_number, version, brand, family, product_line, controller_tier, status, \
             fixed, specs, certifications, revision, description, created_at, updated_at FROM products WHERE 1=1",
        );
        if filter.brand.is_some() {
            sql.push_str(" AND brand ILIKE $1");
        }
        // family/capacity/temp/door_type/certifications/free_text are applied in
        // Rust after the fetch (matches_remaining_filters) rather than built into
        // the SQL, since most of them read out of the `fixed` jsonb column.
        let mut query = sqlx::query(&sql);
        if let Some(brand) = &filter.brand {
            query = query.bind(brand.clone());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        rows.iter()
            .map(|r| Self::row_to_product(r).map_err(|e| CoreError::store_unavailable(e.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(|products| products.into_iter().filter(|p| matches_remaining_filters(p, filter)).collect())
    }

    async fn list_version_snapshots(&self, product_id: Uuid) -> CoreResult<Vec<ProductVersionSnapshot>> {
        let rows = sqlx::query(
            "SELECT product_id, version, record, change_summary, changed_by, created_at \
             FROM product_version_snapshots WHERE product_id = $1 ORDER BY version ASC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ProductVersionSnapshot {
                product_id: row.get("product_id"),
                version: row.get("version"),
                record: row.get("record"),
                change_summary: row.get("change_summary"),
                changed_by: row.get("changed_by"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn get_document_by_checksum(&self, checksum: &str) -> CoreResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, doc_type, mime_type, source_uri, checksum_sha256, page_count, \
             extracted_text, brand, status, processing_log, version, created_at \
             FROM documents WHERE checksum_sha256 = $1",
        )
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        row.map(|r| row_to_document(&r)).transpose()
    }

    async fn insert_document(&self, document: Document) -> CoreResult<Document> {
        sqlx::query(
            "INSERT INTO documents (id, filename, doc_type, mime_type, source_uri, checksum_sha256, \
             page_count, extracted_text, brand, status, processing_log, version, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(document.id)
        .bind(&document.filename)
        .bind(doc_type_str(document.doc_type))
        .bind(&document.mime_type)
        .bind(&document.source_uri)
        .bind(&document.checksum_sha256)
        .bind(document.page_count)
        .bind(&document.extracted_text)
        .bind(&document.brand)
        .bind(document_status_str(document.status))
        .bind(serde_json::to_value(&document.processing_log).unwrap_or(serde_json::Value::Null))
        .bind(&document.version)
        .bind(document.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(document)
    }

    async fn update_document(&self, document: Document) -> CoreResult<Document> {
        sqlx::query(
            "UPDATE documents SET status = $2, processing_log = $3, extracted_text = $4, page_count = $5 \
             WHERE id = $1",
        )
        .bind(document.id)
        .bind(document_status_str(document.status))
        .bind(serde_json::to_value(&document.processing_log).unwrap_or(serde_json::Value::Null))
        .bind(&document.extracted_text)
        .bind(document.page_count)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(document)
    }

    async fn link_document_product(&self, link: DocumentProductLink) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO document_product_links (document_id, product_id, relevance, extracted_specs, confidence) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (document_id, product_id) DO UPDATE SET relevance = $3, extracted_specs = $4, confidence = $5",
        )
        .bind(link.document_id)
        .bind(link.product_id)
        .bind(link_relevance_str(link.relevance))
        .bind(serde_json::to_value(&link.extracted_specs).unwrap_or(serde_json::Value::Null))
        .bind(link.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn raise_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict> {
        sqlx::query(
            "INSERT INTO spec_conflicts (id, product_id, spec_name, existing_value, new_value, \
             source_doc_id, existing_doc_id, severity, resolution, resolved_value, resolved_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(conflict.id)
        .bind(conflict.product_id)
        .bind(&conflict.spec_name)
        .bind(serde_json::to_value(&conflict.existing_value).unwrap_or(serde_json::Value::Null))
        .bind(serde_json::to_value(&conflict.new_value).unwrap_or(serde_json::Value::Null))
        .bind(conflict.source_doc_id)
        .bind(conflict.existing_doc_id)
        .bind(conflict_severity_str(conflict.severity))
        .bind(conflict_resolution_str(conflict.resolution))
        .bind(conflict.resolved_value.as_ref().map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
        .bind(conflict.resolved_at)
        .bind(conflict.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(conflict)
    }

    async fn list_pending_conflicts(&self, product_id: Option<Uuid>) -> CoreResult<Vec<SpecConflict>> {
        let rows = if let Some(pid) = product_id {
            sqlx::query(
                "SELECT id, product_id, spec_name, existing_value, new_value, source_doc_id, \
                 existing_doc_id, severity, resolution, resolved_value, resolved_at, created_at \
                 FROM spec_conflicts WHERE resolution = 'pending' AND product_id = $1",
            )
            .bind(pid)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT id, product_id, spec_name, existing_value, new_value, source_doc_id, \
                 existing_doc_id, severity, resolution, resolved_value, resolved_at, created_at \
                 FROM spec_conflicts WHERE resolution = 'pending'",
            )
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        rows.iter().map(row_to_conflict).collect()
    }

    async fn get_conflict(&self, id: Uuid) -> CoreResult<Option<SpecConflict>> {
        let row = sqlx::query(
            "SELECT id, product_id, spec_name, existing_value, new_value, source_doc_id, \
             existing_doc_id, severity, resolution, resolved_value, resolved_at, created_at \
             FROM spec_conflicts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        row.map(|r| row_to_conflict(&r)).transpose()
    }

    async fn resolve_conflict(&self, conflict: SpecConflict) -> CoreResult<SpecConflict> {
        let mut tx = self.pool.begin().await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        let current = sqlx::query("SELECT resolution FROM spec_conflicts WHERE id = $1 FOR UPDATE")
            .bind(conflict.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        match current {
            None => Err(CoreError::not_found("conflict not found")),
            Some(row) => {
                let resolution: String = row.get("resolution");
                if resolution != "pending" {
                    return Err(CoreError::validation("conflict_resolution", "conflict already resolved"));
                }
                sqlx::query(
                    "UPDATE spec_conflicts SET resolution = $2, resolved_value = $3, resolved_at = now() WHERE id = $1",
                )
                .bind(conflict.id)
                .bind(conflict_resolution_str(conflict.resolution))
                .bind(conflict.resolved_value.as_ref().map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
                .execute(&mut *tx)
                .await
                .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
                tx.commit().await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;
                Ok(conflict)
            }
        }
    }

    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, content, chunk_type, page_number, \
                 section_title, product_ids, spec_names, embedding, token_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(chunk.id)
            .bind(chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk_type_str(chunk.chunk_type))
            .bind(chunk.page_number)
            .bind(&chunk.section_title)
            .bind(chunk.product_ids.iter().cloned().collect::<Vec<_>>())
            .bind(chunk.spec_names.iter().cloned().collect::<Vec<_>>())
            .bind(chunk.embedding.as_ref())
            .bind(chunk.token_count)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CoreError::store_unavailable(e.to_string()))
    }

    async fn vector_search(&self, query_embedding: &[f32], top_k: usize) -> CoreResult<Vec<ChunkSearchHit>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, chunk_type, page_number, section_title, \
             product_ids, spec_names, embedding, token_count, 1 - (embedding <=> $1) AS score \
             FROM chunks WHERE embedding IS NOT NULL ORDER BY embedding <=> $1 LIMIT $2",
        )
        .bind(query_embedding)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let score: f64 = row.get("score");
                row_to_chunk(row).map(|chunk| ChunkSearchHit { chunk, score })
            })
            .collect()
    }

    async fn lexical_search(&self, query: &str, top_k: usize) -> CoreResult<Vec<ChunkSearchHit>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, chunk_type, page_number, section_title, \
             product_ids, spec_names, embedding, token_count, \
             ts_rank_cd(to_tsvector('english', content), plainto_tsquery('english', $1)) AS score \
             FROM chunks WHERE to_tsvector('english', content) @@ plainto_tsquery('english', $1) \
             ORDER BY score DESC LIMIT $2",
        )
        .bind(query)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let score: f64 = row.get("score");
                row_to_chunk(row).map(|chunk| ChunkSearchHit { chunk, score })
            })
            .collect()
    }

    async fn append_audit_entry(&self, entry: AuditLogEntry) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (id, caller_id, role, action, entity_type, entity_id, detail, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(&entry.caller_id)
        .bind(&entry.role)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.detail)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn stats(&self) -> CoreResult<serde_json::Value> {
        let row = sqlx::query(
            "SELECT \
               (SELECT count(*) FROM products) AS products, \
               (SELECT count(*) FROM documents) AS documents, \
               (SELECT count(*) FROM chunks) AS chunks, \
               (SELECT count(*) FROM spec_conflicts WHERE resolution = 'pending') AS pending_conflicts",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;

        let products: i64 = row.get("products");
        let documents: i64 = row.get("documents");
        let chunks: i64 = row.get("chunks");
        let pending_conflicts: i64 = row.get("pending_conflicts");
        Ok(serde_json::json!({
            "products": products,
            "documents": documents,
            "chunks": chunks,
            "pending_conflicts": pending_conflicts,
        }))
    }
}

fn matches_remaining_filters(p: &Product, filter: &ProductFilter) -> bool {
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

fn row_to_document(row: &sqlx::postgres::PgRow) -> CoreResult<Document> {
    let doc_type_raw: String = row.try_get("doc_type").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let status_raw: String = row.try_get("status").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let log_json: serde_json::Value = row.try_get("processing_log").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    Ok(Document {
        id: row.try_get("id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        filename: row.try_get("filename").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        doc_type: doc_type_from_str(&doc_type_raw),
        mime_type: row.try_get("mime_type").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        source_uri: row.try_get("source_uri").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        checksum_sha256: row.try_get("checksum_sha256").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        page_count: row.try_get("page_count").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        extracted_text: row.try_get("extracted_text").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        brand: row.try_get("brand").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        status: document_status_from_str(&status_raw),
        processing_log: serde_json::from_value(log_json).unwrap_or_default(),
        version: row.try_get("version").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
    })
}

fn row_to_conflict(row: &sqlx::postgres::PgRow) -> CoreResult<SpecConflict> {
    let existing_json: serde_json::Value = row.try_get("existing_value").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let new_json: serde_json::Value = row.try_get("new_value").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let resolved_json: Option<serde_json::Value> = row.try_get("resolved_value").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let severity_raw: String = row.try_get("severity").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let resolution_raw: String = row.try_get("resolution").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    Ok(SpecConflict {
        id: row.try_get("id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        product_id: row.try_get("product_id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        spec_name: row.try_get("spec_name").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        existing_value: serde_json::from_value(existing_json).map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        new_value: serde_json::from_value(new_json).map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        source_doc_id: row.try_get("source_doc_id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        existing_doc_id: row.try_get("existing_doc_id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        severity: conflict_severity_from_str(&severity_raw),
        resolution: conflict_resolution_from_str(&resolution_raw),
        resolved_value: resolved_json.and_then(|v| serde_json::from_value(v).ok()),
        resolved_at: row.try_get("resolved_at").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
    })
}

fn row_to_chunk(row: &sqlx::postgres::PgRow) -> CoreResult<Chunk> {
    let chunk_type_raw: String = row.try_get("chunk_type").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let product_ids: Vec<Uuid> = row.try_get("product_ids").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    let spec_names: Vec<String> = row.try_get("spec_names").map_err(|e| CoreError::store_unavailable(e.to_string()))?;
    Ok(Chunk {
        id: row.try_get("id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        document_id: row.try_get("document_id").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        chunk_index: row.try_get("chunk_index").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        content: row.try_get("content").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        chunk_type: chunk_type_from_str(&chunk_type_raw),
        page_number: row.try_get("page_number").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        section_title: row.try_get("section_title").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        product_ids: product_ids.into_iter().collect(),
        spec_names: spec_names.into_iter().collect(),
        embedding: row.try_get("embedding").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
        token_count: row.try_get("token_count").map_err(|e| CoreError::store_unavailable(e.to_string()))?,
    })
}

fn doc_type_str(d: catalog_core::types::DocType) -> &'static str {
    use catalog_core::types::DocType::*;
    match d {
        ProductDataSheet => "product_data_sheet",
        CutSheet => "cut_sheet",
        FeatureList => "feature_list",
        PerformanceDataSheet => "performance_data_sheet",
        DimensionalDrawing => "dimensional_drawing",
        ProductImage => "product_image",
        SelectionGuide => "selection_guide",
        InstallManual => "install_manual",
        Marketing => "marketing",
        Catalog => "catalog",
        Other => "other",
    }
}

fn doc_type_from_str(s: &str) -> catalog_core::types::DocType {
    use catalog_core::types::DocType::*;
    match s {
        "product_data_sheet" => ProductDataSheet,
        "cut_sheet" => CutSheet,
        "feature_list" => FeatureList,
        "performance_data_sheet" => PerformanceDataSheet,
        "dimensional_drawing" => DimensionalDrawing,
        "product_image" => ProductImage,
        "selection_guide" => SelectionGuide,
        "install_manual" => InstallManual,
        "marketing" => Marketing,
        "catalog" => Catalog,
        _ => Other,
    }
}

fn document_status_str(s: catalog_core::types::DocumentStatus) -> &'static str {
    use catalog_core::types::DocumentStatus::*;
    match s {
        Pending => "pending",
        Processing => "processing",
        Processed => "processed",
        Failed => "failed",
        Superseded => "superseded",
        Quarantined => "quarantined",
    }
}

fn document_status_from_str(s: &str) -> catalog_core::types::DocumentStatus {
    use catalog_core::types::DocumentStatus::*;
    match s {
        "pending" => Pending,
        "processing" => Processing,
        "processed" => Processed,
        "failed" => Failed,
        "superseded" => Superseded,
        _ => Quarantined,
    }
}

fn link_relevance_str(r: catalog_core::types::LinkRelevance) -> &'static str {
    use catalog_core::types::LinkRelevance::*;
    match r {
        Primary => "primary",
        Mentioned => "mentioned",
        Accessory => "accessory",
        Related => "related",
    }
}

fn conflict_severity_str(s: catalog_core::types::ConflictSeverity) -> &'static str {
    use catalog_core::types::ConflictSeverity::*;
    match s {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

fn conflict_severity_from_str(s: &str) -> catalog_core::types::ConflictSeverity {
    use catalog_core::types::ConflictSeverity::*;
    match s {
        "low" => Low,
        "medium" => Medium,
        "high" => High,
        _ => Critical,
    }
}

fn conflict_resolution_str(r: catalog_core::types::ConflictResolution) -> &'static str {
    use catalog_core::types::ConflictResolution::*;
    match r {
        Pending => "pending",
        KeepExisting => "keep_existing",
        AcceptNew => "accept_new",
        ManualOverride => "manual_override",
        Dismissed => "dismissed",
    }
}

fn conflict_resolution_from_str(s: &str) -> catalog_core::types::ConflictResolution {
    use catalog_core::types::ConflictResolution::*;
    match s {
        "pending" => Pending,
        "keep_existing" => KeepExisting,
        "accept_new" => AcceptNew,
        "manual_override" => ManualOverride,
        _ => Dismissed,
    }
}

fn chunk_type_str(c: ChunkType) -> &'static str {
    match c {
        ChunkType::Text => "text",
        ChunkType::Table => "table",
        ChunkType::SpecBlock => "spec_block",
        ChunkType::Header => "header",
        ChunkType::PerformanceData => "performance_data",
        ChunkType::Dimensional => "dimensional",
        ChunkType::Description => "description",
    }
}

fn chunk_type_from_str(s: &str) -> ChunkType {
    match s {
        "text" => ChunkType::Text,
        "table" => ChunkType::Table,
        "spec_block" => ChunkType::SpecBlock,
        "header" => ChunkType::Header,
        "performance_data" => ChunkType::PerformanceData,
        "dimensional" => ChunkType::Dimensional,
        _ => ChunkType::Description,
    }
}
