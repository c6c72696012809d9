//! Ingestion Orchestrator (§5): drains a bounded job queue with a fixed
//! worker pool, running each document through extraction, classification,
//! model resolution, field mapping, spec building, conflict resolution,
//! chunking and embedding, then persisting everything through the
//! `CatalogStore`. Per-`model_number` mutexes serialize concurrent writers to
//! the same product so two ingests racing on one model number apply in
//! sequence instead of clobbering each other between store read and write.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::chunker::{build_chunks, new_chunk_id};
use catalog_core::classifier::{classify_doc_type, detect_brand, extract_revision};
use catalog_core::conflict::{self, ConflictDecision};
use catalog_core::extractor::{extract, PdfTextProvider};
use catalog_core::field_mapper::{harvest_fields, map_fields};
use catalog_core::model_resolver::{check_family_conflict, resolve_models};
use catalog_core::registry::SpecRegistry;
use catalog_core::spec_builder::build_specs;
use catalog_core::types::{
    outranks, AuditLogEntry, Chunk, ConflictResolution, Document, DocType, DocumentProductLink, DocumentStatus,
    JobCounters, JobStatus, LinkRelevance, ModelPattern, ProcessingLogEntry, Product, SpecConflict, SpecValue,
};
use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Semaphore};
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::providers::EmbeddingProvider;
use crate::store::CatalogStore;

/// One file handed to the orchestrator, already decoded out of the
/// multipart body by the HTTP adapter.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub filename: String,
    pub mime_type: String,
    pub source_uri: String,
    pub bytes: Vec<u8>,
}

fn is_supported_mime(mime_type: &str) -> bool {
    matches!(mime_type, "application/pdf" | "text/plain" | "text/markdown" | "text/x-markdown")
}

struct QueuedDocument {
    job_id: Uuid,
    file: IngestFile,
    changed_by: Option<String>,
}

pub struct SubmitOutcome {
    pub job: IngestionJobView,
    pub accepted: usize,
    pub rejected: usize,
}

/// Re-exported so callers don't need to depend on `catalog_core::types`
/// directly just to read back a job.
pub type IngestionJobView = catalog_core::types::IngestionJob;

#[derive(Debug)]
enum DocumentOutcome {
    Duplicate,
    Processed { new_products: i32, updated_products: i32, conflicts_raised: i32 },
    Failed,
}

struct Inner {
    config: CatalogConfig,
    store: Arc<dyn CatalogStore>,
    registry: SpecRegistry,
    pdf_provider: Arc<dyn PdfTextProvider>,
    embedder: Arc<EmbeddingProvider>,
    model_patterns: Vec<ModelPattern>,
    known_brand_codes: Vec<String>,
    product_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    embed_semaphore: Semaphore,
    jobs: DashMap<Uuid, IngestionJobView>,
}

/// Handle to the running orchestrator. Cheap to clone; every clone shares the
/// same worker pool and job table.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
    queue_tx: mpsc::Sender<QueuedDocument>,
}

impl Orchestrator {
    /// Builds the shared state and spawns `config.worker_pool_size` workers
    /// draining a channel of depth `config.job_queue_depth` (§5).
    pub fn new(
        config: CatalogConfig,
        store: Arc<dyn CatalogStore>,
        registry: SpecRegistry,
        pdf_provider: Arc<dyn PdfTextProvider>,
        embedder: Arc<EmbeddingProvider>,
        model_patterns: Vec<ModelPattern>,
        known_brand_codes: Vec<String>,
    ) -> Self {
        let worker_count = config.worker_pool_size.max(1);
        let embed_concurrency = config.embedding_concurrency.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(config.job_queue_depth.max(1));

        let inner = Arc::new(Inner {
            config,
            store,
            registry,
            pdf_provider,
            embedder,
            model_patterns,
            known_brand_codes,
            product_locks: DashMap::new(),
            embed_semaphore: Semaphore::new(embed_concurrency),
            jobs: DashMap::new(),
        });

        let shared_rx = Arc::new(AsyncMutex::new(queue_rx));
        for worker_id in 0..worker_count {
            let inner = inner.clone();
            let shared_rx = shared_rx.clone();
            tokio::spawn(async move {
                loop {
                    let next = { shared_rx.lock().await.recv().await };
                    let Some(queued) = next else {
                        tracing::info!(worker_id, "ingestion worker shutting down, queue closed");
                        break;
                    };
                    inner.handle_queued(queued).await;
                }
            });
        }

        Self { inner, queue_tx }
    }

    /// Pre-validates mime types, enqueues the rest, and returns immediately
    /// with the job record plus accepted/rejected counts (§6 ingest response
    /// shape). Files rejected for an unsupported type or because the queue
    /// is at capacity never reach a worker.
    pub async fn submit_job(&self, files: Vec<IngestFile>, changed_by: Option<String>) -> SubmitOutcome {
        let job_id = Uuid::new_v4();
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for file in files {
            if !is_supported_mime(&file.mime_type) {
                rejected += 1;
                continue;
            }
            let queued = QueuedDocument { job_id, file, changed_by: changed_by.clone() };
            match self.queue_tx.try_send(queued) {
                Ok(()) => accepted += 1,
                Err(_) => rejected += 1,
            }
        }

        let now = Utc::now();
        let job = IngestionJobView {
            id: job_id,
            status: if accepted > 0 { JobStatus::Queued } else { JobStatus::Completed },
            counters: JobCounters { total_files: accepted as i32, ..Default::default() },
            started_at: now,
            finished_at: if accepted > 0 { None } else { Some(now) },
            metadata: serde_json::json!({ "rejected_files": rejected }),
        };
        self.inner.jobs.insert(job_id, job.clone());
        SubmitOutcome { job, accepted, rejected }
    }

    pub fn get_job(&self, id: Uuid) -> Option<IngestionJobView> {
        self.inner.jobs.get(&id).map(|j| j.clone())
    }
}

impl Inner {
    async fn handle_queued(&self, queued: QueuedDocument) {
        if let Some(mut job) = self.jobs.get_mut(&queued.job_id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Processing;
            }
        }

        let outcome = self.process_document(&queued.file, queued.changed_by.as_deref()).await;
        self.apply_outcome(queued.job_id, outcome);
    }

    fn apply_outcome(&self, job_id: Uuid, outcome: DocumentOutcome) {
        let Some(mut job) = self.jobs.get_mut(&job_id) else { return };
        job.counters.processed_files += 1;
        match outcome {
            DocumentOutcome::Duplicate => job.counters.duplicate_documents += 1,
            DocumentOutcome::Processed { new_products, updated_products, conflicts_raised } => {
                job.counters.new_products += new_products;
                job.counters.updated_products += updated_products;
                job.counters.conflicts_raised += conflicts_raised;
            }
            DocumentOutcome::Failed => job.counters.failed_files += 1,
        }
        if job.counters.processed_files >= job.counters.total_files {
            job.status = if job.counters.failed_files > 0 { JobStatus::Failed } else { JobStatus::Completed };
            job.finished_at = Some(Utc::now());
        }
    }

    /// The per-document pipeline (§5 steps 1-9). Failures at any stage are
    /// recorded on the document's `processing_log` and the document is
    /// persisted with `status: Failed` rather than dropped silently.
    async fn process_document(&self, file: &IngestFile, changed_by: Option<&str>) -> DocumentOutcome {
        let checksum = checksum_sha256(&file.bytes);

        match self.store.get_document_by_checksum(&checksum).await {
            Ok(Some(_)) => return DocumentOutcome::Duplicate,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "checksum lookup failed");
                return DocumentOutcome::Failed;
            }
        }

        let document_id = Uuid::new_v4();
        let mut log = Vec::new();
        let extracted = match tokio::time::timeout(
            Duration::from_secs(self.config.extractor_timeout_secs),
            extract(&file.bytes, &file.mime_type, self.pdf_provider.as_ref()),
        )
        .await
        {
            Ok(Ok(doc)) => {
                log.push(stage_log("extract", "ok", format!("{} pages", doc.pages.len())));
                doc
            }
            Ok(Err(e)) => {
                log.push(stage_log("extract", "failed", e.to_string()));
                self.persist_failed_document(file, &checksum, log).await;
                return DocumentOutcome::Failed;
            }
            Err(_) => {
                log.push(stage_log("extract", "failed", "timed out"));
                self.persist_failed_document(file, &checksum, log).await;
                return DocumentOutcome::Failed;
            }
        };

        let doc_type = classify_doc_type(&extracted.plain_text);
        let brand_refs: Vec<&str> = self.known_brand_codes.iter().map(|s| s.as_str()).collect();
        let brand = detect_brand(&extracted.plain_text, &brand_refs);
        let revision = extract_revision(&extracted.plain_text);
        log.push(stage_log("classify", "ok", format!("{doc_type:?}, brand={brand:?}, revision={revision:?}")));

        let mut resolved_models = resolve_models(&extracted.plain_text, brand.as_deref(), &self.model_patterns);
        log.push(stage_log("model_resolution", "ok", format!("{} candidate(s)", resolved_models.len())));

        let raw_fields = harvest_fields(&extracted.plain_text);
        let mapped = map_fields(&self.registry, &raw_fields, true);
        let specs = build_specs(&self.registry, &mapped.mapped);
        log.push(stage_log("field_mapping", "ok", format!("{} mapped, {} unmapped", mapped.mapped.len(), mapped.unmapped.len())));

        let new_revision_date = revision.as_deref().and_then(parse_revision);

        let mut new_products = 0i32;
        let mut updated_products = 0i32;
        let mut conflicts_raised = 0i32;
        let mut resolved_product_ids: BTreeSet<Uuid> = BTreeSet::new();

        for resolved in &mut resolved_models {
            let existing = match self.store.get_product_by_model_number(&resolved.model_number).await {
                Ok(p) => p,
                Err(e) => {
                    log.push(stage_log("upsert", "failed", format!("{} lookup error: {e}", resolved.model_number)));
                    continue;
                }
            };
            check_family_conflict(resolved, existing.as_ref().map(|p| p.family.as_str()));
            if let Some(warning) = &resolved.warning {
                log.push(stage_log("model_resolution", "warning", warning.clone()));
            }

            let lock = self
                .product_locks
                .entry(resolved.model_number.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone();
            let _guard = lock.lock_owned().await;

            let is_new = existing.is_none();
            let mut product = existing.unwrap_or_else(|| {
                Product::new(resolved.model_number.clone(), brand.clone().unwrap_or_else(|| "unknown".to_string()), resolved.family.clone())
            });
            if let Some(product_line) = &resolved.product_line {
                product.product_line = Some(product_line.clone());
            }
            if let Some(tier) = &resolved.controller_tier {
                product.controller_tier = Some(tier.clone());
            }

            let existing_revision_date = product.revision.as_deref().and_then(parse_revision);

            let mut combined: Vec<(String, SpecValue)> = specs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            for (name, value) in &resolved.decoded_fields {
                combined.push((name.clone(), value.clone()));
            }

            for (spec_name, new_value) in combined {
                let entry = self.registry.lookup(&spec_name);
                let existing_value = product.specs.get(&spec_name).cloned();
                let decision = match &entry {
                    Some(e) => conflict::decide(existing_value.as_ref(), &new_value, e, self.config.default_tolerance, new_revision_date, existing_revision_date),
                    None if existing_value.is_some() => continue,
                    None => ConflictDecision::WriteNew,
                };

                match decision {
                    ConflictDecision::WriteNew | ConflictDecision::Overwrite => {
                        product.specs.insert(spec_name, new_value);
                    }
                    ConflictDecision::NoOp => {}
                    ConflictDecision::RaiseConflict { severity } => {
                        let conflict_record = SpecConflict {
                            id: conflict::new_conflict_id(),
                            product_id: product.id,
                            spec_name,
                            existing_value: existing_value.unwrap_or_else(|| new_value.clone()),
                            new_value,
                            source_doc_id: document_id,
                            existing_doc_id: None,
                            severity,
                            resolution: ConflictResolution::Pending,
                            resolved_value: None,
                            resolved_at: None,
                            created_at: Utc::now(),
                        };
                        if let Err(e) = self.store.raise_conflict(conflict_record).await {
                            tracing::error!(error = %e, "failed to raise conflict");
                        } else {
                            conflicts_raised += 1;
                        }
                    }
                }
            }

            if let Some(SpecValue::List(values)) = specs.get("certifications") {
                product.certifications.extend(values.iter().cloned());
            }
            sync_fixed_columns(&mut product);

            if outranks(new_revision_date, existing_revision_date) || product.revision.is_none() {
                if let Some(rev) = &revision {
                    product.revision = Some(rev.clone());
                }
            }

            match self.store.upsert_product(product, "document ingestion", changed_by).await {
                Ok(saved) => {
                    resolved_product_ids.insert(saved.id);
                    if is_new {
                        new_products += 1;
                    } else {
                        updated_products += 1;
                    }
                }
                Err(e) => {
                    log.push(stage_log("upsert", "failed", e.to_string()));
                }
            }
        }

        let pending_chunks = build_chunks(&extracted.pages, &self.registry);
        let chunk_texts: Vec<String> = pending_chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed_all(&chunk_texts).await;

        let chunks: Vec<Chunk> = pending_chunks
            .into_iter()
            .zip(embeddings)
            .map(|(pending, embedding)| Chunk {
                id: new_chunk_id(),
                document_id,
                chunk_index: pending.chunk_index,
                content: pending.content,
                chunk_type: pending.chunk_type,
                page_number: pending.page_number,
                section_title: pending.section_title,
                product_ids: resolved_product_ids.clone(),
                spec_names: pending.spec_names,
                embedding,
                token_count: pending.token_count,
            })
            .collect();
        log.push(stage_log("chunking", "ok", format!("{} chunks", chunks.len())));

        if let Err(e) = self.store.insert_chunks(chunks).await {
            log.push(stage_log("persist_chunks", "failed", e.to_string()));
        }

        let document = Document {
            id: document_id,
            filename: file.filename.clone(),
            doc_type,
            mime_type: file.mime_type.clone(),
            source_uri: file.source_uri.clone(),
            checksum_sha256: checksum,
            page_count: extracted.pages.len() as i32,
            extracted_text: extracted.plain_text,
            brand,
            status: DocumentStatus::Processed,
            processing_log: log,
            version: revision,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_document(document).await {
            tracing::error!(error = %e, "failed to persist document");
            return DocumentOutcome::Failed;
        }

        for product_id in &resolved_product_ids {
            let link = DocumentProductLink {
                document_id,
                product_id: *product_id,
                relevance: LinkRelevance::Primary,
                extracted_specs: specs.clone(),
                confidence: 1.0,
            };
            if let Err(e) = self.store.link_document_product(link).await {
                tracing::error!(error = %e, "failed to link document to product");
            }
        }

        let audit = AuditLogEntry {
            id: Uuid::new_v4(),
            caller_id: changed_by.map(|s| s.to_string()),
            role: None,
            action: "ingest_document".to_string(),
            entity_type: "document".to_string(),
            entity_id: document_id.to_string(),
            detail: serde_json::json!({
                "filename": file.filename,
                "products_touched": resolved_product_ids.len(),
                "conflicts_raised": conflicts_raised,
            }),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_audit_entry(audit).await {
            tracing::error!(error = %e, "failed to append audit entry");
        }

        DocumentOutcome::Processed { new_products, updated_products, conflicts_raised }
    }

    async fn persist_failed_document(&self, file: &IngestFile, checksum: &str, log: Vec<ProcessingLogEntry>) {
        let document = Document {
            id: Uuid::new_v4(),
            filename: file.filename.clone(),
            doc_type: DocType::Other,
            mime_type: file.mime_type.clone(),
            source_uri: file.source_uri.clone(),
            checksum_sha256: checksum.to_string(),
            page_count: 0,
            extracted_text: String::new(),
            brand: None,
            status: DocumentStatus::Failed,
            processing_log: log,
            version: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_document(document).await {
            tracing::error!(error = %e, "failed to persist failed-document record");
        }
    }

    /// Batches chunk text through the embedder, bounded by
    /// `embedding_concurrency` in-flight requests. A batch that errors
    /// degrades to `None` embeddings for its chunks rather than failing the
    /// whole document (§4.9 graceful degradation).
    async fn embed_all(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let batch_size = self.config.embedding_batch_size.max(1);
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let _permit = self.embed_semaphore.acquire().await.expect("embed semaphore closed");
            match tokio::time::timeout(Duration::from_secs(self.config.embedder_timeout_secs), self.embedder.embed_batch(batch)).await {
                Ok(Ok(embeddings)) => results.extend(embeddings),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "embedding batch failed, chunks left unembedded");
                    results.extend(batch.iter().map(|_| None));
                }
                Err(_) => {
                    tracing::warn!("embedding batch timed out, chunks left unembedded");
                    results.extend(batch.iter().map(|_| None));
                }
            }
        }
        results
    }
}

fn checksum_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn parse_revision(raw: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn stage_log(stage: &str, status: &str, message: impl Into<String>) -> ProcessingLogEntry {
    ProcessingLogEntry { stage: stage.to_string(), status: status.to_string(), message: message.into(), timestamp: Utc::now() }
}

/// Mirrors `FixedColumns` values out of `specs` after a merge (§3 invariant:
/// the two must agree whenever the fixed column is populated).
fn sync_fixed_columns(product: &mut Product) {
    product.fixed.capacity_cuft = product.specs.get("storage_capacity_cuft").and_then(|v| v.as_numeric());
    product.fixed.temp_range_min_c = product.specs.get("temp_range_min_c").and_then(|v| v.as_numeric());
    product.fixed.temp_range_max_c = product.specs.get("temp_range_max_c").and_then(|v| v.as_numeric());
    product.fixed.door_count = product.specs.get("door_count").and_then(|v| v.as_numeric()).map(|v| v as i32);
    if let Some(SpecValue::Enum(s)) = product.specs.get("door_type") {
        product.fixed.door_type = Some(s.clone());
    }
    product.fixed.shelf_count = product.specs.get("shelf_count").and_then(|v| v.as_numeric()).map(|v| v as i32);
    if let Some(SpecValue::Text(s)) = product.specs.get("refrigerant") {
        product.fixed.refrigerant = Some(s.clone());
    }
    product.fixed.voltage_v = product.specs.get("voltage_v").and_then(|v| v.as_numeric());
    product.fixed.amperage = product.specs.get("amperage").and_then(|v| v.as_numeric());
    product.fixed.weight_lbs = product.specs.get("weight_lbs").and_then(|v| v.as_numeric());
    product.fixed.width_in = product.specs.get("width_in").and_then(|v| v.as_numeric());
    product.fixed.depth_in = product.specs.get("depth_in").and_then(|v| v.as_numeric());
    product.fixed.height_in = product.specs.get("height_in").and_then(|v| v.as_numeric());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mime_types_are_rejected() {
        assert!(is_supported_mime("application/pdf"));
        assert!(is_supported_mime("text/plain"));
        assert!(!is_supported_mime("image/png"));
    }

    #[test]
    fn checksum_is_stable_and_content_addressed() {
        let a = checksum_sha256(b"hello world");
        let b = checksum_sha256(b"hello world");
        let c = checksum_sha256(b"hello worlds");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn revision_round_trips_through_iso_format() {
        let parsed = parse_revision("2025-03-18").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2025-03-18");
        assert!(parse_revision("not-a-date").is_none());
    }

    #[test]
    fn sync_fixed_columns_mirrors_numeric_and_enum_specs() {
        let mut product = Product::new("ABT-HC-26S", "ABS", "refrigerator");
        product.specs.insert("storage_capacity_cuft".into(), SpecValue::Numeric { value: 26.0, unit: Some("cuft".into()) });
        product.specs.insert("door_type".into(), SpecValue::Enum("solid".into()));
        sync_fixed_columns(&mut product);
        assert_eq!(product.fixed.capacity_cuft, Some(26.0));
        assert_eq!(product.fixed.door_type.as_deref(), Some("solid"));
    }
}
