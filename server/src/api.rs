//! The §6 HTTP surface: ingestion, product lookup, recommendation,
//! comparison, natural-language Q&A, conflict resolution, equivalence
//! lookup, stats and health. Handlers stay thin — all real decision-making
//! lives in `catalog-core` or the wiring modules (`orchestrator`,
//! `retrieval`, `recommend`); a handler's job is request parsing, auth, and
//! shaping the response.

use std::collections::BTreeSet;

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use catalog_core::conflict::{apply_resolution, can_transition, ResolutionOutcome};
use catalog_core::equivalence::are_equivalent;
use catalog_core::recommend::HardConstraints;
use catalog_core::types::{AuditLogEntry, ConflictResolution, Product, SpecConflict, SpecValue};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::orchestrator::IngestFile;
use crate::recommend::recommend_for_use_case;
use crate::retrieval::build_context_pack;
use crate::store::ProductFilter;
use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.store.stats().await?))
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub job_id: Uuid,
    pub accepted: usize,
    pub rejected: usize,
}

/// `POST /ingest` (§6): accepts a multipart body of one or more documents
/// and hands them to the orchestrator's bounded job queue. Returns
/// immediately with accepted/rejected counts; ingestion itself happens on
/// the worker pool.
pub async fn ingest(State(state): State<AppState>, caller: Caller, mut multipart: Multipart) -> ApiResult<Json<IngestResponse>> {
    caller.require_write()?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::validation(e.to_string()))? {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::validation(e.to_string()))?;
        files.push(IngestFile { filename: filename.clone(), mime_type, source_uri: format!("upload://{filename}"), bytes: bytes.to_vec() });
    }
    if files.is_empty() {
        return Err(ApiError::validation("ingest request carried no files"));
    }

    let outcome = state.orchestrator.submit_job(files, Some(caller.caller_id)).await;
    Ok(Json(IngestResponse { job_id: outcome.job.id, accepted: outcome.accepted, rejected: outcome.rejected }))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<crate::orchestrator::IngestionJobView>> {
    state.orchestrator.get_job(id).map(Json).ok_or_else(|| ApiError::not_found(format!("no job with id {id}")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub brand: Option<String>,
    pub family: Option<String>,
    pub capacity_min: Option<f64>,
    pub capacity_max: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub door_type: Option<String>,
    /// comma-separated
    pub certifications: Option<String>,
    pub q: Option<String>,
}

impl ProductQuery {
    fn into_filter(self, caller: &Caller) -> ProductFilter {
        ProductFilter {
            brand: caller.brand_scope.clone().or(self.brand),
            family: self.family,
            capacity_min: self.capacity_min,
            capacity_max: self.capacity_max,
            temp_min_c: self.temp_min_c,
            temp_max_c: self.temp_max_c,
            door_type: self.door_type,
            certifications: self.certifications.map(|c| c.split(',').map(|s| s.trim().to_string()).collect()).unwrap_or_default(),
            free_text: self.q,
        }
    }
}

pub async fn list_products(State(state): State<AppState>, caller: Caller, Query(query): Query<ProductQuery>) -> ApiResult<Json<Vec<Product>>> {
    let filter = query.into_filter(&caller);
    Ok(Json(state.store.list_products(&filter).await?))
}

pub async fn get_product(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    let product = state.store.get_product(id).await?.ok_or_else(|| ApiError::not_found(format!("no product with id {id}")))?;
    if !caller.in_scope(&product.brand) {
        return Err(ApiError::forbidden("product is outside caller's brand scope"));
    }
    Ok(Json(product))
}

pub async fn get_product_by_model(State(state): State<AppState>, caller: Caller, Path(model_number): Path<String>) -> ApiResult<Json<Product>> {
    let product = state
        .store
        .get_product_by_model_number(&model_number)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no product with model number {model_number}")))?;
    if !caller.in_scope(&product.brand) {
        return Err(ApiError::forbidden("product is outside caller's brand scope"));
    }
    Ok(Json(product))
}

/// `GET /products/:id/equivalents` (§3, §9): pairwise equivalence computed
/// on the fly against every other product in the same family, since there
/// is no persisted relationships table to traverse.
pub async fn equivalents_of(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Product>>> {
    let target = state.store.get_product(id).await?.ok_or_else(|| ApiError::not_found(format!("no product with id {id}")))?;
    if !caller.in_scope(&target.brand) {
        return Err(ApiError::forbidden("product is outside caller's brand scope"));
    }

    let Some(rule) = state.equivalence_rules.iter().find(|r| r.family == target.family) else {
        return Ok(Json(Vec::new()));
    };

    let filter = ProductFilter { family: Some(target.family.clone()), ..Default::default() };
    let candidates = state.store.list_products(&filter).await?;
    let equivalents = candidates.into_iter().filter(|p| are_equivalent(&target, p, rule)).collect();
    Ok(Json(equivalents))
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub use_case: String,
    #[serde(default)]
    pub capacity_min: Option<f64>,
    #[serde(default)]
    pub capacity_max: Option<f64>,
    #[serde(default)]
    pub certifications_required: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationItem {
    pub product: Product,
    pub score: f64,
    pub breakdown: Vec<(String, f64)>,
}

pub async fn recommend(State(state): State<AppState>, caller: Caller, Json(body): Json<RecommendRequest>) -> ApiResult<Json<Vec<RecommendationItem>>> {
    let constraints = HardConstraints {
        capacity_min: body.capacity_min,
        capacity_max: body.capacity_max,
        certifications_required: body.certifications_required,
        brand: caller.brand_scope.clone().or(body.brand),
        family: body.family,
    };

    let results = recommend_for_use_case(
        state.store.as_ref(),
        &body.use_case,
        constraints,
        &state.use_case_profiles,
        &state.equivalence_rules,
        state.config.recommendation_max_results,
    )
    .await?;

    let mut items = Vec::with_capacity(results.len());
    for result in results {
        let Some(product) = state.store.get_product(result.product_id).await? else { continue };
        let breakdown = result.breakdown.into_iter().map(|b| (b.spec_name, b.contribution)).collect();
        items.push(RecommendationItem { product, score: result.score, breakdown });
    }
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub model_numbers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub products: Vec<Product>,
    pub spec_names: BTreeSet<String>,
}

pub async fn compare(State(state): State<AppState>, caller: Caller, Json(body): Json<CompareRequest>) -> ApiResult<Json<CompareResponse>> {
    if body.model_numbers.len() < 2 {
        return Err(ApiError::validation("compare requires at least two model numbers"));
    }
    let mut products = Vec::with_capacity(body.model_numbers.len());
    for model_number in &body.model_numbers {
        let product = state
            .store
            .get_product_by_model_number(model_number)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("no product with model number {model_number}")))?;
        if !caller.in_scope(&product.brand) {
            return Err(ApiError::forbidden("product is outside caller's brand scope"));
        }
        products.push(product);
    }
    let spec_names = products.iter().flat_map(|p| p.specs.keys().cloned()).collect();
    Ok(Json(CompareResponse { products, spec_names }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct Citation {
    pub document_id: Uuid,
    pub page_number: Option<i32>,
    pub product_ids: BTreeSet<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub intent: String,
    pub citations: Vec<Citation>,
}

/// `POST /ask` (§4.10, §6): assembles a token-budgeted context pack and asks
/// the generator provider to answer the query grounded in it.
pub async fn ask(State(state): State<AppState>, _caller: Caller, Json(body): Json<AskRequest>) -> ApiResult<Json<AskResponse>> {
    let pack = build_context_pack(
        state.store.as_ref(),
        &state.registry,
        &state.embedder,
        &state.config,
        &state.known_brand_codes,
        &state.model_number_pattern,
        &body.query,
    )
    .await?;

    let context_text = pack
        .chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = format!(
        "Answer the question using only the numbered context below. Cite sources by their number.\n\nContext:\n{context_text}\n\nQuestion: {}",
        body.query
    );

    let answer = state.generator.generate(&prompt).await?;
    let citations = pack
        .chunks
        .iter()
        .map(|c| Citation { document_id: c.source_doc_id, page_number: c.page_number, product_ids: c.product_ids.clone() })
        .collect();

    Ok(Json(AskResponse { answer, intent: pack.intent.as_str().to_string(), citations }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConflictQuery {
    pub product_id: Option<Uuid>,
}

pub async fn list_conflicts(State(state): State<AppState>, _caller: Caller, Query(query): Query<ConflictQuery>) -> ApiResult<Json<Vec<SpecConflict>>> {
    Ok(Json(state.store.list_pending_conflicts(query.product_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ResolveConflictRequest {
    pub resolution: ConflictResolution,
    #[serde(default)]
    pub override_value: Option<SpecValue>,
}

/// `POST /conflicts/:id/resolve` (§4.7, §8 invariant 6): a conflict
/// transitions from `pending` to a terminal resolution exactly once. If the
/// resolution writes a value, the product's spec is updated in the same
/// request.
pub async fn resolve_conflict(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveConflictRequest>,
) -> ApiResult<Json<SpecConflict>> {
    caller.require_write()?;

    let mut conflict = state.store.get_conflict(id).await?.ok_or_else(|| ApiError::not_found(format!("no conflict with id {id}")))?;
    if !can_transition(conflict.resolution) {
        return Err(ApiError::validation("conflict has already been resolved"));
    }

    let outcome = apply_resolution(body.resolution, conflict.existing_value.clone(), conflict.new_value.clone(), body.override_value.clone())
        .ok_or_else(|| ApiError::validation("manual_override resolution requires an override_value"))?;

    let resolved_value = match &outcome {
        ResolutionOutcome::WroteValue(value) => Some(value.clone()),
        ResolutionOutcome::KeptExisting => Some(conflict.existing_value.clone()),
        ResolutionOutcome::Dismissed => None,
    };

    if let ResolutionOutcome::WroteValue(value) = &outcome {
        if let Some(mut product) = state.store.get_product(conflict.product_id).await? {
            product.specs.insert(conflict.spec_name.clone(), value.clone());
            state.store.upsert_product(product, "conflict resolution", Some(&caller.caller_id)).await?;
        }
    }

    conflict.resolution = body.resolution;
    conflict.resolved_value = resolved_value;
    conflict.resolved_at = Some(Utc::now());

    let resolved = state.store.resolve_conflict(conflict).await?;

    let audit = AuditLogEntry {
        id: Uuid::new_v4(),
        caller_id: Some(caller.caller_id.clone()),
        role: Some(format!("{:?}", caller.role)),
        action: "resolve_conflict".to_string(),
        entity_type: "spec_conflict".to_string(),
        entity_id: resolved.id.to_string(),
        detail: serde_json::json!({
            "product_id": resolved.product_id,
            "spec_name": resolved.spec_name,
            "resolution": resolved.resolution,
        }),
        created_at: Utc::now(),
    };
    if let Err(e) = state.store.append_audit_entry(audit).await {
        tracing::error!(error = %e, "failed to append audit entry for conflict resolution");
    }

    Ok(Json(resolved))
}
