//! `catalog-server`: the HTTP service fronting the cold-storage product
//! catalog. Wires `catalog-core`'s pure engines to a `CatalogStore`
//! implementation, the ingestion orchestrator and the external providers,
//! then exposes the §6 HTTP surface over axum.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod recommend;
pub mod retrieval;
pub mod store;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use catalog_core::recommend::UseCaseProfile;
use catalog_core::registry::SpecRegistry;
use catalog_core::types::{EquivalenceRule, ModelPattern};
use regex::Regex;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::ApiKeyTable;
use crate::config::CatalogConfig;
use crate::orchestrator::Orchestrator;
use crate::providers::GeneratorProvider;
use crate::providers::EmbeddingProvider;
use crate::store::CatalogStore;

/// Shared application state, cloned into every axum handler. Every field is
/// already cheap to clone (`Arc` or a small value type) so `#[derive(Clone)]`
/// never deep-copies catalog data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CatalogConfig>,
    pub store: Arc<dyn CatalogStore>,
    pub registry: SpecRegistry,
    pub orchestrator: Orchestrator,
    pub embedder: Arc<EmbeddingProvider>,
    pub generator: Arc<GeneratorProvider>,
    pub use_case_profiles: Arc<Vec<UseCaseProfile>>,
    pub equivalence_rules: Arc<Vec<EquivalenceRule>>,
    pub known_brand_codes: Arc<Vec<String>>,
    pub model_number_pattern: Arc<Regex>,
    pub api_keys: Arc<ApiKeyTable>,
    pub model_patterns: Arc<Vec<ModelPattern>>,
}

impl FromRef<AppState> for AppState {
    fn from_ref(state: &AppState) -> AppState {
        state.clone()
    }
}

/// Assembles the full §6 HTTP surface: ingestion, product lookup,
/// recommendation, comparison, natural-language Q&A, conflict resolution,
/// equivalence lookup, stats and health. `TraceLayer`/`CompressionLayer`/
/// `CorsLayer` are applied at the outermost level so every route gets
/// structured access logs, gzip and permissive CORS uniformly.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .route("/ingest", post(api::ingest))
        .route("/jobs/{id}", get(api::get_job))
        .route("/products", get(api::list_products))
        .route("/products/{id}", get(api::get_product))
        .route("/products/{id}/equivalents", get(api::equivalents_of))
        .route("/products/by-model/{model_number}", get(api::get_product_by_model))
        .route("/recommend", post(api::recommend))
        .route("/compare", post(api::compare))
        .route("/ask", post(api::ask))
        .route("/conflicts", get(api::list_conflicts))
        .route("/conflicts/{id}/resolve", post(api::resolve_conflict))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
