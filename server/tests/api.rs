//! Integration tests for the §6 HTTP surface (§10.4): drives a real axum
//! `Router` in-process with `tower::ServiceExt::oneshot` against an
//! `InMemoryStore`, bypassing the network entirely. Endpoints that reach an
//! external provider (`/ingest`, `/ask`) are exercised at the unit level
//! elsewhere and skipped here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use catalog_core::error::{CoreError, CoreResult};
use catalog_core::extractor::{ExtractedDocument, PdfTextProvider};
use catalog_core::recommend::{SpecWeight, TargetBand, UseCaseProfile};
use catalog_core::seed::{default_equivalence_rules, seed_registry};
use catalog_core::types::{ConflictResolution, ConflictSeverity, Product, SpecConflict, SpecValue};
use catalog_server::auth::{ApiKeyEntry, ApiKeyTable, Role};
use catalog_server::config::CatalogConfig;
use catalog_server::orchestrator::Orchestrator;
use catalog_server::providers::{EmbeddingProvider, GeneratorProvider};
use catalog_server::store::memory::InMemoryStore;
use catalog_server::store::CatalogStore;
use catalog_server::{build_router, AppState};
use regex::Regex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct StubPdfProvider;

#[async_trait]
impl PdfTextProvider for StubPdfProvider {
    async fn extract(&self, _bytes: &[u8]) -> CoreResult<ExtractedDocument> {
        Err(CoreError::extraction_failed("extractor", "stub provider never called in tests"))
    }
}

fn api_key_table(role: Role, brand_scope: Option<&str>) -> ApiKeyTable {
    let mut keys = HashMap::new();
    keys.insert(
        "test-key".to_string(),
        ApiKeyEntry { caller_id: "tester".to_string(), role, brand_scope: brand_scope.map(|s| s.to_string()) },
    );
    ApiKeyTable::new(keys)
}

async fn build_test_state(store: InMemoryStore, role: Role, brand_scope: Option<&str>) -> AppState {
    let config = CatalogConfig::default();
    let registry = seed_registry();
    let store: Arc<dyn CatalogStore> = Arc::new(store);
    let embedder = Arc::new(EmbeddingProvider::new(&config));
    let generator = Arc::new(GeneratorProvider::new(&config));
    let orchestrator = Orchestrator::new(
        config.clone(),
        store.clone(),
        registry.clone(),
        Arc::new(StubPdfProvider),
        embedder.clone(),
        Vec::new(),
        Vec::new(),
    );

    AppState {
        config: Arc::new(config),
        store,
        registry,
        orchestrator,
        embedder,
        generator,
        use_case_profiles: Arc::new(vec![UseCaseProfile {
            name: "vaccine_storage".to_string(),
            synonyms: vec!["vaccine storage".to_string(), "pharmacy refrigerator".to_string()],
            weights: vec![SpecWeight {
                spec_name: "temp_range_min_c".to_string(),
                weight: 1.0,
                target_band: TargetBand { min: 2.0, max: 8.0 },
                required: true,
            }],
        }]),
        equivalence_rules: Arc::new(default_equivalence_rules()),
        known_brand_codes: Arc::new(vec!["ABS".to_string()]),
        model_number_pattern: Arc::new(Regex::new(r"[A-Z]{2,}(?:-[A-Z0-9]+)+").unwrap()),
        api_keys: Arc::new(api_key_table(role, brand_scope)),
        model_patterns: Arc::new(Vec::new()),
    }
}

fn auth_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header("authorization", "Bearer test-key")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn health_requires_no_auth() {
    let state = build_test_state(InMemoryStore::new(), Role::Customer, None).await;
    let app = build_router(state);
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_products_without_api_key_is_forbidden() {
    let state = build_test_state(InMemoryStore::new(), Role::Customer, None).await;
    let app = build_router(state);
    let response = app.oneshot(Request::builder().uri("/products").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_and_get_product_round_trip() {
    let store = InMemoryStore::new();
    let mut product = Product::new("ABT-HC-26S", "ABS", "refrigerator");
    product.fixed.capacity_cuft = Some(26.0);
    product.specs.insert("storage_capacity_cuft".into(), SpecValue::Numeric { value: 26.0, unit: Some("cu ft".into()) });
    let product = store.upsert_product(product, "seed", None).await.unwrap();
    let product_id = product.id;

    let state = build_test_state(store, Role::Customer, None).await;
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(auth_request("GET", "/products?brand=ABS").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(auth_request("GET", &format!("/products/{product_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["model_number"], "ABT-HC-26S");
}

#[tokio::test]
async fn brand_scoped_caller_cannot_read_other_brands() {
    let store = InMemoryStore::new();
    let product = store.upsert_product(Product::new("OTHER-1", "OtherBrand", "refrigerator"), "seed", None).await.unwrap();

    let state = build_test_state(store, Role::Customer, Some("ABS")).await;
    let app = build_router(state);

    let response = app
        .oneshot(auth_request("GET", &format!("/products/{}", product.id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customer_cannot_resolve_conflicts_but_admin_can() {
    let store = InMemoryStore::new();
    let product = store.upsert_product(Product::new("ABT-HC-26S", "ABS", "refrigerator"), "seed", None).await.unwrap();
    let conflict = SpecConflict {
        id: Uuid::new_v4(),
        product_id: product.id,
        spec_name: "storage_capacity_cuft".to_string(),
        existing_value: SpecValue::Numeric { value: 26.0, unit: None },
        new_value: SpecValue::Numeric { value: 25.8, unit: None },
        source_doc_id: Uuid::new_v4(),
        existing_doc_id: None,
        severity: ConflictSeverity::Medium,
        resolution: ConflictResolution::Pending,
        resolved_value: None,
        resolved_at: None,
        created_at: chrono::Utc::now(),
    };
    store.raise_conflict(conflict.clone()).await.unwrap();

    let customer_state = build_test_state(
        {
            let s = InMemoryStore::new();
            s.upsert_product(product.clone(), "reseed", None).await.unwrap();
            s.raise_conflict(conflict.clone()).await.unwrap();
            s
        },
        Role::Customer,
        None,
    )
    .await;
    let app = build_router(customer_state);
    let payload = json!({ "resolution": "accept_new" });
    let response = app
        .oneshot(
            auth_request("POST", &format!("/conflicts/{}/resolve", conflict.id))
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_state = build_test_state(
        {
            let s = InMemoryStore::new();
            s.upsert_product(product, "reseed", None).await.unwrap();
            s.raise_conflict(conflict.clone()).await.unwrap();
            s
        },
        Role::Admin,
        None,
    )
    .await;
    let app = build_router(admin_state);
    let response = app
        .oneshot(
            auth_request("POST", &format!("/conflicts/{}/resolve", conflict.id))
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["resolution"], "accept_new");
}

#[tokio::test]
async fn compare_requires_at_least_two_models() {
    let store = InMemoryStore::new();
    store.upsert_product(Product::new("ABT-HC-26S", "ABS", "refrigerator"), "seed", None).await.unwrap();
    let state = build_test_state(store, Role::Customer, None).await;
    let app = build_router(state);

    let payload = json!({ "model_numbers": ["ABT-HC-26S"] });
    let response = app
        .oneshot(
            auth_request("POST", "/compare")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recommend_returns_matching_product_for_resolved_profile() {
    let store = InMemoryStore::new();
    let mut product = Product::new("ABT-HC-26S", "ABS", "refrigerator");
    product.fixed.temp_range_min_c = Some(2.0);
    product.fixed.temp_range_max_c = Some(8.0);
    product.specs.insert("temp_range_min_c".into(), SpecValue::Numeric { value: 2.0, unit: Some("C".into()) });
    store.upsert_product(product, "seed", None).await.unwrap();

    let state = build_test_state(store, Role::Customer, None).await;
    let app = build_router(state);

    let payload = json!({ "use_case": "vaccine storage" });
    let response = app
        .oneshot(
            auth_request("POST", "/recommend")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}
