//! `catalog-server` binary: discovers and loads `catalog.toml`, connects to
//! Postgres and runs pending migrations, seeds the spec registry and
//! starter curated data, wires the ingestion orchestrator and external
//! providers, then serves the §6 HTTP surface until a shutdown signal
//! arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::seed::{default_brands, default_equivalence_rules, default_model_patterns, default_use_case_profiles, seed_registry};
use catalog_server::auth::ApiKeyTable;
use catalog_server::config::CatalogConfig;
use catalog_server::orchestrator::Orchestrator;
use catalog_server::providers::{EmbeddingProvider, GeneratorProvider, HttpPdfProvider};
use catalog_server::store::postgres::PostgresStore;
use catalog_server::store::CatalogStore;
use catalog_server::{build_router, AppState};
use clap::Parser;
use regex::Regex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "catalog-server", about = "HTTP service for the cold-storage product catalog")]
struct Cli {
    /// Path to catalog.toml; defaults to walking up from the current directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run pending migrations then exit, without starting the HTTP server.
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().expect("read current directory");

    let config_path = cli.config.or_else(|| CatalogConfig::discover(&cwd));
    let config = CatalogConfig::load(config_path.as_deref());

    let pg_store = match PostgresStore::connect(&config.database_url, config.database_pool_size).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };
    if let Err(e) = pg_store.run_migrations().await {
        tracing::error!(error = %e, "failed to run migrations");
        std::process::exit(1);
    }
    if cli.migrate {
        tracing::info!("migrations applied, exiting (--migrate)");
        return;
    }
    let store: Arc<dyn CatalogStore> = Arc::new(pg_store);

    let registry = seed_registry();
    let model_patterns = default_model_patterns();
    let known_brand_codes: Vec<String> = default_brands().into_iter().map(|b| b.code).collect();
    let use_case_profiles = default_use_case_profiles();
    let equivalence_rules = default_equivalence_rules();
    let model_number_pattern = Regex::new(r"[A-Z]{2,}(?:-[A-Z0-9]+)+").expect("model number pattern compiles");

    let api_keys_path = ApiKeyTable::discover(&cwd);
    let api_keys = ApiKeyTable::load(api_keys_path.as_deref());

    let embedder = Arc::new(EmbeddingProvider::new(&config));
    let generator = Arc::new(GeneratorProvider::new(&config));
    let pdf_provider = Arc::new(HttpPdfProvider::new(&config));

    let orchestrator = Orchestrator::new(
        config.clone(),
        store.clone(),
        registry.clone(),
        pdf_provider,
        embedder.clone(),
        model_patterns.clone(),
        known_brand_codes.clone(),
    );

    let listen_port = config.listen_port;
    let shutdown_timeout = Duration::from_secs(config.graceful_shutdown_timeout_secs);

    let state = AppState {
        config: Arc::new(config),
        store,
        registry,
        orchestrator,
        embedder,
        generator,
        use_case_profiles: Arc::new(use_case_profiles),
        equivalence_rules: Arc::new(equivalence_rules),
        known_brand_codes: Arc::new(known_brand_codes),
        model_number_pattern: Arc::new(model_number_pattern),
        api_keys: Arc::new(api_keys),
        model_patterns: Arc::new(model_patterns),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", listen_port)).await.expect("bind listen port");
    tracing::info!(port = listen_port, "catalog-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_then_arm_force_exit(shutdown_timeout))
        .await
        .expect("server error");
}

/// Waits for Ctrl+C or SIGTERM, then arms a backstop that force-exits after
/// `graceful_shutdown_timeout_secs` in case some in-flight request never
/// drains (§10.3).
async fn wait_then_arm_force_exit(grace: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!("graceful shutdown timeout elapsed, forcing exit");
        std::process::exit(1);
    });
}
