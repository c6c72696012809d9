//! Layered configuration (§10.3): `catalog.toml`, discovered by walking up
//! from the working directory, overridable by environment variables and
//! then by CLI flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CATALOG_";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub listen_port: u16,
    pub database_url: String,
    pub database_pool_size: u32,
    pub worker_pool_size: usize,
    pub job_queue_depth: usize,
    pub graceful_shutdown_timeout_secs: u64,
    pub extractor_timeout_secs: u64,
    pub embedder_timeout_secs: u64,
    pub generator_timeout_secs: u64,
    pub embedding_batch_size: usize,
    pub embedding_concurrency: usize,
    pub retry_base_ms: u64,
    pub retry_factor: f64,
    pub retry_max_attempts: u32,
    pub retry_cap_ms: u64,
    pub default_tolerance: f64,
    pub rrf_k: f64,
    pub vector_top_k: usize,
    pub lexical_top_k: usize,
    pub context_token_budget: usize,
    pub recommendation_max_results: usize,
    pub embedding_provider_url: String,
    pub embedding_model: String,
    pub generator_provider_url: String,
    pub generator_model: String,
    pub pdf_provider_url: String,
    pub embedding_dim: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            database_url: "postgres://localhost/catalog".to_string(),
            database_pool_size: 20,
            worker_pool_size: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8),
            job_queue_depth: 256,
            graceful_shutdown_timeout_secs: 30,
            extractor_timeout_secs: 30,
            embedder_timeout_secs: 20,
            generator_timeout_secs: 60,
            embedding_batch_size: 16,
            embedding_concurrency: 4,
            retry_base_ms: 500,
            retry_factor: 2.0,
            retry_max_attempts: 5,
            retry_cap_ms: 30_000,
            default_tolerance: 0.05,
            rrf_k: 60.0,
            vector_top_k: 40,
            lexical_top_k: 40,
            context_token_budget: 3_000,
            recommendation_max_results: 5,
            embedding_provider_url: "http://localhost:9001".to_string(),
            embedding_model: "default".to_string(),
            generator_provider_url: "http://localhost:9002".to_string(),
            generator_model: "default".to_string(),
            pdf_provider_url: "http://localhost:9003".to_string(),
            embedding_dim: 1024,
        }
    }
}

impl CatalogConfig {
    /// Walk up from `start` looking for `catalog.toml`, same discovery
    /// strategy the existing project-level config loader uses.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start.to_path_buf());
        while let Some(d) = dir {
            let candidate = d.join("catalog.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = d.parent().map(|p| p.to_path_buf());
        }
        None
    }

    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, path = %p.display(), "failed to parse catalog.toml, using defaults");
                    CatalogConfig::default()
                }),
                Err(_) => CatalogConfig::default(),
            },
            None => CatalogConfig::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}LISTEN_PORT")) {
            if let Ok(port) = v.parse() {
                self.listen_port = port;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}DATABASE_URL")) {
            self.database_url = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}EMBEDDING_PROVIDER_URL")) {
            self.embedding_provider_url = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}GENERATOR_PROVIDER_URL")) {
            self.generator_provider_url = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}PDF_PROVIDER_URL")) {
            self.pdf_provider_url = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_pool_bound() {
        let config = CatalogConfig::default();
        assert!(config.worker_pool_size >= 1 && config.worker_pool_size <= 8);
    }

    #[test]
    fn discover_finds_config_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("catalog.toml"), "listen_port = 9090\n").unwrap();
        let found = CatalogConfig::discover(&nested).unwrap();
        assert_eq!(found, dir.path().join("catalog.toml"));
    }
}
