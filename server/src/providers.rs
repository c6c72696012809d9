//! External provider clients (§6): embedding, generator and PDF text
//! extraction are remote text<->vector/text functions reached over HTTP.
//! Retries and backoff live here (§4.9), not in `catalog-core`, since they
//! are an HTTP-transport concern.

use async_trait::async_trait;
use catalog_core::error::{CoreError, CoreResult};
use catalog_core::extractor::{ExtractedDocument, ExtractedPage, PdfTextProvider};
use rand::Rng;
use std::time::Duration;

use crate::config::CatalogConfig;

const STAGE_EMBED: &str = "embedder";
const STAGE_GENERATE: &str = "generator";
const STAGE_EXTRACT: &str = "extractor";

fn classify_status(status: reqwest::StatusCode) -> bool {
    // true => transient/retryable
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Exponential backoff with jitter (§4.9): base 500ms, factor 2, jitter
/// ±20%, cap 30s, max 5 attempts.
fn backoff_delay(attempt: u32, config: &CatalogConfig) -> Duration {
    let base = config.retry_base_ms as f64;
    let exp = base * config.retry_factor.powi(attempt as i32);
    let capped = exp.min(config.retry_cap_ms as f64);
    let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (capped * (1.0 + jitter_frac)).max(0.0);
    Duration::from_millis(jittered as u64)
}

pub struct EmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    config: CatalogConfig,
}

impl EmbeddingProvider {
    pub fn new(config: &CatalogConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embedder_timeout_secs))
            .build()
            .expect("embedding http client");
        Self { client, base_url: config.embedding_provider_url.clone(), model: config.embedding_model.clone(), config: config.clone() }
    }

    /// `embed(model, text) -> float[dim]` (§6). Retries transient failures
    /// with exponential backoff; permanent (4xx) failures surface
    /// immediately so the caller can null out the chunk's embedding and
    /// continue (§4.9 graceful degradation).
    pub async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Option<Vec<f32>>>> {
        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .post(format!("{}/embed", self.base_url))
                .json(&serde_json::json!({ "model": self.model, "texts": texts }))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: EmbedResponse = resp
                        .json()
                        .await
                        .map_err(|e| CoreError::provider_permanent(STAGE_EMBED, e.to_string()))?;
                    return Ok(parsed.embeddings.into_iter().map(Some).collect());
                }
                Ok(resp) if classify_status(resp.status()) => {
                    attempt += 1;
                    if attempt >= self.config.retry_max_attempts {
                        return Err(CoreError::provider_transient(STAGE_EMBED, format!("exhausted retries, last status {}", resp.status())));
                    }
                    tokio::time::sleep(backoff_delay(attempt, &self.config)).await;
                }
                Ok(resp) => {
                    return Err(CoreError::provider_permanent(STAGE_EMBED, format!("status {}", resp.status())));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.config.retry_max_attempts {
                        return Err(CoreError::provider_transient(STAGE_EMBED, e.to_string()));
                    }
                    tokio::time::sleep(backoff_delay(attempt, &self.config)).await;
                }
                Err(e) => return Err(CoreError::provider_permanent(STAGE_EMBED, e.to_string())),
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct GeneratorProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeneratorProvider {
    pub fn new(config: &CatalogConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.generator_timeout_secs))
            .build()
            .expect("generator http client");
        Self { client, base_url: config.generator_provider_url.clone(), model: config.generator_model.clone() }
    }

    /// `generate(model, prompt, params) -> text` (§6). The retrieval engine
    /// never calls this itself; only the HTTP adapter's `ask` handler does.
    pub async fn generate(&self, prompt: &str) -> CoreResult<String> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&serde_json::json!({ "model": self.model, "prompt": prompt, "params": {} }))
            .send()
            .await
            .map_err(|e| CoreError::provider_transient(STAGE_GENERATE, e.to_string()))?;

        if response.status().is_success() {
            let parsed: GenerateResponse =
                response.json().await.map_err(|e| CoreError::provider_permanent(STAGE_GENERATE, e.to_string()))?;
            Ok(parsed.text)
        } else if classify_status(response.status()) {
            Err(CoreError::provider_transient(STAGE_GENERATE, format!("status {}", response.status())))
        } else {
            Err(CoreError::provider_permanent(STAGE_GENERATE, format!("status {}", response.status())))
        }
    }
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    text: String,
}

pub struct HttpPdfProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPdfProvider {
    pub fn new(config: &CatalogConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.extractor_timeout_secs))
            .build()
            .expect("pdf extraction http client");
        Self { client, base_url: config.pdf_provider_url.clone() }
    }
}

#[async_trait]
impl PdfTextProvider for HttpPdfProvider {
    async fn extract(&self, bytes: &[u8]) -> CoreResult<ExtractedDocument> {
        let response = self
            .client
            .post(format!("{}/extract", self.base_url))
            .header("content-type", "application/pdf")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| CoreError::provider_transient(STAGE_EXTRACT, e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::extraction_failed(STAGE_EXTRACT, format!("provider status {}", response.status())));
        }
        let parsed: ExtractResponse =
            response.json().await.map_err(|e| CoreError::extraction_failed(STAGE_EXTRACT, e.to_string()))?;
        Ok(ExtractedDocument {
            plain_text: parsed.plain_text,
            pages: parsed
                .pages
                .into_iter()
                .map(|p| ExtractedPage { page_no: p.page_no, text: p.text })
                .collect(),
            metadata: parsed.metadata,
        })
    }
}

#[derive(serde::Deserialize)]
struct ExtractResponse {
    plain_text: String,
    pages: Vec<ExtractResponsePage>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ExtractResponsePage {
    page_no: i32,
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_respects_cap_and_stays_non_negative() {
        let config = CatalogConfig::default();
        for attempt in 0..10 {
            let delay = backoff_delay(attempt, &config);
            assert!(delay.as_millis() as u64 <= (config.retry_cap_ms as f64 * 1.2) as u64);
        }
    }
}
