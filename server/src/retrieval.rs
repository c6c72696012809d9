//! Server-side half of the Retrieval Engine (§4.10 steps 3-6): embeds the
//! query, fans out to vector and lexical search through the `CatalogStore`,
//! fuses the two rankings with RRF and hands the result to
//! `catalog_core::retrieval::assemble_context_pack`. Query parsing, filter
//! derivation and pack assembly themselves are pure and live in
//! `catalog-core`; this module only owns the store/provider calls that can't.

use std::collections::BTreeMap;

use catalog_core::error::CoreResult;
use catalog_core::registry::SpecRegistry;
use catalog_core::retrieval::{assemble_context_pack, derive_filters, parse_query, ContextPack};
use catalog_core::rrf;
use catalog_core::types::Chunk;
use regex::Regex;
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::providers::EmbeddingProvider;
use crate::store::CatalogStore;

/// §4.10 full pipeline. An embedder failure degrades to lexical-only search
/// (logged, not propagated); a store failure on either search is a hard
/// error since there is no fallback store to read from.
pub async fn build_context_pack(
    store: &dyn CatalogStore,
    registry: &SpecRegistry,
    embedder: &EmbeddingProvider,
    config: &CatalogConfig,
    known_brand_codes: &[String],
    model_number_pattern: &Regex,
    query_text: &str,
) -> CoreResult<ContextPack> {
    let brand_refs: Vec<&str> = known_brand_codes.iter().map(|s| s.as_str()).collect();
    let parsed = parse_query(query_text, registry, &brand_refs, model_number_pattern);
    let filters = derive_filters(&parsed);
    let intent = parsed.intent;

    let vector_hits = match embedder.embed_batch(std::slice::from_ref(&query_text.to_string())).await {
        Ok(mut embeddings) => match embeddings.pop().flatten() {
            Some(embedding) => store.vector_search(&embedding, config.vector_top_k).await?,
            None => {
                tracing::warn!("embedder returned no vector for query, falling back to lexical-only search");
                Vec::new()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "embedder unavailable, falling back to lexical-only search");
            Vec::new()
        }
    };

    let lexical_hits = store.lexical_search(query_text, config.lexical_top_k).await?;

    let mut chunk_lookup: BTreeMap<Uuid, Chunk> = BTreeMap::new();
    let vector_ranking: Vec<Uuid> = vector_hits
        .iter()
        .map(|hit| {
            chunk_lookup.insert(hit.chunk.id, hit.chunk.clone());
            hit.chunk.id
        })
        .collect();
    let lexical_ranking: Vec<Uuid> = lexical_hits
        .iter()
        .map(|hit| {
            chunk_lookup.insert(hit.chunk.id, hit.chunk.clone());
            hit.chunk.id
        })
        .collect();

    let fused = rrf::fuse(&[vector_ranking, lexical_ranking], config.rrf_k);
    Ok(assemble_context_pack(&fused, &chunk_lookup, config.context_token_budget, intent, filters))
}
