//! Retrieval Engine (§4.10): query parsing, intent classification, filter
//! derivation and token-budgeted context-pack assembly. The vector and
//! lexical searches themselves are store/provider calls and live in
//! `catalog-server`; everything here is pure and operates on already-fused
//! rankings.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::registry::SpecRegistry;
use crate::types::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    SpecLookup,
    Comparison,
    Recommendation,
    Compliance,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::SpecLookup => "spec_lookup",
            QueryIntent::Comparison => "comparison",
            QueryIntent::Recommendation => "recommendation",
            QueryIntent::Compliance => "compliance",
            QueryIntent::General => "general",
        }
    }
}

/// §4.10 step 1: classify intent from keyword markers. Checked in a fixed
/// priority order since a query can plausibly match more than one.
fn classify_intent(lower: &str) -> QueryIntent {
    const COMPARISON_MARKERS: &[&str] = &["compare", "versus", " vs ", "difference between"];
    const RECOMMENDATION_MARKERS: &[&str] = &["recommend", "best fit", "which model", "suggest"];
    const COMPLIANCE_MARKERS: &[&str] = &["certified", "certification", "compliant", "nsf", "ul listed", "energy star"];

    if COMPARISON_MARKERS.iter().any(|m| lower.contains(m)) {
        return QueryIntent::Comparison;
    }
    if RECOMMENDATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return QueryIntent::Recommendation;
    }
    if COMPLIANCE_MARKERS.iter().any(|m| lower.contains(m)) {
        return QueryIntent::Compliance;
    }
    QueryIntent::General
}

#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    pub raw: String,
    pub intent: QueryIntent,
    pub model_numbers: Vec<String>,
    pub brand_codes: Vec<String>,
    pub spec_names: Vec<String>,
}

impl Default for QueryIntent {
    fn default() -> Self {
        QueryIntent::General
    }
}

/// §4.10 step 1: detect model-number tokens by pattern, brand codes by
/// substring, and spec terms by registry-synonym expansion, then classify
/// intent. Spec-lookup wins over the keyword-based intents once a spec term
/// or a model number is recognized, since a query naming a concrete spec or
/// model is asking a direct lookup question regardless of incidental
/// comparison/recommendation wording.
pub fn parse_query(text: &str, registry: &SpecRegistry, known_brand_codes: &[&str], model_number_pattern: &regex::Regex) -> ParsedQuery {
    let lower = text.to_lowercase();

    let model_numbers: Vec<String> = model_number_pattern.find_iter(text).map(|m| m.as_str().to_string()).collect();

    let mut brand_codes = Vec::new();
    for code in known_brand_codes {
        if lower.contains(&code.to_lowercase()) {
            brand_codes.push(code.to_string());
        }
    }

    let mut spec_names = Vec::new();
    for word_window in sliding_windows(&lower, 3) {
        if let Some(canonical) = registry.resolve(&word_window) {
            if !spec_names.contains(&canonical) {
                spec_names.push(canonical);
            }
        }
    }

    let keyword_intent = classify_intent(&lower);
    let intent = if !model_numbers.is_empty() || !spec_names.is_empty() {
        match keyword_intent {
            QueryIntent::Comparison | QueryIntent::Recommendation => keyword_intent,
            _ => QueryIntent::SpecLookup,
        }
    } else {
        keyword_intent
    };

    ParsedQuery { raw: text.to_string(), intent, model_numbers, brand_codes, spec_names }
}

/// 1..=`width`-word substrings, used to probe the registry's synonym index
/// for multi-word spec labels ("storage capacity") without a full NLP
/// tokenizer.
fn sliding_windows(lower: &str, width: usize) -> Vec<String> {
    let words: Vec<&str> = lower.split_whitespace().collect();
    let mut windows = Vec::new();
    for start in 0..words.len() {
        for len in 1..=width.min(words.len() - start) {
            windows.push(words[start..start + len].join(" "));
        }
    }
    windows
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    pub model_number: Option<String>,
    pub brand: Option<String>,
    pub spec_names: Vec<String>,
}

/// §4.10 step 2: derive structured predicates from the parsed query. A
/// recognized model number narrows to a single product; brand codes and
/// spec mentions become additional filters the store-level search can use
/// to bias lexical search or post-filter vector hits.
pub fn derive_filters(parsed: &ParsedQuery) -> RetrievalFilters {
    RetrievalFilters {
        model_number: parsed.model_numbers.first().cloned(),
        brand: parsed.brand_codes.first().cloned(),
        spec_names: parsed.spec_names.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub content: String,
    pub source_doc_id: Uuid,
    pub product_ids: BTreeSet<Uuid>,
    pub page_number: Option<i32>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ContextPack {
    pub intent: QueryIntent,
    pub filters: RetrievalFilters,
    pub chunks: Vec<ContextChunk>,
    pub used_products: BTreeSet<Uuid>,
}

fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(3)
}

/// §4.10 step 6: walk the fused ranking in order, guaranteeing at least one
/// chunk per distinct product referenced even if that first pass alone
/// exceeds the token budget, then fill any remaining budget with further
/// chunks in rank order.
pub fn assemble_context_pack(
    fused: &[(Uuid, f64)],
    chunk_lookup: &BTreeMap<Uuid, Chunk>,
    token_budget: usize,
    intent: QueryIntent,
    filters: RetrievalFilters,
) -> ContextPack {
    let all_products: BTreeSet<Uuid> = fused
        .iter()
        .filter_map(|(id, _)| chunk_lookup.get(id))
        .flat_map(|c| c.product_ids.iter().copied())
        .collect();

    let mut used_products: BTreeSet<Uuid> = BTreeSet::new();
    let mut included: BTreeSet<Uuid> = BTreeSet::new();
    let mut chunks = Vec::new();
    let mut tokens_used = 0usize;

    // Pass 1: guarantee one chunk per distinct product, in fused-rank order.
    for (chunk_id, score) in fused {
        if used_products.len() == all_products.len() {
            break;
        }
        let Some(chunk) = chunk_lookup.get(chunk_id) else { continue };
        if chunk.product_ids.iter().any(|p| !used_products.contains(p)) {
            chunks.push(to_context_chunk(chunk, *score));
            tokens_used += estimate_tokens(&chunk.content);
            included.insert(*chunk_id);
            used_products.extend(chunk.product_ids.iter().copied());
        }
    }

    // Pass 2: fill remaining budget in rank order.
    for (chunk_id, score) in fused {
        if tokens_used >= token_budget {
            break;
        }
        if included.contains(chunk_id) {
            continue;
        }
        let Some(chunk) = chunk_lookup.get(chunk_id) else { continue };
        let chunk_tokens = estimate_tokens(&chunk.content);
        if tokens_used + chunk_tokens > token_budget && tokens_used > 0 {
            continue;
        }
        chunks.push(to_context_chunk(chunk, *score));
        tokens_used += chunk_tokens;
        included.insert(*chunk_id);
    }

    ContextPack { intent, filters, chunks, used_products }
}

fn to_context_chunk(chunk: &Chunk, score: f64) -> ContextChunk {
    ContextChunk {
        content: chunk.content.clone(),
        source_doc_id: chunk.document_id,
        product_ids: chunk.product_ids.clone(),
        page_number: chunk.page_number,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_registry;
    use crate::types::ChunkType;

    fn chunk(id: Uuid, content: &str, product: Uuid) -> Chunk {
        Chunk {
            id,
            document_id: Uuid::new_v4(),
            chunk_index: 0,
            content: content.to_string(),
            chunk_type: ChunkType::Text,
            page_number: Some(1),
            section_title: None,
            product_ids: BTreeSet::from([product]),
            spec_names: BTreeSet::new(),
            embedding: None,
            token_count: estimate_tokens(content) as i32,
        }
    }

    #[test]
    fn model_number_in_query_forces_spec_lookup_intent() {
        let registry = seed_registry();
        let pattern = regex::Regex::new(r"ABT-HC-\d+[SG]").unwrap();
        let parsed = parse_query("what is the storage capacity of ABT-HC-26S", &registry, &["ABS"], &pattern);
        assert_eq!(parsed.model_numbers, vec!["ABT-HC-26S".to_string()]);
        assert_eq!(parsed.intent, QueryIntent::SpecLookup);
        assert!(parsed.spec_names.contains(&"storage_capacity_cuft".to_string()));
    }

    #[test]
    fn comparison_keyword_wins_even_without_spec_terms() {
        let registry = seed_registry();
        let pattern = regex::Regex::new(r"ABT-HC-\d+[SG]").unwrap();
        let parsed = parse_query("compare the two freezer models", &registry, &["ABS"], &pattern);
        assert_eq!(parsed.intent, QueryIntent::Comparison);
    }

    #[test]
    fn context_pack_guarantees_one_chunk_per_product_even_under_tight_budget() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let chunk_a = chunk(Uuid::new_v4(), &"word ".repeat(400), a);
        let chunk_b = chunk(Uuid::new_v4(), &"other ".repeat(400), b);
        let mut lookup = BTreeMap::new();
        lookup.insert(chunk_a.id, chunk_a.clone());
        lookup.insert(chunk_b.id, chunk_b.clone());

        let fused = vec![(chunk_a.id, 0.9), (chunk_b.id, 0.1)];
        let pack = assemble_context_pack(&fused, &lookup, 50, QueryIntent::General, RetrievalFilters::default());

        assert_eq!(pack.used_products, BTreeSet::from([a, b]));
        assert_eq!(pack.chunks.len(), 2);
    }

    #[test]
    fn context_pack_stops_filling_once_budget_reached() {
        let a = Uuid::new_v4();
        let chunk_a = chunk(Uuid::new_v4(), &"word ".repeat(10), a);
        let chunk_b = chunk(Uuid::new_v4(), &"word ".repeat(10), a);
        let mut lookup = BTreeMap::new();
        lookup.insert(chunk_a.id, chunk_a.clone());
        lookup.insert(chunk_b.id, chunk_b.clone());

        let fused = vec![(chunk_a.id, 0.9), (chunk_b.id, 0.8)];
        let pack = assemble_context_pack(&fused, &lookup, 5, QueryIntent::General, RetrievalFilters::default());
        // pass 1 always includes the first chunk for product `a`, even over budget
        assert_eq!(pack.chunks.len(), 1);
    }
}
