//! Chunker (§4.9): structure-aware splitting of extracted text into
//! retrieval units. Embedding dispatch lives in `catalog-server` (it is a
//! remote call); this module is the pure text->chunk half.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::extractor::ExtractedPage;
use crate::registry::SpecRegistry;
use crate::types::ChunkType;

const SOFT_TARGET_TOKENS: usize = 500;
const HARD_CAP_TOKENS: usize = 900;

#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub chunk_index: i32,
    pub content: String,
    pub chunk_type: ChunkType,
    pub page_number: Option<i32>,
    pub section_title: Option<String>,
    pub spec_names: BTreeSet<String>,
    pub token_count: i32,
}

fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(3)
}

fn classify_block(block: &str) -> ChunkType {
    let trimmed = block.trim();
    if trimmed.starts_with('#') || (trimmed.lines().count() == 1 && trimmed.len() < 80 && trimmed.ends_with(':')) {
        return ChunkType::Header;
    }
    let colon_lines = trimmed.lines().filter(|l| l.contains(':') || l.contains('|')).count();
    let total_lines = trimmed.lines().count().max(1);
    if total_lines >= 2 && colon_lines * 2 >= total_lines {
        return ChunkType::SpecBlock;
    }
    if trimmed.to_lowercase().contains("table") {
        return ChunkType::Table;
    }
    ChunkType::Text
}

fn current_section_title(block: &str) -> Option<String> {
    block.lines().next().map(|l| l.trim_start_matches('#').trim().to_string()).filter(|s| !s.is_empty())
}

/// Split a page's text into retrieval units: headers and spec tables each
/// become their own chunk; the remainder splits on paragraph boundaries
/// with a soft target of ~500 tokens and a hard cap.
fn split_page(text: &str) -> Vec<String> {
    let paragraphs: Vec<&str> = text.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for para in paragraphs {
        let kind = classify_block(para);
        if matches!(kind, ChunkType::Header | ChunkType::SpecBlock) {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            blocks.push(para.to_string());
            continue;
        }

        let para_tokens = estimate_tokens(para);
        if current_tokens > 0 && current_tokens + para_tokens > HARD_CAP_TOKENS {
            blocks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
        current_tokens += para_tokens;
        if current_tokens >= SOFT_TARGET_TOKENS {
            blocks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Build the full set of pending chunks for a document, resolving spec
/// mentions through the registry's synonym table.
pub fn build_chunks(pages: &[ExtractedPage], registry: &SpecRegistry) -> Vec<PendingChunk> {
    let mut chunks = Vec::new();
    let mut index = 0i32;
    for page in pages {
        for block in split_page(&page.text) {
            let chunk_type = classify_block(&block);
            let section_title = if matches!(chunk_type, ChunkType::Header) { current_section_title(&block) } else { None };
            let spec_names = resolve_mentioned_specs(&block, registry);
            chunks.push(PendingChunk {
                chunk_index: index,
                token_count: estimate_tokens(&block) as i32,
                content: block,
                chunk_type,
                page_number: Some(page.page_no),
                section_title,
                spec_names,
            });
            index += 1;
        }
    }
    chunks
}

fn resolve_mentioned_specs(block: &str, registry: &SpecRegistry) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in block.lines() {
        if let Some((label, _)) = line.split_once(':') {
            if let Some(canonical) = registry.resolve(label) {
                names.insert(canonical);
            }
        }
    }
    names
}

pub fn new_chunk_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_become_their_own_chunk() {
        let page = ExtractedPage { page_no: 1, text: "# Specifications\n\nSome intro text about the unit.".to_string() };
        let chunks = build_chunks(std::slice::from_ref(&page), &SpecRegistry::new());
        assert_eq!(chunks[0].chunk_type, ChunkType::Header);
        assert_eq!(chunks[0].section_title.as_deref(), Some("Specifications"));
    }

    #[test]
    fn spec_table_is_its_own_chunk() {
        let page = ExtractedPage {
            page_no: 1,
            text: "Capacity: 26 cuft\nVoltage: 115V\nAmperage: 3A\n\nA long marketing paragraph that goes on.".to_string(),
        };
        let chunks = build_chunks(std::slice::from_ref(&page), &SpecRegistry::new());
        assert_eq!(chunks[0].chunk_type, ChunkType::SpecBlock);
    }

    #[test]
    fn long_text_splits_near_soft_target() {
        let long_para = "word ".repeat(2000);
        let page = ExtractedPage { page_no: 1, text: format!("{long_para}\n\n{long_para}") };
        let chunks = build_chunks(std::slice::from_ref(&page), &SpecRegistry::new());
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.token_count as usize <= HARD_CAP_TOKENS + 50));
    }

    #[test]
    fn chunk_index_is_contiguous() {
        let page = ExtractedPage { page_no: 1, text: "# A\n\npara one\n\npara two".to_string() };
        let chunks = build_chunks(std::slice::from_ref(&page), &SpecRegistry::new());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i32);
        }
    }
}
