//! Text Extractor (§4.1): file bytes + declared MIME type -> plain text and
//! per-page segments. PDF bytes are handed to an external byte->text
//! provider (§6); text/markdown formats are decoded locally.

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub page_no: i32,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub plain_text: String,
    pub pages: Vec<ExtractedPage>,
    pub metadata: serde_json::Value,
}

/// The external byte->text provider contract (§6). Implementations live in
/// the HTTP adapter crate; this trait is the seam the core depends on.
#[async_trait]
pub trait PdfTextProvider: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> CoreResult<ExtractedDocument>;
}

const STAGE: &str = "extractor";

/// Decode plain text / markdown locally: UTF-8 with lossy replacement,
/// pages synthesized by form-feed or `# heading` boundaries.
pub fn extract_plain_text(bytes: &[u8]) -> ExtractedDocument {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let pages = if text.contains('\u{000C}') {
        text.split('\u{000C}')
            .enumerate()
            .map(|(i, t)| ExtractedPage { page_no: i as i32 + 1, text: t.to_string() })
            .collect()
    } else {
        split_on_headings(&text)
    };
    ExtractedDocument { plain_text: text, pages, metadata: serde_json::json!({}) }
}

fn split_on_headings(text: &str) -> Vec<ExtractedPage> {
    let mut pages = Vec::new();
    let mut current = String::new();
    let mut page_no = 1;
    for line in text.lines() {
        if line.trim_start().starts_with('#') && !current.trim().is_empty() {
            pages.push(ExtractedPage { page_no, text: std::mem::take(&mut current) });
            page_no += 1;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() || pages.is_empty() {
        pages.push(ExtractedPage { page_no, text: current });
    }
    pages
}

/// Dispatches on declared MIME type. PDFs go through `provider`; everything
/// else is decoded locally. Per §4.1: `ExtractionFailed` if the provider
/// returns no text for a PDF, `UnsupportedFormat` for anything else
/// unrecognized.
pub async fn extract(bytes: &[u8], mime_type: &str, provider: &dyn PdfTextProvider) -> CoreResult<ExtractedDocument> {
    match mime_type {
        "application/pdf" => {
            let doc = provider.extract(bytes).await?;
            if doc.plain_text.trim().is_empty() {
                return Err(CoreError::extraction_failed(STAGE, "pdf provider returned no text"));
            }
            Ok(doc)
        }
        "text/plain" | "text/markdown" | "text/x-markdown" => Ok(extract_plain_text(bytes)),
        other => Err(CoreError::unsupported_format(STAGE, format!("unrecognized mime type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_on_form_feed() {
        let doc = extract_plain_text(b"page one\x0Cpage two\x0Cpage three");
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[1].page_no, 2);
    }

    #[test]
    fn markdown_splits_on_headings() {
        let doc = extract_plain_text(b"# Intro\nhello\n# Specs\ncapacity: 26\n");
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[1].text.contains("capacity"));
    }

    #[test]
    fn invalid_utf8_is_lossily_replaced_not_rejected() {
        let doc = extract_plain_text(&[0x68, 0x65, 0xff, 0x6c, 0x6f]);
        assert!(doc.plain_text.contains('\u{FFFD}'));
    }
}
