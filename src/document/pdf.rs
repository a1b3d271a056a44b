//! PDF text extraction backed by `lopdf`.

use async_trait::async_trait;
use lopdf::Document;

use super::{DocumentLoader, ExtractionError, LoadedDocument};

/// PDF loader using the `lopdf` parser.
///
/// Parsing is CPU-bound, so it runs on the blocking thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new PDF loader.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, bytes: &[u8]) -> Result<LoadedDocument, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::Empty);
        }

        let owned = bytes.to_vec();
        let loaded = tokio::task::spawn_blocking(move || extract_pdf_text(&owned))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))??;

        tracing::info!(
            page_count = loaded.page_count,
            characters = loaded.text.chars().count(),
            "Extracted text from PDF"
        );

        Ok(loaded)
    }

    fn loader_name(&self) -> &'static str {
        "lopdf"
    }
}

/// Extract every page of a PDF held in memory.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<LoadedDocument, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Unreadable(e.to_string()))?;

    // get_pages is keyed by one-based page number, so iteration is document order.
    let pages = doc.get_pages();
    let page_texts = collect_pages(
        pages
            .keys()
            .map(|&page| (page, doc.extract_text(&[page]))),
    );

    let text = join_pages(page_texts.iter().map(String::as_str));
    if text.trim().is_empty() {
        return Err(ExtractionError::NoText { pages: pages.len() });
    }

    Ok(LoadedDocument {
        text,
        page_count: pages.len(),
    })
}

/// Page texts in document order.
///
/// A page the parser cannot decode is logged and contributes an empty page,
/// so one damaged page does not reject the whole statement.
pub fn collect_pages<E: std::fmt::Display>(
    pages: impl IntoIterator<Item = (u32, Result<String, E>)>,
) -> Vec<String> {
    pages
        .into_iter()
        .map(|(page, result)| {
            result.unwrap_or_else(|e| {
                tracing::warn!(page, error = %e, "Skipping unreadable page");
                String::new()
            })
        })
        .collect()
}

/// Concatenate page texts in order, each followed by a single `\n`.
///
/// Line breaks the parser leaves at the end of a page are dropped first, so
/// pages `"A"` and `"B"` always give `"A\nB\n"`.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page.trim_end_matches(['\r', '\n']));
        text.push('\n');
    }
    text
}
