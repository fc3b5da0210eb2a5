//! Page-by-page text extraction for PDF documents.

use std::path::Path;

use anyhow::{Context, Result};
use lopdf::Document;
use tracing::{info, warn};

/// Raw text of a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Zero-based page index.
    pub page_no: usize,
    /// Extracted text, empty when the page had no extractable text.
    pub text: String,
}

/// Opens `path` and extracts the text of every page in page order.
///
/// Pages whose content streams cannot be decoded come back empty so that
/// later filters drop them; only a document that fails to open is an error.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>> {
    let document =
        Document::load(path).with_context(|| format!("failed to open pdf {:?}", path))?;
    let pages = document.get_pages();
    info!(path = %path.display(), pages = pages.len(), "opened pdf");

    let mut out = Vec::with_capacity(pages.len());
    // get_pages is keyed by one-based page number and already sorted
    for (idx, page_number) in pages.keys().enumerate() {
        let text = match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(err) => {
                warn!(page = idx, error = %err, "failed to extract page text");
                String::new()
            }
        };
        out.push(PageText { page_no: idx, text });
    }
    Ok(out)
}
