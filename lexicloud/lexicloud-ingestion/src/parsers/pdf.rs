//! PDF text extraction.

use super::{join_blocks, DocumentParser};
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentFormat;
use lopdf::Document as PdfDocument;
use pdf_extract::extract_text_from_mem;
use std::path::Path;
use tracing::{debug, warn};

/// Parser for PDF documents
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract text per page using lopdf
    fn extract_pages(path: &Path, bytes: &[u8]) -> Result<Vec<String>> {
        let pdf = PdfDocument::load_mem(bytes)
            .map_err(|e| LexiError::parse_failure(path, format!("Failed to load PDF: {}", e)))?;

        let pages = pdf.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page_num in pages.keys() {
            match pdf.extract_text(&[*page_num]) {
                Ok(text) => texts.push(text),
                Err(e) => debug!("Skipping page {} of {}: {}", page_num, path.display(), e),
            }
        }
        Ok(texts)
    }
}

impl DocumentParser for PdfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<String> {
        debug!("Processing PDF document ({} bytes)", bytes.len());

        match extract_text_from_mem(bytes) {
            // pdf-extract separates pages with form feeds
            Ok(text) => Ok(join_blocks(text.split('\u{000C}').map(str::to_string))),
            Err(e) => {
                warn!("pdf-extract failed on {}: {}, retrying page by page", path.display(), e);
                Self::extract_pages(path, bytes).map(join_blocks)
            }
        }
    }
}
