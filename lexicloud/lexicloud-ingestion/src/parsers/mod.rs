//! Format-specific text extraction.
//!
//! Each supported [`DocumentFormat`] has a [`DocumentParser`] that turns the
//! raw file bytes into plain text: paragraphs (Word) or pages (PDF, OFD)
//! separated by newlines, blank ones dropped. The [`ParserRegistry`] maps
//! formats to parsers.

use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentFormat;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub mod doc;
pub mod docx;
pub mod ofd;
pub mod pdf;

pub use doc::DocParser;
pub use docx::DocxParser;
pub use ofd::OfdParser;
pub use pdf::PdfParser;

/// Leading bytes of every zip container (DOCX, OFD)
pub(crate) const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Trait for document text extractors
///
/// Parsers are synchronous and may be CPU-heavy; callers run them on a
/// blocking thread.
pub trait DocumentParser: Send + Sync {
    /// The format this parser handles
    fn format(&self) -> DocumentFormat;

    /// Extract text from the file contents. `path` is used for error
    /// reporting and by parsers that need to hand the file to another tool.
    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<String>;
}

/// Registry of parsers keyed by format
pub struct ParserRegistry {
    parsers: HashMap<DocumentFormat, Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create a registry with the default parser for every format
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Box::new(DocParser::new()));
        registry.register(Box::new(DocxParser::new()));
        registry.register(Box::new(PdfParser::new()));
        registry.register(Box::new(OfdParser::new()));

        registry
    }

    /// Create a registry with no parsers
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register a parser, replacing any previous parser for its format
    pub fn register(&mut self, parser: Box<dyn DocumentParser>) {
        self.parsers.insert(parser.format(), parser);
    }

    pub fn get(&self, format: DocumentFormat) -> Option<&dyn DocumentParser> {
        self.parsers.get(&format).map(|p| p.as_ref())
    }

    /// Read and parse one file.
    ///
    /// Every failure, including an unreadable file, is reported as a
    /// [`LexiError::ParseFailure`] carrying `path`.
    pub fn parse_file(&self, path: &Path, format: DocumentFormat) -> Result<String> {
        let parser = self
            .get(format)
            .ok_or_else(|| LexiError::unsupported_format(format.to_string()))?;

        let bytes = std::fs::read(path)
            .map_err(|e| LexiError::parse_failure(path, format!("Failed to read file: {}", e)))?;

        parser.parse(path, &bytes).map_err(|e| match e {
            LexiError::ParseFailure { .. } => e,
            other => LexiError::parse_failure(path, other.to_string()),
        })
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a zip entry as UTF-8 text
pub(crate) fn read_zip_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> std::result::Result<String, String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("Missing {}: {}", name, e))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| format!("Failed to read {}: {}", name, e))?;
    Ok(content)
}

/// Join non-blank blocks with newlines
pub(crate) fn join_blocks<I: IntoIterator<Item = String>>(blocks: I) -> String {
    blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
