//! Word 2007+ (.docx) text extraction.
//!
//! Reads `word/document.xml` from the OOXML container and collects the text
//! runs (`w:t`) of every paragraph (`w:p`). Tabs and breaks become spaces.

use super::{join_blocks, read_zip_entry, DocumentParser};
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentFormat;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_XML: &str = "word/document.xml";

/// Parser for .docx files
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxParser;

impl DocxParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract paragraphs from an in-memory .docx
    pub fn extract_text(path: &Path, bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LexiError::parse_failure(path, format!("Not a DOCX archive: {}", e)))?;

        let xml = read_zip_entry(&mut archive, DOCUMENT_XML)
            .map_err(|reason| LexiError::parse_failure(path, reason))?;

        let paragraphs = paragraphs_from_xml(&xml)
            .map_err(|reason| LexiError::parse_failure(path, reason))?;

        tracing::debug!("Extracted {} paragraphs from {}", paragraphs.len(), path.display());
        Ok(join_blocks(paragraphs))
    }
}

impl DocumentParser for DocxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<String> {
        Self::extract_text(path, bytes)
    }
}

/// Paragraph texts of a WordprocessingML body, in document order
fn paragraphs_from_xml(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                b"tab" | b"br" | b"cr" => current.push(' '),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" | b"cr" => current.push(' '),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| format!("Bad text in {}: {}", DOCUMENT_XML, err))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "Malformed {} at position {}: {}",
                    DOCUMENT_XML,
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}
