//! OFD (GB/T 33190) text extraction.
//!
//! An OFD file is a zip package. `OFD.xml` names the document root
//! (`DocBody/DocRoot`), the document lists its pages (`Pages/Page@BaseLoc`),
//! and each page's `Content.xml` carries the text in `TextCode` elements.
//! When the index cannot be followed, every `Content.xml` in the package is
//! read in archive order instead.

use super::{join_blocks, read_zip_entry, DocumentParser};
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentFormat;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

const ENTRY_XML: &str = "OFD.xml";

/// Parser for OFD documents
#[derive(Debug, Clone, Copy, Default)]
pub struct OfdParser;

impl OfdParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for OfdParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Ofd
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LexiError::parse_failure(path, format!("Not an OFD package: {}", e)))?;

        let pages = match page_locations(&mut archive) {
            Ok(pages) if !pages.is_empty() => pages,
            Ok(_) => {
                warn!("{} lists no pages, scanning package", path.display());
                content_entries(&mut archive)
            }
            Err(reason) => {
                warn!("Cannot follow OFD index of {}: {}, scanning package", path.display(), reason);
                content_entries(&mut archive)
            }
        };

        if pages.is_empty() {
            return Err(LexiError::parse_failure(path, "No page content found in OFD package"));
        }

        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            let xml = read_zip_entry(&mut archive, page)
                .map_err(|reason| LexiError::parse_failure(path, reason))?;
            let text = page_text(&xml).map_err(|reason| LexiError::parse_failure(path, reason))?;
            texts.push(text);
        }

        debug!("Extracted {} pages from {}", texts.len(), path.display());
        Ok(join_blocks(texts))
    }
}

/// Page content paths in document order, following OFD.xml and Document.xml
fn page_locations<R: Read + Seek>(archive: &mut ZipArchive<R>) -> std::result::Result<Vec<String>, String> {
    let entry = read_zip_entry(archive, ENTRY_XML)?;
    let doc_root = element_text(&entry, b"DocRoot")?
        .ok_or_else(|| "OFD.xml has no DocRoot".to_string())?;
    let doc_path = resolve("", &doc_root);

    let document = read_zip_entry(archive, &doc_path)?;
    let doc_dir = doc_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

    let locations = page_base_locs(&document)?;
    Ok(locations.iter().map(|loc| resolve(doc_dir, loc)).collect())
}

/// Every `Content.xml` entry in archive order
fn content_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| name.ends_with("Content.xml"))
        .collect()
}

/// Resolve an OFD location against a base directory inside the package
fn resolve(base_dir: &str, location: &str) -> String {
    let location = location.trim().replace('\\', "/");
    let joined = match location.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => location,
        None => format!("{}/{}", base_dir, location),
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Text of the first element with the given local name
fn element_text(xml: &str, name: &[u8]) -> std::result::Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == name => inside = true,
            Ok(Event::Text(e)) if inside => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                return Ok(Some(text.into_owned()));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == name => inside = false,
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(format!("Malformed XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }
}

/// `BaseLoc` attributes of every `Page` element
fn page_base_locs(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut locations = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"Page" => {
                let base_loc = e
                    .attributes()
                    .filter_map(std::result::Result::ok)
                    .find(|a| a.key.local_name().as_ref() == b"BaseLoc")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                if let Some(loc) = base_loc {
                    locations.push(loc);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Malformed Document.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(locations)
}

/// Concatenated `TextCode` contents of one page
fn page_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_code = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"TextCode" => in_code = true,
            Ok(Event::Text(e)) if in_code => {
                let chunk = e.unescape().map_err(|err| err.to_string())?;
                text.push_str(&chunk);
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"TextCode" => in_code = false,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"TextObject" => text.push(' '),
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Malformed page content: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}
