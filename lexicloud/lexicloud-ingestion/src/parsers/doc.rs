//! Word 97-2003 (.doc) text extraction.
//!
//! Files carrying a `.doc` extension are often OOXML packages in disguise;
//! those are read directly as DOCX. Genuine OLE2 compound files are converted
//! to DOCX with a headless office suite in a scratch directory and then read.

use super::docx::DocxParser;
use super::{DocumentParser, ZIP_SIGNATURE};
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentFormat;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// CFB (Compound File Binary) / OLE2 magic signature
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const DEFAULT_CONVERTER: &str = "soffice";

/// Parser for .doc files
#[derive(Debug, Clone)]
pub struct DocParser {
    converter: String,
}

impl DocParser {
    pub fn new() -> Self {
        Self {
            converter: DEFAULT_CONVERTER.to_string(),
        }
    }

    /// Use a different office converter executable
    pub fn with_converter(mut self, program: impl Into<String>) -> Self {
        self.converter = program.into();
        self
    }

    /// Convert an OLE2 document to DOCX bytes
    fn convert_to_docx(&self, path: &Path, bytes: &[u8]) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()
            .map_err(|e| LexiError::parse_failure(path, format!("Failed to create scratch directory: {}", e)))?;

        let input = workdir.path().join("input.doc");
        std::fs::write(&input, bytes)
            .map_err(|e| LexiError::parse_failure(path, format!("Failed to stage document: {}", e)))?;

        debug!("Converting {} with {}", path.display(), self.converter);
        let output = Command::new(&self.converter)
            .arg("--headless")
            .arg("--convert-to")
            .arg("docx")
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&input)
            .output()
            .map_err(|e| {
                LexiError::parse_failure(
                    path,
                    format!("No .doc converter available ({}): {}", self.converter, e),
                )
            })?;

        if !output.status.success() {
            return Err(LexiError::parse_failure(
                path,
                format!(
                    "{} conversion failed: {}",
                    self.converter,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let converted = workdir.path().join("input.docx");
        let docx = std::fs::read(&converted).map_err(|e| {
            LexiError::parse_failure(path, format!("Converter produced no DOCX output: {}", e))
        })?;
        if docx.is_empty() {
            return Err(LexiError::parse_failure(path, "Converter produced an empty DOCX file"));
        }

        Ok(docx)
    }
}

impl Default for DocParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for DocParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Doc
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<String> {
        if bytes.starts_with(&ZIP_SIGNATURE) {
            debug!("{} is an OOXML package, reading as DOCX", path.display());
            return DocxParser::extract_text(path, bytes);
        }

        if bytes.starts_with(&CFB_SIGNATURE) {
            let docx = self.convert_to_docx(path, bytes)?;
            return DocxParser::extract_text(path, &docx);
        }

        Err(LexiError::parse_failure(path, "Invalid .doc file signature"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn converter_available() -> bool {
        Command::new(DEFAULT_CONVERTER)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_ooxml_with_doc_extension_reads_as_docx() {
        let bytes = docx_bytes(&["政府工作报告", "高质量 发展"]);
        // the converter must never run for a zip package
        let parser = DocParser::new().with_converter("lexicloud-no-such-converter");
        let text = parser.parse(Path::new("renamed.doc"), &bytes).unwrap();
        assert_eq!(text, "政府工作报告\n高质量 发展");
    }

    #[test]
    fn test_converts_real_doc_when_office_is_installed() {
        if !converter_available() {
            eprintln!("{} not installed, skipping", DEFAULT_CONVERTER);
            return;
        }

        // build a genuine .doc by converting a DOCX with the same suite
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.docx");
        std::fs::write(&source, docx_bytes(&["legacy word text"])).unwrap();
        let status = Command::new(DEFAULT_CONVERTER)
            .args(["--headless", "--convert-to", "doc", "--outdir"])
            .arg(dir.path())
            .arg(&source)
            .output()
            .unwrap();
        assert!(status.status.success());

        let bytes = std::fs::read(dir.path().join("source.doc")).unwrap();
        assert!(bytes.starts_with(&CFB_SIGNATURE));
        let text = DocParser::new().parse(Path::new("source.doc"), &bytes).unwrap();
        assert!(text.contains("legacy word text"));
    }

    #[test]
    fn test_invalid_signature() {
        let result = DocParser::new().parse(Path::new("x.doc"), b"INVALID_ bytes");
        match result {
            Err(LexiError::ParseFailure { reason, .. }) => assert!(reason.contains("signature")),
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_converter_is_parse_failure() {
        let mut bytes = CFB_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 512]);

        let parser = DocParser::new().with_converter("lexicloud-no-such-converter");
        let result = parser.parse(Path::new("old.doc"), &bytes);
        match result {
            Err(LexiError::ParseFailure { reason, .. }) => {
                assert!(reason.contains("lexicloud-no-such-converter"))
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }
}
