//! Core types passed between the pipeline stages.

use crate::error::LexiError;
use crate::term::normalize_term;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Recognized office document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Doc,
    Docx,
    Pdf,
    Ofd,
}

impl DocumentFormat {
    /// All formats, in the order they are listed in the default config.
    pub const ALL: [DocumentFormat; 4] = [Self::Doc, Self::Docx, Self::Pdf, Self::Ofd];

    /// Detect format from a file extension (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "ofd" => Some(Self::Ofd),
            _ => None,
        }
    }

    /// Detect format from a file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Ofd => "ofd",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = LexiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| LexiError::unsupported_format(s.to_string()))
    }
}

/// Outcome of loading a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Loaded,
    Failed { reason: String },
}

/// A document found in the input directory, with its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub text: String,
    pub status: DocumentStatus,
}

impl Document {
    /// Create a successfully loaded document
    pub fn loaded(path: impl Into<PathBuf>, format: DocumentFormat, text: String) -> Self {
        Self {
            path: path.into(),
            format,
            text,
            status: DocumentStatus::Loaded,
        }
    }

    /// Create a document whose text could not be extracted
    pub fn failed(path: impl Into<PathBuf>, format: DocumentFormat, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format,
            text: String::new(),
            status: DocumentStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, DocumentStatus::Loaded)
    }

    /// Failure reason, if the document failed to load
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            DocumentStatus::Failed { reason } => Some(reason),
            DocumentStatus::Loaded => None,
        }
    }

    /// Identifier used in reports: the file stem
    pub fn identifier(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A single keyword with its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub term: String,
    pub weight: f64,
}

impl KeywordEntry {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// Keywords for one document, sorted by descending weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentKeywordSet {
    entries: Vec<KeywordEntry>,
}

impl DocumentKeywordSet {
    /// Build a keyword set from raw entries.
    ///
    /// Terms are normalized, entries with negative or non-finite weights or
    /// empty terms are dropped, duplicates keep their highest weight, and the
    /// result is sorted by descending weight (stable, so equal weights keep
    /// their input order) and truncated to `limit`.
    pub fn new(entries: impl IntoIterator<Item = KeywordEntry>, limit: usize) -> Self {
        let mut entries: Vec<KeywordEntry> = entries
            .into_iter()
            .filter(|e| e.weight.is_finite() && e.weight >= 0.0)
            .map(|e| KeywordEntry::new(normalize_term(&e.term), e.weight))
            .filter(|e| !e.term.is_empty())
            .collect();

        entries.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.term.clone()));
        entries.truncate(limit);

        Self { entries }
    }

    /// An empty keyword set
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeywordEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weight of a term, looked up after normalization
    pub fn weight_of(&self, term: &str) -> Option<f64> {
        let term = normalize_term(term);
        self.entries.iter().find(|e| e.term == term).map(|e| e.weight)
    }

    /// Drop terms that appear in the given (already normalized) exclusion set
    pub fn without(mut self, excluded: &HashSet<String>) -> Self {
        if !excluded.is_empty() {
            self.entries.retain(|e| !excluded.contains(&e.term));
        }
        self
    }
}

/// Keyword extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Llm,
    Tfidf,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Tfidf => "tfidf",
        }
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = LexiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "tfidf" | "tf-idf" => Ok(Self::Tfidf),
            _ => Err(LexiError::config(format!(
                "Invalid extraction method '{}'. Must be one of: llm, tfidf",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which LLM service answers keyword requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// Hosted DeepSeek chat-completions API, requires a key
    DeepSeek,
    /// Local Ollama service
    Ollama,
}

impl ApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for ApiType {
    type Err = LexiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepseek" => Ok(Self::DeepSeek),
            "ollama" => Ok(Self::Ollama),
            _ => Err(LexiError::config(format!(
                "Invalid API type '{}'. Must be one of: deepseek, ollama",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ApiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.DOCX")), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_path(Path::new("report.ofd")), Some(DocumentFormat::Ofd));
        assert_eq!(DocumentFormat::from_extension(".pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_document_identifier_is_stem() {
        let doc = Document::loaded("docs/2023/工作报告.pdf", DocumentFormat::Pdf, "text".into());
        assert_eq!(doc.identifier(), "工作报告");
        assert!(doc.is_loaded());
        assert_eq!(doc.failure_reason(), None);

        let failed = Document::failed("docs/x.ofd", DocumentFormat::Ofd, "bad zip");
        assert!(!failed.is_loaded());
        assert_eq!(failed.failure_reason(), Some("bad zip"));
    }

    #[test]
    fn test_keyword_set_sorted_and_bounded() {
        let set = DocumentKeywordSet::new(
            vec![
                KeywordEntry::new("b", 0.2),
                KeywordEntry::new("a", 0.9),
                KeywordEntry::new("c", 0.5),
                KeywordEntry::new("d", 0.1),
            ],
            3,
        );
        let terms: Vec<_> = set.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_keyword_set_merges_case_variants() {
        let set = DocumentKeywordSet::new(
            vec![
                KeywordEntry::new("Rust", 0.4),
                KeywordEntry::new("rust", 0.7),
                KeywordEntry::new(" RUST ", 0.1),
            ],
            10,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.weight_of("Rust"), Some(0.7));
    }

    #[test]
    fn test_keyword_set_drops_invalid_weights() {
        let set = DocumentKeywordSet::new(
            vec![
                KeywordEntry::new("neg", -0.1),
                KeywordEntry::new("nan", f64::NAN),
                KeywordEntry::new("   ", 0.5),
                KeywordEntry::new("ok", 0.0),
            ],
            10,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.entries()[0].term, "ok");
    }

    #[test]
    fn test_keyword_set_equal_weights_keep_input_order() {
        let set = DocumentKeywordSet::new(
            vec![
                KeywordEntry::new("first", 0.5),
                KeywordEntry::new("second", 0.5),
                KeywordEntry::new("third", 0.5),
            ],
            10,
        );
        let terms: Vec<_> = set.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_keyword_set_without_excluded() {
        let excluded: HashSet<String> = ["测试".to_string()].into_iter().collect();
        let set = DocumentKeywordSet::new(
            vec![KeywordEntry::new("测试", 0.9), KeywordEntry::new("发展", 0.8)],
            10,
        )
        .without(&excluded);
        assert_eq!(set.len(), 1);
        assert_eq!(set.weight_of("发展"), Some(0.8));
    }

    #[test]
    fn test_method_and_api_parsing() {
        assert_eq!("tfidf".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Tfidf);
        assert_eq!("LLM".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Llm);
        assert!("bm25".parse::<ExtractionMethod>().is_err());
        assert_eq!("ollama".parse::<ApiType>().unwrap(), ApiType::Ollama);
        assert_eq!("DeepSeek".parse::<ApiType>().unwrap(), ApiType::DeepSeek);
        assert!("openai".parse::<ApiType>().is_err());
        assert_eq!(ApiType::DeepSeek.to_string(), "deepseek");
    }
}
