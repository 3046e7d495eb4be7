//! Error types for the lexicloud pipeline.

use std::path::PathBuf;

/// Result type alias for lexicloud operations.
pub type Result<T> = std::result::Result<T, LexiError>;

/// Main error type for the lexicloud pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LexiError {
    /// File extension is not in the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A single document could not be turned into text
    #[error("Failed to parse {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    /// LLM call exceeded its timeout
    #[error("Extraction timed out: {0}")]
    ExtractionTimeout(String),

    /// LLM endpoint returned an error or could not be reached
    #[error("Extraction service error: {0}")]
    ExtractionService(String),

    /// LLM endpoint answered with something that is not a keyword list
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Nothing usable to extract from or render
    #[error("Corpus is empty: {0}")]
    CorpusEmpty(String),

    /// An output artifact could not be written
    #[error("Failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Word cloud rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wrapped anyhow errors for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LexiError {
    /// Create a new unsupported format error
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Create a new parse failure for a document
    pub fn parse_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new extraction timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::ExtractionTimeout(msg.into())
    }

    /// Create a new extraction service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::ExtractionService(msg.into())
    }

    /// Create a new malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a new corpus empty error
    pub fn corpus_empty(msg: impl Into<String>) -> Self {
        Self::CorpusEmpty(msg.into())
    }

    /// Create a new write error for an output artifact
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new render error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Whether an LLM call that failed with this error should be attempted again.
    ///
    /// Malformed responses count as service errors for retry purposes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExtractionTimeout(_) | Self::ExtractionService(_) | Self::MalformedResponse(_)
        )
    }

    /// Whether this error aborts the whole run rather than one document.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorpusEmpty(_) | Self::IoWrite { .. } | Self::Config(_)
        )
    }

    /// Check if this is a corpus empty error
    pub fn is_corpus_empty(&self) -> bool {
        matches!(self, Self::CorpusEmpty(_))
    }

    /// Check if this is a malformed response error
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }
}
