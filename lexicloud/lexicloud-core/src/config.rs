//! Run configuration for lexicloud.
//!
//! A [`LexiConfig`] is built once at startup (defaults, then an optional TOML
//! file, then environment overrides, then command-line overrides), validated,
//! and shared read-only by every pipeline stage.
//!
//! # Example file
//!
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [keywords]
//! per_document_limit = 100
//! merge_mode = "sum"
//!
//! [llm]
//! api_type = "ollama"
//!
//! [llm.ollama]
//! api_base = "http://localhost:11434"
//! model = "qwen:7b-chat"
//!
//! [wordcloud]
//! font_path = "simsun.ttc"
//! ```

use crate::error::{LexiError, Result};
use crate::types::{ApiType, DocumentFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Environment variable names
pub const ENV_DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const ENV_DEEPSEEK_API_BASE: &str = "DEEPSEEK_API_BASE";
pub const ENV_OLLAMA_API_BASE: &str = "OLLAMA_API_BASE";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_LOG_LEVEL: &str = "LEXICLOUD_LOG_LEVEL";
pub const ENV_OUTPUT_DIR: &str = "LEXICLOUD_OUTPUT_DIR";
pub const ENV_FONT_PATH: &str = "LEXICLOUD_FONT_PATH";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiConfig {
    pub general: GeneralConfig,
    pub documents: DocumentsConfig,
    pub preprocess: PreprocessConfig,
    pub keywords: KeywordsConfig,
    pub llm: LlmConfig,
    pub wordcloud: WordCloudConfig,
    pub output: OutputConfig,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
    /// Optional log file written alongside stderr output
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Document discovery and loading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Extensions that are loaded; everything else is skipped silently
    pub supported_formats: Vec<DocumentFormat>,
    /// Walk subdirectories of the input directory
    pub recursive: bool,
    /// Documents with fewer cleaned characters than this carry no usable text
    pub min_text_length: usize,
    /// Stop-word files, one word per line
    pub stopword_files: Vec<PathBuf>,
    /// Directory whose `*.txt` files are all read as stop-word lists
    pub stopword_dir: Option<PathBuf>,
    /// Keywords that are never reported
    pub exclude_keywords_file: Option<PathBuf>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            supported_formats: DocumentFormat::ALL.to_vec(),
            recursive: true,
            min_text_length: 10,
            stopword_files: vec![PathBuf::from("stopwords.txt")],
            stopword_dir: None,
            exclude_keywords_file: Some(PathBuf::from("exclude_keywords.txt")),
        }
    }
}

/// Text cleaning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Keep only CJK ideographs, CJK punctuation, full-width forms and digits.
    /// On by default; turn it off to keep Latin-script terms.
    pub cjk_only: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { cjk_only: true }
    }
}

/// How per-document weights combine into one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Sum of weights across documents
    #[default]
    Sum,
    /// Number of documents whose keyword set contains the term
    DocumentFrequency,
}

/// Keyword extraction settings shared by both strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Maximum keywords kept per document
    pub per_document_limit: usize,
    /// Shortest term, in characters
    pub min_term_len: usize,
    /// Longest term, in characters
    pub max_term_len: usize,
    /// Minimum number of documents a term must occur in (TF-IDF)
    pub min_df: usize,
    /// Maximum fraction of documents a term may occur in (TF-IDF)
    pub max_df: f64,
    /// Vocabulary cap, most frequent terms first (TF-IDF)
    pub max_features: Option<usize>,
    pub merge_mode: MergeMode,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            per_document_limit: 100,
            min_term_len: 2,
            max_term_len: 4,
            min_df: 1,
            max_df: 1.0,
            max_features: Some(1000),
            merge_mode: MergeMode::Sum,
        }
    }
}

/// LLM extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_type: ApiType,
    pub deepseek: DeepSeekConfig,
    pub ollama: OllamaConfig,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts per document, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt
    pub backoff_initial_ms: u64,
    /// Upper bound for the backoff delay
    pub backoff_max_ms: u64,
    /// Cleaned text is cut to this many characters before it is sent
    pub max_input_chars: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_type: ApiType::DeepSeek,
            deepseek: DeepSeekConfig::default(),
            ollama: OllamaConfig::default(),
            timeout_secs: 60,
            max_attempts: 3,
            backoff_initial_ms: 1000,
            backoff_max_ms: 16_000,
            max_input_chars: Some(30_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSeekConfig {
    /// API key (can be set via DEEPSEEK_API_KEY env var)
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub api_base: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434".to_string(),
            model: "qwen:7b-chat".to_string(),
        }
    }
}

/// Word cloud style
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordCloudConfig {
    /// TrueType/OpenType font (or collection); must cover the keyword script
    pub font_path: PathBuf,
    /// Face index inside a font collection
    pub font_index: u32,
    pub width: u32,
    pub height: u32,
    /// Background color as `#rrggbb` or a named color
    pub background_color: String,
    /// Word colors, cycled at random
    pub palette: Vec<String>,
    pub max_words: usize,
    pub max_font_size: f32,
    pub min_font_size: f32,
    /// Amount the font shrinks when a word does not fit
    pub font_step: f32,
    /// Pixels kept free around every word
    pub margin: u32,
    /// Share of words drawn horizontally, 0.0..=1.0
    pub prefer_horizontal: f64,
    pub random_seed: u64,
    /// Mask image; white or transparent pixels stay empty
    pub mask_path: Option<PathBuf>,
}

impl Default for WordCloudConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("simsun.ttc"),
            font_index: 0,
            width: 1024,
            height: 768,
            background_color: "white".to_string(),
            palette: vec![
                "#1f77b4".to_string(),
                "#ff7f0e".to_string(),
                "#2ca02c".to_string(),
                "#d62728".to_string(),
                "#9467bd".to_string(),
                "#8c564b".to_string(),
                "#17becf".to_string(),
            ],
            max_words: 150,
            max_font_size: 120.0,
            min_font_size: 8.0,
            font_step: 2.0,
            margin: 2,
            prefer_horizontal: 0.7,
            random_seed: 42,
            mask_path: None,
        }
    }
}

/// Output artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

impl LexiConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LexiError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml(&content)?;
        config.merge_env_vars();
        config.validate()?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.merge_env_vars();
        config
    }

    /// Parse a TOML document; missing sections and keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LexiError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration atomically (temp file, then rename)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LexiError::io_write(parent, e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LexiError::config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| LexiError::io_write(&temp_path, e))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| LexiError::io_write(path, e))?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Merge environment variable overrides into the configuration
    pub fn merge_env_vars(&mut self) {
        if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", log_level);
            self.general.log_level = log_level;
        }

        if let Ok(api_key) = std::env::var(ENV_DEEPSEEK_API_KEY) {
            if !api_key.is_empty() {
                debug!("Using DeepSeek API key from environment");
                self.llm.deepseek.api_key = Some(api_key);
            }
        }

        if let Ok(api_base) = std::env::var(ENV_DEEPSEEK_API_BASE) {
            self.llm.deepseek.api_base = api_base;
        }

        if let Ok(api_base) = std::env::var(ENV_OLLAMA_API_BASE) {
            debug!("Overriding Ollama endpoint from environment: {}", api_base);
            self.llm.ollama.api_base = api_base;
        }

        if let Ok(model) = std::env::var(ENV_OLLAMA_MODEL) {
            self.llm.ollama.model = model;
        }

        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }

        if let Ok(font) = std::env::var(ENV_FONT_PATH) {
            self.wordcloud.font_path = PathBuf::from(font);
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(LexiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.documents.supported_formats.is_empty() {
            return Err(LexiError::config("supported_formats must not be empty"));
        }

        let kw = &self.keywords;
        if kw.per_document_limit == 0 {
            return Err(LexiError::config("per_document_limit must be greater than 0"));
        }
        if kw.min_term_len == 0 || kw.min_term_len > kw.max_term_len {
            return Err(LexiError::config(format!(
                "Invalid term length bounds {}..={}",
                kw.min_term_len, kw.max_term_len
            )));
        }
        if !(kw.max_df > 0.0 && kw.max_df <= 1.0) {
            return Err(LexiError::config("max_df must be in (0, 1]"));
        }
        if kw.max_features == Some(0) {
            return Err(LexiError::config("max_features must be greater than 0"));
        }

        if self.llm.max_attempts == 0 {
            return Err(LexiError::config("max_attempts must be greater than 0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(LexiError::config("timeout_secs must be greater than 0"));
        }
        if self.llm.max_input_chars == Some(0) {
            return Err(LexiError::config("max_input_chars must be greater than 0"));
        }

        let wc = &self.wordcloud;
        if wc.width == 0 || wc.height == 0 {
            return Err(LexiError::config("word cloud dimensions must be non-zero"));
        }
        if wc.max_words == 0 {
            return Err(LexiError::config("max_words must be greater than 0"));
        }
        if !(wc.min_font_size > 0.0 && wc.min_font_size <= wc.max_font_size) {
            return Err(LexiError::config(format!(
                "Invalid font size bounds {}..={}",
                wc.min_font_size, wc.max_font_size
            )));
        }
        if wc.font_step <= 0.0 {
            return Err(LexiError::config("font_step must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&wc.prefer_horizontal) {
            return Err(LexiError::config("prefer_horizontal must be in [0, 1]"));
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Fail early when the selected LLM service cannot be reached at all
    pub fn require_llm_credentials(&self) -> Result<()> {
        match self.llm.api_type {
            ApiType::DeepSeek => match &self.llm.deepseek.api_key {
                Some(key) if !key.trim().is_empty() => Ok(()),
                _ => Err(LexiError::config(format!(
                    "DeepSeek API key not configured (set {} or llm.deepseek.api_key)",
                    ENV_DEEPSEEK_API_KEY
                ))),
            },
            ApiType::Ollama => Ok(()),
        }
    }
}
