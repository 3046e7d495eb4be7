//! Directory enumeration and per-file loading.

use crate::parsers::ParserRegistry;
use ignore::WalkBuilder;
use lexicloud_core::config::DocumentsConfig;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::{Document, DocumentFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A file selected for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

/// Loads every supported document below a directory
pub struct DocumentLoader {
    registry: Arc<ParserRegistry>,
    formats: HashSet<DocumentFormat>,
    recursive: bool,
}

impl DocumentLoader {
    /// Create a loader with the default parsers
    pub fn new(config: &DocumentsConfig) -> Self {
        Self {
            registry: Arc::new(ParserRegistry::new()),
            formats: config.supported_formats.iter().copied().collect(),
            recursive: config.recursive,
        }
    }

    /// Use a custom parser registry
    pub fn with_registry(mut self, registry: Arc<ParserRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Enumerate supported files in filesystem order.
    ///
    /// Files with other extensions are skipped silently.
    pub fn discover(&self, dir: &Path) -> Result<Vec<DiscoveredFile>> {
        if !dir.is_dir() {
            return Err(LexiError::config(format!(
                "Document directory not found: {}",
                dir.display()
            )));
        }

        let mut builder = WalkBuilder::new(dir);
        builder
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false);
        if !self.recursive {
            builder.max_depth(Some(1));
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error under {}: {}", dir.display(), e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match DocumentFormat::from_path(entry.path()) {
                Some(format) if self.formats.contains(&format) => files.push(DiscoveredFile {
                    path: entry.into_path(),
                    format,
                }),
                _ => debug!("Skipping unsupported file {}", entry.path().display()),
            }
        }

        info!("Found {} documents in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Load one file. Parse errors are recorded on the returned document.
    pub async fn load_file(&self, file: &DiscoveredFile) -> Document {
        let registry = Arc::clone(&self.registry);
        let path = file.path.clone();
        let format = file.format;

        let outcome = tokio::task::spawn_blocking(move || registry.parse_file(&path, format)).await;

        match outcome {
            Ok(Ok(text)) => {
                debug!("Loaded {} ({} chars)", file.path.display(), text.chars().count());
                Document::loaded(&file.path, format, text)
            }
            Ok(Err(e)) => {
                let reason = match e {
                    LexiError::ParseFailure { reason, .. } => reason,
                    other => other.to_string(),
                };
                warn!("Failed to parse {}: {}", file.path.display(), reason);
                Document::failed(&file.path, format, reason)
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "Parser panicked".to_string()
                } else {
                    format!("Parser task failed: {}", join_err)
                };
                warn!("Failed to parse {}: {}", file.path.display(), reason);
                Document::failed(&file.path, format, reason)
            }
        }
    }

    /// Load every supported document below `dir`, one after another
    pub async fn load(&self, dir: &Path) -> Result<Vec<Document>> {
        let files = self.discover(dir)?;
        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            documents.push(self.load_file(file).await);
        }
        Ok(documents)
    }
}
