//! The end-to-end run: load, extract, aggregate, render and report.
//!
//! Documents are processed one after another. A document that cannot be
//! parsed, has too little text, or whose extraction fails is recorded in the
//! [`RunReport`] and skipped; only an empty corpus or an unusable
//! configuration (including credentials the LLM endpoint rejects) stops the
//! run. Each output artifact is attempted on its own,
//! so a failure writing one does not prevent the other.

use indicatif::ProgressBar;
use lexicloud_core::config::LexiConfig;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::{DocumentKeywordSet, ExtractionMethod};
use lexicloud_ingestion::{load_excluded_keywords, load_stopwords, DocumentLoader, TextPreprocessor};
use lexicloud_keywords::{build_extractor, Aggregator, ChatTransport, ExtractorContext, KeywordExtractor};
use lexicloud_render::{ReportWriter, WordCloudRenderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of writing one output file
#[derive(Debug)]
pub struct ArtifactOutcome {
    pub path: PathBuf,
    /// Words drawn for the image, keyword rows for the report
    pub result: Result<usize>,
}

impl ArtifactOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened during one run
#[derive(Debug)]
pub struct RunReport {
    pub method: ExtractionMethod,
    pub documents_found: usize,
    /// Documents whose text was extracted
    pub documents_loaded: usize,
    /// Documents that could not be parsed, with the reason
    pub parse_failures: Vec<(String, String)>,
    /// Documents parsed but below the minimum text length
    pub unusable: Vec<String>,
    /// Documents whose keyword extraction returned an error
    pub extraction_failures: Vec<(String, String)>,
    /// Documents that ended up with no keywords
    pub without_keywords: Vec<String>,
    pub keyword_sets: Vec<(String, DocumentKeywordSet)>,
    pub distinct_terms: usize,
    pub image: ArtifactOutcome,
    pub report: ArtifactOutcome,
}

impl RunReport {
    /// "N of M documents failed to parse", when any did
    pub fn failure_summary(&self) -> Option<String> {
        if self.parse_failures.is_empty() {
            None
        } else {
            Some(format!(
                "{} of {} documents failed to parse",
                self.parse_failures.len(),
                self.documents_found
            ))
        }
    }

    pub fn is_success(&self) -> bool {
        self.image.is_ok() && self.report.is_ok()
    }

    /// The first artifact error, if any
    pub fn into_error(self) -> Option<LexiError> {
        self.image.result.err().or(self.report.result.err())
    }
}

/// Output file names for a method
pub fn artifact_paths(output_dir: &Path, method: ExtractionMethod) -> (PathBuf, PathBuf) {
    (
        output_dir.join(format!("wordcloud_{}.png", method)),
        output_dir.join(format!("document_keywords_{}.csv", method)),
    )
}

/// A configured run over one document directory
pub struct Pipeline {
    config: LexiConfig,
    method: ExtractionMethod,
    transport: Option<Arc<dyn ChatTransport>>,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    pub fn new(config: LexiConfig, method: ExtractionMethod) -> Self {
        Self {
            config,
            method,
            transport: None,
            progress: None,
        }
    }

    /// Use this transport for the LLM strategy instead of the configured endpoint
    pub fn with_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Advance `bar` once per document during extraction
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn config(&self) -> &LexiConfig {
        &self.config
    }

    /// Run over `docs_dir`.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be read, when no document has usable
    /// text or no keyword survives, or when the extractor cannot be built.
    /// Artifact errors are recorded in the returned report instead.
    pub async fn run(&self, docs_dir: &Path) -> Result<RunReport> {
        let config = &self.config;

        let loader = DocumentLoader::new(&config.documents);
        let documents = loader.load(docs_dir).await?;
        let documents_found = documents.len();
        info!("Found {} documents in {}", documents_found, docs_dir.display());

        let mut parse_failures = Vec::new();
        let mut unusable = Vec::new();
        let mut usable: Vec<(String, String)> = Vec::new();
        let preprocessor = TextPreprocessor::new(&config.preprocess);

        for document in &documents {
            let name = document.identifier();
            if let Some(reason) = document.failure_reason() {
                parse_failures.push((name, reason.to_string()));
                continue;
            }
            let cleaned = preprocessor.clean(&document.text);
            if cleaned.chars().count() < config.documents.min_text_length {
                warn!("{} has no usable text", document.path.display());
                unusable.push(name);
                continue;
            }
            usable.push((name, cleaned));
        }
        let documents_loaded = documents_found - parse_failures.len();

        if usable.is_empty() {
            return Err(LexiError::corpus_empty(format!(
                "0 of {} documents produced usable text",
                documents_found
            )));
        }

        let stopwords = Arc::new(load_stopwords(&config.documents).await);
        let excluded = Arc::new(load_excluded_keywords(&config.documents).await);
        info!(
            "Loaded {} stop words and {} excluded keywords",
            stopwords.len(),
            excluded.len()
        );

        let corpus: Vec<String> = usable.iter().map(|(_, text)| text.clone()).collect();
        let extractor = build_extractor(
            self.method,
            ExtractorContext {
                config,
                corpus: &corpus,
                stopwords,
                excluded: excluded.clone(),
                transport: self.transport.clone(),
            },
        )?;

        let truncating = TextPreprocessor::new(&config.preprocess).with_max_chars(config.llm.max_input_chars);
        let limit = config.keywords.per_document_limit;

        if let Some(bar) = &self.progress {
            bar.set_length(usable.len() as u64);
        }

        let mut extraction_failures = Vec::new();
        let mut without_keywords = Vec::new();
        let mut keyword_sets = Vec::with_capacity(usable.len());

        for (name, text) in &usable {
            if let Some(bar) = &self.progress {
                bar.set_message(name.clone());
            }

            let input = match self.method {
                ExtractionMethod::Llm => truncating.clean_truncated(text),
                ExtractionMethod::Tfidf => text.clone(),
            };

            let set = match extractor.extract(&input, limit).await {
                Ok(set) => set.without(&excluded),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Keyword extraction failed for {}: {}", name, e);
                    extraction_failures.push((name.clone(), e.to_string()));
                    DocumentKeywordSet::empty()
                }
            };

            if set.is_empty() {
                without_keywords.push(name.clone());
            }
            keyword_sets.push((name.clone(), set));

            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        let aggregator = Aggregator::new(config.keywords.merge_mode);
        let weights = aggregator.aggregate(keyword_sets.iter().map(|(_, s)| s));
        if weights.ranked().is_empty() {
            return Err(LexiError::corpus_empty(format!(
                "no keywords extracted from {} documents",
                usable.len()
            )));
        }
        info!(
            "Aggregated {} distinct keywords ({:?} merge)",
            weights.len(),
            aggregator.mode()
        );

        let (image_path, report_path) = artifact_paths(&config.output.dir, self.method);

        let image_result = WordCloudRenderer::new(&config.wordcloud)
            .and_then(|renderer| renderer.render_to_file(&weights, &image_path));
        if let Err(e) = &image_result {
            warn!("Word cloud not written: {}", e);
        }

        let report_result = ReportWriter::new().write(&keyword_sets, &report_path);
        if let Err(e) = &report_result {
            warn!("Keyword report not written: {}", e);
        }

        Ok(RunReport {
            method: self.method,
            documents_found,
            documents_loaded,
            parse_failures,
            unusable,
            extraction_failures,
            without_keywords,
            keyword_sets,
            distinct_terms: weights.len(),
            image: ArtifactOutcome {
                path: image_path,
                result: image_result,
            },
            report: ArtifactOutcome {
                path: report_path,
                result: report_result,
            },
        })
    }
}
