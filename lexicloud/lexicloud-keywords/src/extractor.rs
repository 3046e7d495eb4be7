//! The keyword extraction strategy interface.

use crate::llm::LlmExtractor;
use crate::tfidf::{TfidfConfig, TfidfModel};
use crate::transport::{transport_from_config, ChatTransport};
use async_trait::async_trait;
use lexicloud_core::config::LexiConfig;
use lexicloud_core::error::Result;
use lexicloud_core::types::{DocumentKeywordSet, ExtractionMethod};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Trait for keyword extraction strategies.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Extract at most `limit` keywords from one cleaned document text.
    async fn extract(&self, text: &str, limit: usize) -> Result<DocumentKeywordSet>;

    /// The strategy this extractor implements
    fn method(&self) -> ExtractionMethod;
}

/// Inputs shared by every strategy
pub struct ExtractorContext<'a> {
    pub config: &'a LexiConfig,
    /// Cleaned texts of every usable document in the run
    pub corpus: &'a [String],
    pub stopwords: Arc<HashSet<String>>,
    pub excluded: Arc<HashSet<String>>,
    /// Transport override for the LLM strategy; built from config when absent
    pub transport: Option<Arc<dyn ChatTransport>>,
}

/// Build the extractor for `method`.
///
/// The TF-IDF strategy is fitted on the whole corpus here; the LLM strategy
/// connects to the endpoint selected by `llm.api_type`.
pub fn build_extractor(
    method: ExtractionMethod,
    ctx: ExtractorContext<'_>,
) -> Result<Box<dyn KeywordExtractor>> {
    match method {
        ExtractionMethod::Tfidf => {
            let mut ignored: HashSet<String> = ctx.stopwords.iter().cloned().collect();
            ignored.extend(ctx.excluded.iter().cloned());

            let tfidf_config = TfidfConfig::from(&ctx.config.keywords);
            let model = TfidfModel::fit(ctx.corpus, &tfidf_config, Arc::new(ignored))?;
            info!(
                "Fitted TF-IDF model: {} documents, {} terms",
                model.document_count(),
                model.vocabulary().len()
            );
            Ok(Box::new(model))
        }
        ExtractionMethod::Llm => {
            let transport = match ctx.transport {
                Some(transport) => transport,
                None => {
                    ctx.config.require_llm_credentials()?;
                    transport_from_config(&ctx.config.llm)?
                }
            };
            info!("Using {} for LLM keyword extraction", ctx.config.llm.api_type);
            Ok(Box::new(LlmExtractor::from_config(
                transport,
                &ctx.config.llm,
                &ctx.excluded,
            )))
        }
    }
}
