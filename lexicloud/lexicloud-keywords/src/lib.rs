//! Keyword extraction strategies and aggregation for lexicloud.
//!
//! Two interchangeable [`KeywordExtractor`] implementations are provided: a
//! corpus-wide TF-IDF model and a chat-model extractor with pluggable
//! transports. The [`Aggregator`] merges their per-document results.

pub mod aggregate;
pub mod extractor;
pub mod llm;
pub mod tfidf;
pub mod transport;

pub use aggregate::{AggregatedWeights, Aggregator};
pub use extractor::{build_extractor, ExtractorContext, KeywordExtractor};
pub use llm::{parse_keyword_response, LlmExtractor, RetryPolicy};
pub use tfidf::{TfidfConfig, TfidfModel};
pub use transport::{
    transport_from_config, ChatMessage, ChatRole, ChatTransport, DeepSeekTransport, OllamaTransport,
};
