//! TF-IDF keyword scoring over the loaded corpus.
//!
//! The vocabulary is built from every cleaned document in the run, in first
//! occurrence order. A document's score for a term is
//!
//! ```text
//! tf(t, d)  = count(t, d) / tokens(d)
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1
//! score     = tf * idf
//! ```
//!
//! so a term found in every document has an idf of exactly 1. Equal scores
//! are ordered by vocabulary position, which makes extraction deterministic.

use crate::extractor::KeywordExtractor;
use async_trait::async_trait;
use lexicloud_core::config::KeywordsConfig;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::{DocumentKeywordSet, ExtractionMethod, KeywordEntry};
use lexicloud_ingestion::Tokenizer;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Vocabulary and term-length controls
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfConfig {
    pub min_term_len: usize,
    pub max_term_len: usize,
    /// Minimum number of documents containing a term
    pub min_df: usize,
    /// Maximum fraction of documents containing a term
    pub max_df: f64,
    /// Keep only the most frequent terms
    pub max_features: Option<usize>,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self::from(&KeywordsConfig::default())
    }
}

impl From<&KeywordsConfig> for TfidfConfig {
    fn from(config: &KeywordsConfig) -> Self {
        Self {
            min_term_len: config.min_term_len,
            max_term_len: config.max_term_len,
            min_df: config.min_df,
            max_df: config.max_df,
            max_features: config.max_features,
        }
    }
}

/// A TF-IDF model fitted on one corpus
#[derive(Debug, Clone)]
pub struct TfidfModel {
    tokenizer: Tokenizer,
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
    document_count: usize,
}

/// Per-term statistics gathered while fitting
struct TermStats {
    first_seen: usize,
    df: usize,
    total: usize,
}

impl TfidfModel {
    /// Fit the vocabulary and idf weights on `corpus`.
    ///
    /// Fails with [`LexiError::CorpusEmpty`] when no term survives the
    /// vocabulary filters.
    pub fn fit<S: AsRef<str>>(
        corpus: &[S],
        config: &TfidfConfig,
        stopwords: Arc<HashSet<String>>,
    ) -> Result<Self> {
        let tokenizer =
            Tokenizer::new(config.min_term_len, config.max_term_len).with_stopwords(stopwords);
        let document_count = corpus.len();

        let mut stats: HashMap<String, TermStats> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for text in corpus {
            let mut seen_here = HashSet::new();
            for token in tokenizer.tokenize(text.as_ref()) {
                let entry = stats.entry(token.clone()).or_insert_with(|| {
                    order.push(token.clone());
                    TermStats {
                        first_seen: order.len() - 1,
                        df: 0,
                        total: 0,
                    }
                });
                entry.total += 1;
                if seen_here.insert(token) {
                    entry.df += 1;
                }
            }
        }

        let max_df_count = config.max_df * document_count as f64;
        let mut kept: Vec<&String> = order
            .iter()
            .filter(|term| {
                let s = &stats[*term];
                s.df >= config.min_df && s.df as f64 <= max_df_count
            })
            .collect();

        if let Some(max_features) = config.max_features {
            if kept.len() > max_features {
                kept.sort_by(|a, b| {
                    let (sa, sb) = (&stats[*a], &stats[*b]);
                    sb.total.cmp(&sa.total).then(sa.first_seen.cmp(&sb.first_seen))
                });
                kept.truncate(max_features);
                kept.sort_by_key(|term| stats[*term].first_seen);
            }
        }

        if kept.is_empty() {
            return Err(LexiError::corpus_empty(format!(
                "no terms left after filtering {} documents",
                document_count
            )));
        }

        let n = document_count as f64;
        let vocabulary: Vec<String> = kept.into_iter().cloned().collect();
        let idf = vocabulary
            .iter()
            .map(|term| ((1.0 + n) / (1.0 + stats[term].df as f64)).ln() + 1.0)
            .collect();
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        debug!(
            "TF-IDF vocabulary: {} of {} distinct terms kept",
            vocabulary.len(),
            order.len()
        );

        Ok(Self {
            tokenizer,
            vocabulary,
            index,
            idf,
            document_count,
        })
    }

    /// Terms in vocabulary order
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.index.get(term).map(|&i| self.idf[i])
    }

    /// Scores of every vocabulary term in `text`, best first, ties by vocabulary position
    pub fn score(&self, text: &str) -> Vec<(&str, f64)> {
        let tokens = self.tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for token in &tokens {
            if let Some(&i) = self.index.get(token) {
                *counts.entry(i).or_default() += 1;
            }
        }

        let total = tokens.len() as f64;
        let mut scored: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(i, count)| (i, count as f64 / total * self.idf[i]))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .map(|(i, score)| (self.vocabulary[i].as_str(), score))
            .collect()
    }

    /// The `limit` best terms of `text`
    pub fn top_terms(&self, text: &str, limit: usize) -> DocumentKeywordSet {
        let entries = self
            .score(text)
            .into_iter()
            .take(limit)
            .map(|(term, score)| KeywordEntry::new(term, score));
        DocumentKeywordSet::new(entries, limit)
    }
}

#[async_trait]
impl KeywordExtractor for TfidfModel {
    async fn extract(&self, text: &str, limit: usize) -> Result<DocumentKeywordSet> {
        Ok(self.top_terms(text, limit))
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Tfidf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fit(corpus: &[&str]) -> TfidfModel {
        TfidfModel::fit(corpus, &TfidfConfig::default(), Arc::new(HashSet::new())).unwrap()
    }

    #[test]
    fn test_idf_values() {
        let model = fit(&["系统 设计", "系统 测试", "系统 部署"]);
        assert_relative_eq!(model.idf("系统").unwrap(), 1.0);
        assert_relative_eq!(model.idf("设计").unwrap(), (4.0f64 / 2.0).ln() + 1.0);
        assert_eq!(model.idf("缺失"), None);
    }

    #[test]
    fn test_vocabulary_in_first_occurrence_order() {
        let model = fit(&["乙乙 甲甲", "丙丙 甲甲"]);
        assert_eq!(model.vocabulary(), &["乙乙", "甲甲", "丙丙"]);
    }

    #[test]
    fn test_ties_broken_by_vocabulary_order() {
        let model = fit(&["北京 上海 广州", "深圳"]);
        let set = model.top_terms("广州 上海 北京", 3);
        let terms: Vec<_> = set.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["北京", "上海", "广州"]);
    }

    #[test]
    fn test_document_frequency_bounds() {
        let corpus = ["系统 设计", "系统 测试", "系统 部署", "系统 设计"];
        let config = TfidfConfig {
            min_df: 2,
            max_df: 0.8,
            ..TfidfConfig::default()
        };
        let model = TfidfModel::fit(&corpus, &config, Arc::new(HashSet::new())).unwrap();
        assert_eq!(model.vocabulary(), &["设计"]);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let corpus = ["甲甲 乙乙 乙乙 丙丙 丙丙 丙丙", "丁丁 乙乙"];
        let config = TfidfConfig {
            max_features: Some(2),
            ..TfidfConfig::default()
        };
        let model = TfidfModel::fit(&corpus, &config, Arc::new(HashSet::new())).unwrap();
        assert_eq!(model.vocabulary(), &["乙乙", "丙丙"]);
    }

    #[test]
    fn test_stopwords_excluded_from_vocabulary() {
        let stop: HashSet<String> = ["我们".to_string()].into_iter().collect();
        let model =
            TfidfModel::fit(&["我们 系统", "我们 设计"], &TfidfConfig::default(), Arc::new(stop)).unwrap();
        assert!(model.idf("我们").is_none());
    }

    #[test]
    fn test_empty_corpus_is_corpus_empty() {
        let result = TfidfModel::fit(&["的 了", ""], &TfidfConfig::default(), Arc::new(HashSet::new()));
        assert!(result.unwrap_err().is_corpus_empty());
    }

    #[test]
    fn test_text_without_known_terms_scores_nothing() {
        let model = fit(&["系统 设计"]);
        assert!(model.top_terms("完全 无关", 10).is_empty());
        assert!(model.top_terms("", 10).is_empty());
    }
}
