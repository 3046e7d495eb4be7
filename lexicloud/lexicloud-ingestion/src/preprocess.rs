//! Text cleaning and tokenization.
//!
//! [`TextPreprocessor`] turns raw extracted text into the cleaned text every
//! extractor consumes. [`Tokenizer`] splits cleaned text into candidate terms
//! for the statistical extractor.

use lexicloud_core::config::PreprocessConfig;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use unicode_segmentation::UnicodeSegmentation;

/// Anything that is not a CJK ideograph, CJK punctuation, a full-width form or a digit.
static NON_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\u{4e00}-\u{9fa5}\u{3000}-\u{303f}\u{ff00}-\u{ffef}0-9]+")
        .expect("CJK filter pattern is valid")
});

/// Deterministic text cleaner applied before extraction.
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    cjk_only: bool,
    max_chars: Option<usize>,
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new(&PreprocessConfig::default())
    }
}

impl TextPreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            cjk_only: config.cjk_only,
            max_chars: None,
        }
    }

    /// Limit the output of [`TextPreprocessor::clean_truncated`]
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Strip control characters, optionally keep only CJK text, and collapse
    /// whitespace runs to single spaces.
    pub fn clean(&self, raw: &str) -> String {
        let stripped: String = raw
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();

        let filtered = if self.cjk_only {
            NON_CJK.replace_all(&stripped, " ").into_owned()
        } else {
            stripped
        };

        collapse_whitespace(&filtered)
    }

    /// [`TextPreprocessor::clean`] followed by truncation to the configured
    /// character budget. Used for text sent to a remote model.
    pub fn clean_truncated(&self, raw: &str) -> String {
        let cleaned = self.clean(raw);
        match self.max_chars {
            Some(max) => truncate_chars(&cleaned, max).to_string(),
            None => cleaned,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Cut `text` to at most `max_chars` characters, on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Whether `c` is a CJK unified ideograph (basic block and extension A).
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}

/// Splits cleaned text into candidate terms.
///
/// Runs of CJK ideographs are kept whole when their length is within the
/// configured bounds and split into overlapping bigrams when longer. Other
/// words are lowercased and kept when at least `min_len` characters long.
/// Purely numeric tokens and stop words are dropped.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_len: usize,
    max_len: usize,
    stopwords: Arc<HashSet<String>>,
}

impl Tokenizer {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            min_len: min_len.max(1),
            max_len: max_len.max(min_len.max(1)),
            stopwords: Arc::new(HashSet::new()),
        }
    }

    pub fn with_stopwords(mut self, stopwords: Arc<HashSet<String>>) -> Self {
        self.stopwords = stopwords;
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut cjk_run = String::new();

        for segment in text.split_word_bounds() {
            if segment.chars().all(is_cjk_ideograph) {
                cjk_run.push_str(segment);
                continue;
            }

            self.flush_cjk_run(&mut cjk_run, &mut tokens);

            if !segment.chars().any(char::is_alphanumeric) {
                continue;
            }
            if segment.chars().all(|c| c.is_numeric()) {
                continue;
            }
            let word = segment.to_lowercase();
            if word.chars().count() >= self.min_len {
                self.push(word, &mut tokens);
            }
        }

        self.flush_cjk_run(&mut cjk_run, &mut tokens);
        tokens
    }

    fn flush_cjk_run(&self, run: &mut String, tokens: &mut Vec<String>) {
        if run.is_empty() {
            return;
        }

        let chars: Vec<char> = run.chars().collect();
        let len = chars.len();
        if len >= self.min_len && len <= self.max_len {
            self.push(std::mem::take(run), tokens);
            return;
        }

        if len > self.max_len && self.min_len <= 2 && self.max_len >= 2 {
            for pair in chars.windows(2) {
                self.push(pair.iter().collect(), tokens);
            }
        }
        run.clear();
    }

    fn push(&self, token: String, tokens: &mut Vec<String>) {
        if !self.stopwords.contains(&token) {
            tokens.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clean_collapses_whitespace_and_controls() {
        let pre = TextPreprocessor::new(&PreprocessConfig { cjk_only: false });
        assert_eq!(pre.clean("  a\t\tb\n\nc\u{0007}d  "), "a b c d");
        assert_eq!(pre.clean(""), "");
    }

    #[test]
    fn test_cjk_only_filter_is_the_default() {
        let pre = TextPreprocessor::default();
        assert_eq!(pre.clean("Hello 经济发展, 2023年！"), "经济发展 2023年！");
        assert_eq!(pre.clean("Section 3.2: 绿色\u{0007}转型"), "3 2 绿色 转型");

        let pre = TextPreprocessor::new(&PreprocessConfig { cjk_only: false });
        assert_eq!(pre.clean("Hello 经济发展"), "Hello 经济发展");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("经济发展规划", 3), "经济发");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let pre = TextPreprocessor::default().with_max_chars(Some(4));
        assert_eq!(pre.clean_truncated("  系统  设计 方案 "), "系统 设");
    }

    #[test]
    fn test_tokenize_cjk_runs() {
        let tokenizer = Tokenizer::new(2, 4);
        assert_eq!(tokenizer.tokenize("系统 设计"), vec!["系统", "设计"]);
        // single ideographs are below the minimum length
        assert!(tokenizer.tokenize("的 了").is_empty());
        // long runs become bigrams
        assert_eq!(
            tokenizer.tokenize("数字经济发展"),
            vec!["数字", "字经", "经济", "济发", "发展"]
        );
    }

    #[test]
    fn test_tokenize_mixed_text() {
        let tokenizer = Tokenizer::new(2, 4);
        let tokens = tokenizer.tokenize("Rust 系统 in 2024, a Memory-safe language");
        assert_eq!(
            tokens,
            vec!["rust", "系统", "in", "memory", "safe", "language"]
        );
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let stop: HashSet<String> = ["我们".to_string(), "the".to_string()].into_iter().collect();
        let tokenizer = Tokenizer::new(2, 4).with_stopwords(Arc::new(stop));
        assert_eq!(tokenizer.tokenize("我们 the 目标"), vec!["目标"]);
    }

    proptest! {
        #[test]
        fn test_clean_is_deterministic_and_stable(raw in "\\PC{0,64}") {
            let pre = TextPreprocessor::default();
            let once = pre.clean(&raw);
            prop_assert_eq!(pre.clean(&raw), once.clone());
            prop_assert_eq!(pre.clean(&once), once);
        }
    }
}
