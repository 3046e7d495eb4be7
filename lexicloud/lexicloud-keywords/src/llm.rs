//! Keyword extraction with a chat model.
//!
//! Each document is sent on its own. The model is asked for a JSON array of
//! `{"keyword", "weight"}` objects. A reply that cannot be read is answered
//! with a correction turn on the next attempt. Transport errors and malformed
//! replies are retried with exponential backoff; when every attempt fails the
//! document gets an empty keyword set.

use crate::extractor::KeywordExtractor;
use crate::transport::{ChatMessage, ChatTransport};
use async_trait::async_trait;
use lexicloud_core::config::LlmConfig;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::{DocumentKeywordSet, ExtractionMethod, KeywordEntry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CORRECTION_PROMPT: &str = r#"你的上一次回复格式不正确。请严格按照以下JSON格式返回结果，不要添加任何解释：
[
  {"keyword": "关键词1", "weight": 0.9},
  {"keyword": "关键词2", "weight": 0.5}
]"#;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_initial_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Delay after the given failed attempt (1-based): `initial * 2^(attempt-1)`, capped
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// LLM-backed keyword extractor
pub struct LlmExtractor {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
    excluded: Vec<String>,
}

impl LlmExtractor {
    pub fn new(transport: Arc<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            excluded: Vec::new(),
        }
    }

    pub fn from_config(
        transport: Arc<dyn ChatTransport>,
        config: &LlmConfig,
        excluded: &HashSet<String>,
    ) -> Self {
        Self::new(transport, RetryPolicy::from_config(config)).with_excluded(excluded)
    }

    /// Keywords the model is told to leave out
    pub fn with_excluded(mut self, excluded: &HashSet<String>) -> Self {
        let mut words: Vec<String> = excluded.iter().cloned().collect();
        words.sort();
        self.excluded = words;
        self
    }

    /// Instructions sent as the system message
    pub fn system_prompt(&self, limit: usize) -> String {
        let excluded = if self.excluded.is_empty() {
            "（无）".to_string()
        } else {
            self.excluded.join("，")
        };

        format!(
            r#"你是一位专业的文本分析专家，请从用户提供的文本中提取最重要的关键词，用于生成词云图。

## 任务要求
1. 提取最具代表性和重要性的关键词
2. 排除无实际意义的虚词、介词、连词等停用词
3. 综合考虑词频和语义重要性
4. 不要返回需要排除的关键词

## 需要排除的关键词
{excluded}

## 输出格式
严格按照以下JSON数组格式返回，最多{limit}个元素：
[
  {{"keyword": "关键词1", "weight": 0.7}},
  {{"keyword": "关键词2", "weight": 0.5}}
]

## 权重规则
- 权重范围为0到1，1表示最重要
- 通用词、常见动词和形容词的权重应适当降低

请直接返回JSON结果，不要添加任何解释或其他文本。"#
        )
    }
}

/// Parse a model reply into keyword entries.
///
/// The JSON array between the first `[` and the last `]` is read. Every item
/// must carry a string `keyword` and a numeric `weight` in `[0, 1]`; any
/// violation rejects the whole reply.
pub fn parse_keyword_response(reply: &str) -> Result<Vec<KeywordEntry>> {
    let (start, end) = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(LexiError::malformed("reply contains no JSON array")),
    };

    let items: Vec<Value> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| LexiError::malformed(format!("invalid JSON array: {}", e)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let keyword = item
                .get("keyword")
                .and_then(Value::as_str)
                .ok_or_else(|| LexiError::malformed(format!("item {} has no string keyword", i)))?;
            let weight = item
                .get("weight")
                .and_then(Value::as_f64)
                .ok_or_else(|| LexiError::malformed(format!("item {} has no numeric weight", i)))?;
            if !(0.0..=1.0).contains(&weight) {
                return Err(LexiError::malformed(format!(
                    "item {} weight {} outside [0, 1]",
                    i, weight
                )));
            }
            Ok(KeywordEntry::new(keyword, weight))
        })
        .collect()
}

#[async_trait]
impl KeywordExtractor for LlmExtractor {
    async fn extract(&self, text: &str, limit: usize) -> Result<DocumentKeywordSet> {
        if text.trim().is_empty() {
            return Ok(DocumentKeywordSet::empty());
        }

        let mut messages = vec![
            ChatMessage::system(self.system_prompt(limit)),
            ChatMessage::user(text),
        ];
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            match self.transport.complete(&messages).await {
                Ok(reply) => match parse_keyword_response(&reply) {
                    Ok(entries) => {
                        debug!("Attempt {} returned {} keywords", attempt, entries.len());
                        return Ok(DocumentKeywordSet::new(entries, limit));
                    }
                    Err(e) => {
                        warn!("Attempt {}/{}: {}", attempt, max_attempts, e);
                        messages.push(ChatMessage::assistant(reply));
                        messages.push(ChatMessage::user(CORRECTION_PROMPT));
                    }
                },
                Err(e) if e.is_retryable() => {
                    warn!("Attempt {}/{}: {}", attempt, max_attempts, e);
                }
                Err(e) => return Err(e),
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff_after(attempt);
                info!("Retrying keyword extraction in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            "Keyword extraction failed after {} attempts, using empty result",
            max_attempts
        );
        Ok(DocumentKeywordSet::empty())
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Llm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        pub Transport {}

        #[async_trait]
        impl ChatTransport for Transport {
            async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
        }
    }

    fn instant() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_parse_plain_array() {
        let entries = parse_keyword_response(
            r#"[{"keyword": "经济发展", "weight": 0.95}, {"keyword": "科技创新", "weight": 0.88}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].term, "经济发展");
        assert_eq!(entries[1].weight, 0.88);
    }

    #[test]
    fn test_parse_array_inside_prose_and_fences() {
        let reply = "好的，结果如下：\n```json\n[{\"keyword\": \"创新\", \"weight\": 1}]\n```\n";
        let entries = parse_keyword_response(reply).unwrap();
        assert_eq!(entries, vec![KeywordEntry::new("创新", 1.0)]);
    }

    #[test]
    fn test_parse_rejects_invalid_items() {
        let cases = [
            "no array here",
            "] backwards [",
            r#"[{"keyword": "a"}]"#,
            r#"[{"keyword": 3, "weight": 0.5}]"#,
            r#"[{"keyword": "a", "weight": "high"}]"#,
            r#"[{"keyword": "a", "weight": 1.2}]"#,
            r#"[{"keyword": "a", "weight": -0.1}]"#,
            r#"["a", "b"]"#,
        ];
        for case in cases {
            let err = parse_keyword_response(case).unwrap_err();
            assert!(err.is_malformed(), "{} should be malformed", case);
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_after(40), Duration::from_millis(350));
    }

    #[test]
    fn test_prompt_lists_excluded_and_limit() {
        let transport = Arc::new(MockTransport::new());
        let excluded: HashSet<String> = ["测试".to_string(), "附件".to_string()].into_iter().collect();
        let extractor = LlmExtractor::new(transport, instant()).with_excluded(&excluded);
        let prompt = extractor.system_prompt(25);
        assert!(prompt.contains("测试，附件"));
        assert!(prompt.contains("最多25个"));
    }

    #[tokio::test]
    async fn test_valid_reply_first_attempt() {
        let mut transport = MockTransport::new();
        transport
            .expect_complete()
            .withf(|messages| messages.len() == 2 && messages[1].content == "文本")
            .times(1)
            .returning(|_| {
                Ok(r#"[{"keyword":"b","weight":0.2},{"keyword":"a","weight":0.9},{"keyword":"c","weight":0.5}]"#.to_string())
            });

        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        let set = extractor.extract("文本", 2).await.unwrap();
        let terms: Vec<_> = set.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_three_times_degrades_to_empty() {
        let mut transport = MockTransport::new();
        transport
            .expect_complete()
            .times(3)
            .returning(|_| Ok("I cannot help with that".to_string()));

        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        let set = extractor.extract("文本内容", 10).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_correction_turn_appended_after_malformed_reply() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_complete().times(2).returning(move |messages| {
            recorder.lock().unwrap().push(messages.to_vec());
            calls += 1;
            if calls == 1 {
                Ok("not json".to_string())
            } else {
                Ok(r#"[{"keyword":"发展","weight":0.8}]"#.to_string())
            }
        });

        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        let set = extractor.extract("文本", 10).await.unwrap();
        assert_eq!(set.weight_of("发展"), Some(0.8));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][2], ChatMessage::assistant("not json"));
        assert_eq!(seen[1][3].content, CORRECTION_PROMPT);
    }

    #[tokio::test]
    async fn test_timeouts_retried_then_success() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_complete().times(3).returning(move |_| {
            calls += 1;
            match calls {
                1 => Err(LexiError::timeout("60s elapsed")),
                2 => Err(LexiError::service("502 Bad Gateway")),
                _ => Ok(r#"[{"keyword":"系统","weight":0.6}]"#.to_string()),
            }
        });

        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        let set = extractor.extract("文本", 10).await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_complete()
            .times(1)
            .returning(|_| Err(LexiError::config("no key")));

        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        assert!(extractor.extract("文本", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_text_skips_transport() {
        let transport = MockTransport::new();
        let extractor = LlmExtractor::new(Arc::new(transport), instant());
        assert!(extractor.extract("   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let mut transport = MockTransport::new();
        transport
            .expect_complete()
            .times(3)
            .returning(|_| Err(LexiError::service("down")));

        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));
        let extractor = LlmExtractor::new(Arc::new(transport), policy);

        let started = tokio::time::Instant::now();
        let set = extractor.extract("文本", 10).await.unwrap();
        assert!(set.is_empty());
        // 1s after the first failure, 2s after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }
}
