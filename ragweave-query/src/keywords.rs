//! C4: KeywordExtractor — LLM-backed {high-level, low-level} keyword
//! extraction with tiered L1 (in-memory)/L2 (persistent) caching.

use once_cell::sync::Lazy;
use ragweave_core::{sha256_hex, CacheType, KeywordExtractionConfig, KeywordResult, ProjectId, RagResult};
use ragweave_llm::{LlmProvider, OperationType};
use ragweave_storage::{ExtractionCacheStorage, TtlCache};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

pub const KEYWORD_EXTRACTION_SYSTEM_PROMPT: &str = "You extract search keywords from a user query. \
Respond with exactly two lines:\nHIGH_LEVEL_KEYWORDS: k1, k2, k3\nLOW_LEVEL_KEYWORDS: e1, e2, e3\n\
High-level keywords are thematic or relational terms; low-level keywords are specific entity names. \
If a section has no keywords, write `none` for that section.";

static HIGH_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*HIGH_LEVEL_KEYWORDS:\s*(.*)$").expect("valid regex"));
static LOW_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*LOW_LEVEL_KEYWORDS:\s*(.*)$").expect("valid regex"));

fn parse_keyword_line(re: &Regex, response: &str) -> Vec<String> {
    let Some(captures) = re.captures(response) else {
        return Vec::new();
    };
    let raw = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    raw.split(',')
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect()
}

/// Parses an LLM keyword-extraction response per §4.4/§6.
fn parse_response(response: &str) -> (Vec<String>, Vec<String>) {
    (
        parse_keyword_line(&HIGH_LEVEL_RE, response),
        parse_keyword_line(&LOW_LEVEL_RE, response),
    )
}

/// Extracts and caches keywords for a query. Extraction failures are
/// swallowed per §7: callers always get a `KeywordResult`, never an
/// error — a failed or disabled extraction simply yields an empty one.
pub struct KeywordExtractor {
    l1: TtlCache<KeywordResult>,
    l2: Arc<dyn ExtractionCacheStorage>,
    llm: Arc<dyn LlmProvider>,
    config: KeywordExtractionConfig,
}

impl KeywordExtractor {
    pub fn new(
        l2: Arc<dyn ExtractionCacheStorage>,
        llm: Arc<dyn LlmProvider>,
        config: KeywordExtractionConfig,
    ) -> Self {
        Self {
            l1: TtlCache::new(Duration::from_secs(config.l1_cache_ttl_secs), config.l1_cache_max_entries),
            l2,
            llm,
            config,
        }
    }

    fn cache_key(&self, project_id: &ProjectId, query_hash: &str) -> String {
        format!("{}:{}", project_id.as_str(), query_hash)
    }

    /// Looks up an already-cached result without invoking the LLM.
    pub async fn get_cached(&self, query_hash: &str, project_id: &ProjectId) -> Option<KeywordResult> {
        let key = self.cache_key(project_id, query_hash);
        if let Some(hit) = self.l1.get(&key).await {
            return Some(hit);
        }

        match self.l2.get(project_id, CacheType::KeywordExtraction, query_hash).await {
            Ok(Some(entry)) => serde_json::from_str::<KeywordResult>(&entry.result).ok(),
            _ => None,
        }
    }

    pub async fn extract(&self, query: &str, project_id: &ProjectId) -> RagResult<KeywordResult> {
        let query_hash = sha256_hex(query.as_bytes());

        if !self.config.enabled {
            return Ok(KeywordResult::empty(query_hash));
        }

        if let Some(cached) = self.get_cached(&query_hash, project_id).await {
            return Ok(cached);
        }

        let result = match self
            .llm
            .apply(query, KEYWORD_EXTRACTION_SYSTEM_PROMPT, &[], Some(OperationType::KeywordExtraction))
            .await
        {
            Ok(response) => {
                let (high_level_keywords, low_level_keywords) = parse_response(&response);
                KeywordResult {
                    high_level_keywords,
                    low_level_keywords,
                    query_hash: query_hash.clone(),
                    cached_at: Some(chrono::Utc::now()),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "keyword extraction LLM call failed, returning empty result");
                KeywordResult::empty(query_hash.clone())
            }
        };

        let cache_key = self.cache_key(project_id, &query_hash);
        self.l1.put(cache_key, result.clone()).await;

        if let Ok(serialized) = serde_json::to_string(&result) {
            if let Err(err) = self
                .l2
                .store(project_id, CacheType::KeywordExtraction, None, &query_hash, serialized, None)
                .await
            {
                tracing::debug!(error = %err, "failed to persist keyword extraction to L2 cache");
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_llm::MockLlmProvider;
    use ragweave_storage::MockExtractionCacheStorage;

    fn extractor(llm: MockLlmProvider) -> KeywordExtractor {
        KeywordExtractor::new(
            Arc::new(MockExtractionCacheStorage::new()),
            Arc::new(llm),
            KeywordExtractionConfig::default(),
        )
    }

    #[test]
    fn parse_response_splits_both_sections() {
        let response = "HIGH_LEVEL_KEYWORDS: ai safety, policy\nLOW_LEVEL_KEYWORDS: mit";
        let (high, low) = parse_response(response);
        assert_eq!(high, vec!["ai safety", "policy"]);
        assert_eq!(low, vec!["mit"]);
    }

    #[test]
    fn parse_response_none_is_empty() {
        let response = "HIGH_LEVEL_KEYWORDS: none\nLOW_LEVEL_KEYWORDS: none";
        let (high, low) = parse_response(response);
        assert!(high.is_empty());
        assert!(low.is_empty());
    }

    #[test]
    fn parse_response_is_case_insensitive_on_marker() {
        let response = "high_level_keywords: a\nlow_level_keywords: b";
        let (high, low) = parse_response(response);
        assert_eq!(high, vec!["a"]);
        assert_eq!(low, vec!["b"]);
    }

    #[tokio::test]
    async fn disabled_extraction_returns_empty() {
        let mut config = KeywordExtractionConfig::default();
        config.enabled = false;
        let extractor = KeywordExtractor::new(
            Arc::new(MockExtractionCacheStorage::new()),
            Arc::new(MockLlmProvider::new()),
            config,
        );
        let result = extractor.extract("anything", &ProjectId::new("p1")).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn extraction_is_cached_on_second_call() {
        let llm = MockLlmProvider::with_responses(["HIGH_LEVEL_KEYWORDS: a\nLOW_LEVEL_KEYWORDS: b".to_string()]);
        let extractor = extractor(llm);
        let project_id = ProjectId::new("p1");

        let first = extractor.extract("query", &project_id).await.unwrap();
        assert_eq!(first.high_level_keywords, vec!["a"]);

        // Second call must not need another queued LLM response.
        let second = extractor.extract("query", &project_id).await.unwrap();
        assert_eq!(second.high_level_keywords, vec!["a"]);
    }

    #[tokio::test]
    async fn llm_failure_is_swallowed_as_empty_result() {
        struct FailingLlm;
        #[async_trait::async_trait]
        impl LlmProvider for FailingLlm {
            async fn apply(
                &self,
                _user_prompt: &str,
                _system_prompt: &str,
                _history: &[ragweave_core::ConversationTurn],
                _operation_type: Option<OperationType>,
            ) -> RagResult<String> {
                Err(ragweave_core::RagError::Internal("boom".to_string()))
            }
        }

        let extractor = KeywordExtractor::new(
            Arc::new(MockExtractionCacheStorage::new()),
            Arc::new(FailingLlm),
            KeywordExtractionConfig::default(),
        );
        let result = extractor.extract("query", &ProjectId::new("p1")).await.unwrap();
        assert!(result.is_empty());
    }
}
