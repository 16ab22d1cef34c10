//! C10: DescriptionSummarizer — collapses accumulated entity
//! descriptions once they exceed a token threshold, direct or
//! map-reduce depending on count, cached by content hash.

use futures::future::{join_all, BoxFuture};
use ragweave_context::estimate;
use ragweave_core::{sha256_hex, CacheType, DescriptionConfig, ProjectId};
use ragweave_llm::{LlmProvider, OperationType};
use ragweave_storage::ExtractionCacheStorage;
use std::sync::Arc;

pub const SUMMARIZATION_SYSTEM_PROMPT: &str =
    "Merge the following entity descriptions into one concise description. Do not invent new facts.";

const MAP_REDUCE_BATCH_SIZE: usize = 5;
const DIRECT_THRESHOLD: usize = 10;

pub struct DescriptionSummarizer {
    cache: Arc<dyn ExtractionCacheStorage>,
    llm: Arc<dyn LlmProvider>,
    config: DescriptionConfig,
}

impl DescriptionSummarizer {
    pub fn new(cache: Arc<dyn ExtractionCacheStorage>, llm: Arc<dyn LlmProvider>, config: DescriptionConfig) -> Self {
        Self { cache, llm, config }
    }

    /// `true` when the combined token estimate of `descriptions` exceeds
    /// the configured threshold (§4.10).
    pub fn needs_summarization(&self, descriptions: &[String]) -> bool {
        let total: i32 = descriptions.iter().map(|d| estimate(d)).sum();
        total > self.config.summarization_threshold
    }

    fn content_hash(entity_name: &str, descriptions: &[String]) -> String {
        let joined = format!("{entity_name}{}", descriptions.join(""));
        sha256_hex(joined.as_bytes())
    }

    /// Summarizes `descriptions` for `entity_name`, consulting and
    /// populating the summarization cache. Passes through (joined by the
    /// configured separator) when there's nothing to summarize or the
    /// total is already within budget.
    pub async fn summarize(
        &self,
        entity_name: &str,
        entity_type: Option<&str>,
        descriptions: &[String],
        project_id: &ProjectId,
    ) -> String {
        if descriptions.len() <= 1 || !self.needs_summarization(descriptions) {
            return descriptions.join(&self.config.separator);
        }

        let content_hash = Self::content_hash(entity_name, descriptions);
        if let Ok(Some(entry)) = self.cache.get(project_id, CacheType::Summarization, &content_hash).await {
            return entry.result;
        }

        let summary = if descriptions.len() <= DIRECT_THRESHOLD {
            self.summarize_direct(entity_name, entity_type, descriptions).await
        } else {
            self.summarize_map_reduce(entity_name, entity_type, descriptions.to_vec()).await
        };

        if let Err(err) = self
            .cache
            .store(project_id, CacheType::Summarization, None, &content_hash, summary.clone(), None)
            .await
        {
            tracing::debug!(error = %err, "failed to persist description summary to cache");
        }

        summary
    }

    async fn summarize_direct(&self, entity_name: &str, entity_type: Option<&str>, descriptions: &[String]) -> String {
        let type_suffix = entity_type.map(|t| format!(" ({t})")).unwrap_or_default();
        let prompt = format!("Entity: {entity_name}{type_suffix}\n\n{}", descriptions.join("\n"));

        match self
            .llm
            .apply(&prompt, SUMMARIZATION_SYSTEM_PROMPT, &[], Some(OperationType::Summarization))
            .await
        {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(error = %err, "description summarization LLM call failed, concatenating instead");
                descriptions.join(&self.config.separator)
            }
        }
    }

    fn summarize_map_reduce<'a>(
        &'a self,
        entity_name: &'a str,
        entity_type: Option<&'a str>,
        descriptions: Vec<String>,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let batch_summaries: Vec<String> = join_all(
                descriptions
                    .chunks(MAP_REDUCE_BATCH_SIZE)
                    .map(|batch| self.summarize_direct(entity_name, entity_type, batch)),
            )
            .await;

            if batch_summaries.len() <= DIRECT_THRESHOLD {
                self.summarize_direct(entity_name, entity_type, &batch_summaries).await
            } else {
                self.summarize_map_reduce(entity_name, entity_type, batch_summaries).await
            }
        })
    }
}
