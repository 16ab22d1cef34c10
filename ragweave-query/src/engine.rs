//! Public entry point: wires every collaborator and component together
//! behind a single `query` / `invalidate_cache` surface (§3).

use crate::chunk_select::{resolve_selector, ChunkSelector};
use crate::keywords::KeywordExtractor;
use crate::modes::{self, ModeRatios};
use crate::pipeline::Collaborators;
use crate::response_cache::QueryResponseCache;
use crate::summarizer::DescriptionSummarizer;
use ragweave_core::{Mode, ProjectId, QueryParam, RagConfig, RagResult, SourceChunk};
use ragweave_llm::{EmbeddingProvider, LlmProvider, OperationType};
use ragweave_storage::{ExtractionCacheStorage, GraphStorage, VectorStorage};
use std::sync::Arc;

pub const ANSWER_SYSTEM_PROMPT: &str =
    "Answer the user's question using only the provided context. If the context is insufficient, say so.";

/// The outcome of one query: an answer (or raw context/prompt, per
/// `onlyNeedContext`/`onlyNeedPrompt`), the mode it ran under, the
/// source chunks it drew from, and the total source count (preserved
/// across a response-cache hit even though `source_chunks` is then
/// empty, §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub answer: String,
    pub mode: Mode,
    pub source_chunks: Vec<SourceChunk>,
    pub total_sources: i32,
}

pub struct Engine {
    vector: Arc<dyn VectorStorage>,
    graph: Arc<dyn GraphStorage>,
    embedding: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    config: RagConfig,
    keyword_extractor: Arc<KeywordExtractor>,
    response_cache: QueryResponseCache,
    #[allow(dead_code)]
    description_summarizer: DescriptionSummarizer,
    chunk_selector: Arc<dyn ChunkSelector>,
}

impl Engine {
    pub fn new(
        vector: Arc<dyn VectorStorage>,
        graph: Arc<dyn GraphStorage>,
        cache: Arc<dyn ExtractionCacheStorage>,
        embedding: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        config: RagConfig,
    ) -> Self {
        let keyword_extractor = Arc::new(KeywordExtractor::new(
            cache.clone(),
            llm.clone(),
            config.keyword_extraction.clone(),
        ));
        let response_cache = QueryResponseCache::new(cache.clone());
        let description_summarizer =
            DescriptionSummarizer::new(cache, llm.clone(), config.description.clone());
        let chunk_selector =
            resolve_selector(config.chunk_selection.strategy.to_string().as_str(), vector.clone(), config.chunk_selection.clone());

        Self {
            vector,
            graph,
            embedding,
            llm,
            config,
            keyword_extractor,
            response_cache,
            description_summarizer,
            chunk_selector,
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            vector: self.vector.clone(),
            graph: self.graph.clone(),
            embedding: self.embedding.clone(),
            keyword_extractor: self.keyword_extractor.clone(),
            chunk_selector: self.chunk_selector.clone(),
        }
    }

    fn ratios_for(&self, mode: Mode) -> ModeRatios {
        match mode {
            Mode::Naive | Mode::Local => ModeRatios { chunk: 0.90, entity: 0.05, relation: 0.05 },
            Mode::Global => ModeRatios {
                chunk: 0.10,
                entity: self.config.context.entity_budget_ratio,
                relation: self.config.context.relation_budget_ratio,
            },
            Mode::Hybrid | Mode::Mix => ModeRatios {
                chunk: self.config.context.chunk_budget_ratio,
                entity: self.config.context.entity_budget_ratio,
                relation: self.config.context.relation_budget_ratio,
            },
        }
    }

    /// Runs one query end to end: response-cache lookup, pipeline
    /// execution (or skip, on a cache hit), optional LLM call, and
    /// response-cache population (§4.9, Property 4).
    pub async fn query(&self, project_id: &ProjectId, query: &str, param: QueryParam) -> RagResult<QueryOutcome> {
        let (mode, top_k, chunk_top_k) = param.cache_fields();

        if let Some(cached) = self.response_cache.get(project_id, query, mode, top_k, chunk_top_k).await {
            return Ok(QueryOutcome {
                answer: cached.answer,
                mode: cached.mode,
                source_chunks: Vec::new(),
                total_sources: cached.total_sources,
            });
        }

        let collab = self.collaborators();
        let ratios = self.ratios_for(mode);
        let max_tokens = self.config.context.max_tokens;
        let ctx = modes::execute(query, param.clone(), &collab, max_tokens, ratios).await?;

        let sources = ctx.all_sources();
        let total_sources = sources.len() as i32;

        let answer = if param.only_need_context {
            ctx.final_context.clone().unwrap_or_default()
        } else if param.only_need_prompt {
            ctx.final_prompt.clone().unwrap_or_default()
        } else {
            let prompt = ctx.final_prompt.clone().unwrap_or_default();
            self.llm
                .apply(&prompt, ANSWER_SYSTEM_PROMPT, &param.conversation_history, Some(OperationType::Answer))
                .await?
        };

        if !param.only_need_context && !param.only_need_prompt {
            self.response_cache
                .store(project_id, query, mode, top_k, chunk_top_k, &answer, total_sources)
                .await;
        }

        Ok(QueryOutcome { answer, mode, source_chunks: sources, total_sources })
    }

    pub async fn invalidate_cache(&self, project_id: &ProjectId) -> RagResult<i32> {
        self.response_cache.invalidate(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_core::ProjectId;
    use ragweave_llm::{MockEmbeddingProvider, MockLlmProvider};
    use ragweave_storage::{MockExtractionCacheStorage, MockGraphStorage, MockVectorRow, MockVectorStorage, VectorResultMetadata};

    fn param(mode: Mode) -> QueryParam {
        QueryParam {
            mode,
            project_id: ProjectId::new("p1"),
            top_k: 10,
            chunk_top_k: 5,
            only_need_context: false,
            only_need_prompt: false,
            response_type: None,
            conversation_history: Vec::new(),
        }
    }

    async fn engine_with_chunk(answer: &str) -> Engine {
        let vector = Arc::new(MockVectorStorage::new());
        vector
            .insert(MockVectorRow {
                id: "c1".to_string(),
                embedding: vec![1.0, 0.0],
                project_id: ProjectId::new("p1"),
                item_type: "chunk".to_string(),
                metadata: VectorResultMetadata {
                    content: "paris is the capital of france".to_string(),
                    document_id: Some("doc1".to_string()),
                    chunk_index: Some(0),
                    item_type: "chunk".to_string(),
                },
            })
            .await;

        Engine::new(
            vector,
            Arc::new(MockGraphStorage::new()),
            Arc::new(MockExtractionCacheStorage::new()),
            Arc::new(MockEmbeddingProvider::new(2)),
            Arc::new(MockLlmProvider::with_responses([answer.to_string()])),
            RagConfig::default(),
        )
    }

    #[tokio::test]
    async fn query_resolves_an_answer_and_caches_it() {
        let engine = engine_with_chunk("hello").await;
        let project_id = ProjectId::new("p1");

        let first = engine.query(&project_id, "q", param(Mode::Local)).await.unwrap();
        assert_eq!(first.answer, "hello");
        assert_eq!(first.mode, Mode::Local);
        assert!(!first.source_chunks.is_empty());

        let second = engine.query(&project_id, "q", param(Mode::Local)).await.unwrap();
        assert_eq!(second.answer, "hello");
        assert!(second.source_chunks.is_empty());
        assert_eq!(second.total_sources, first.total_sources);
    }

    #[tokio::test]
    async fn only_need_prompt_skips_the_llm_and_the_response_cache() {
        let engine = engine_with_chunk("unused").await;
        let project_id = ProjectId::new("p1");
        let mut p = param(Mode::Local);
        p.only_need_prompt = true;

        let outcome = engine.query(&project_id, "q", p).await.unwrap();
        assert!(outcome.answer.contains("## Query"));
    }

    #[tokio::test]
    async fn invalidate_cache_clears_stored_response() {
        let engine = engine_with_chunk("hello").await;
        let project_id = ProjectId::new("p1");
        engine.query(&project_id, "q", param(Mode::Local)).await.unwrap();

        let deleted = engine.invalidate_cache(&project_id).await.unwrap();
        assert_eq!(deleted, 1);

        let outcome = engine.query(&project_id, "q", param(Mode::Local)).await.unwrap();
        assert!(!outcome.source_chunks.is_empty());
    }
}
