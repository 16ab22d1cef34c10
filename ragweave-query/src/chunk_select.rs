//! C6: ChunkSelector — `vector` and `weighted` top-K chunk selection
//! strategies behind one interface.

use async_trait::async_trait;
use ragweave_core::{ChunkSelectionConfig, ChunkSelectionStrategy, ProjectId, RagResult};
use ragweave_storage::{VectorFilter, VectorStorage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A chunk with its final relevance score, ready for truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub document_id: Option<String>,
    pub chunk_index: Option<i32>,
}

/// Boost inputs for the `weighted` strategy (§4.6). `None` is
/// equivalent to an all-empty context: no boosts applied, behaving
/// exactly like `vector`.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub entity_names: Vec<String>,
    pub relation_keywords: Vec<String>,
    pub entity_chunk_weights: HashMap<String, f64>,
    /// `sourceChunkIds` of every entity named in `entity_names`, used to
    /// apply the full (non-partial) entity boost.
    pub entity_source_chunk_ids: HashSet<String>,
}

#[async_trait]
pub trait ChunkSelector: Send + Sync {
    async fn select(
        &self,
        query_embedding: &[f32],
        project_id: &ProjectId,
        top_k: i32,
        selection_context: Option<&SelectionContext>,
    ) -> RagResult<Vec<ScoredChunk>>;
}

fn to_scored(result: ragweave_storage::VectorSearchResult) -> ScoredChunk {
    ScoredChunk {
        id: result.id,
        content: result.metadata.content,
        score: result.score,
        document_id: result.metadata.document_id,
        chunk_index: result.metadata.chunk_index,
    }
}

pub struct VectorChunkSelector {
    vector_storage: Arc<dyn VectorStorage>,
}

impl VectorChunkSelector {
    pub fn new(vector_storage: Arc<dyn VectorStorage>) -> Self {
        Self { vector_storage }
    }
}

#[async_trait]
impl ChunkSelector for VectorChunkSelector {
    async fn select(
        &self,
        query_embedding: &[f32],
        project_id: &ProjectId,
        top_k: i32,
        _selection_context: Option<&SelectionContext>,
    ) -> RagResult<Vec<ScoredChunk>> {
        let filter = VectorFilter::new("chunk", project_id.clone());
        let results = self.vector_storage.query(query_embedding, top_k, filter).await?;
        Ok(results.into_iter().map(to_scored).collect())
    }
}

pub struct WeightedChunkSelector {
    vector_storage: Arc<dyn VectorStorage>,
    config: ChunkSelectionConfig,
}

impl WeightedChunkSelector {
    pub fn new(vector_storage: Arc<dyn VectorStorage>, config: ChunkSelectionConfig) -> Self {
        Self { vector_storage, config }
    }

    fn boost(&self, chunk: &ScoredChunk, ctx: &SelectionContext) -> f64 {
        let mut boost = 0.0;

        if ctx.entity_source_chunk_ids.contains(&chunk.id) {
            boost += self.config.entity_boost;
        } else if ctx
            .entity_names
            .iter()
            .any(|name| chunk.content.to_lowercase().contains(&name.to_lowercase()))
        {
            boost += self.config.partial_entity_boost;
        }

        if ctx
            .relation_keywords
            .iter()
            .any(|keyword| chunk.content.to_lowercase().contains(&keyword.to_lowercase()))
        {
            boost += self.config.relation_keyword_boost;
        }

        if let Some(custom) = ctx.entity_chunk_weights.get(&chunk.id) {
            boost += custom;
        }

        boost
    }
}

#[async_trait]
impl ChunkSelector for WeightedChunkSelector {
    async fn select(
        &self,
        query_embedding: &[f32],
        project_id: &ProjectId,
        top_k: i32,
        selection_context: Option<&SelectionContext>,
    ) -> RagResult<Vec<ScoredChunk>> {
        let search_k = top_k.saturating_mul(self.config.search_multiplier);
        let filter = VectorFilter::new("chunk", project_id.clone());
        let results = self.vector_storage.query(query_embedding, search_k, filter).await?;
        let mut candidates: Vec<ScoredChunk> = results.into_iter().map(to_scored).collect();

        if let Some(ctx) = selection_context {
            for chunk in &mut candidates {
                let boost = self.boost(chunk, ctx);
                chunk.score *= 1.0 + boost;
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(top_k.max(0) as usize);
        Ok(candidates)
    }
}

/// Resolves a configured strategy name (case-insensitive) into a
/// [`ChunkSelector`]. An unknown name logs a warning and falls back to
/// `vector` (§4.6).
pub fn resolve_selector(
    strategy_name: &str,
    vector_storage: Arc<dyn VectorStorage>,
    config: ChunkSelectionConfig,
) -> Arc<dyn ChunkSelector> {
    let strategy = strategy_name.parse::<ChunkSelectionStrategy>().unwrap_or_else(|_| {
        tracing::warn!(strategy = strategy_name, "unknown chunk selection strategy, defaulting to vector");
        ChunkSelectionStrategy::Vector
    });
    match strategy {
        ChunkSelectionStrategy::Vector => Arc::new(VectorChunkSelector::new(vector_storage)),
        ChunkSelectionStrategy::Weighted => Arc::new(WeightedChunkSelector::new(vector_storage, config)),
    }
}
