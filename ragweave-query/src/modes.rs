//! C8: ModeExecutors — one wiring of C7 stages per retrieval mode
//! (§4.8). HYBRID and MIX run their two legs on independent
//! [`PipelineContext`] instances joined concurrently, then fold the
//! results back into the query's shared context before truncation.

use crate::graph_expand::expand;
use crate::pipeline::{
    ChunkSearchStage, Collaborators, ContextBuilderStage, EntitySearchStage, MergeStage,
    PipelineContext, Stage, TruncateStage,
};
use ragweave_core::{MergeOrder, Mode, QueryParam, RagError, RagResult};
use std::sync::Arc;

/// Token-allocation ratios read from [`ragweave_core::ContextConfig`],
/// overridden per mode where §4.8 specifies fixed values.
pub struct ModeRatios {
    pub chunk: f32,
    pub entity: f32,
    pub relation: f32,
}

async fn run(stage: &dyn Stage, ctx: &mut PipelineContext, collab: &Collaborators) -> RagResult<()> {
    stage.execute(ctx, collab).await.map_err(|cause| RagError::pipeline(stage.name(), cause))
}

/// Executes the pipeline wiring for `param.mode` and returns the
/// populated context (`finalContext` / `finalPrompt` / source chunks
/// ready for the engine to read off).
pub async fn execute(
    query: &str,
    param: QueryParam,
    collab: &Collaborators,
    max_tokens: i32,
    ratios: ModeRatios,
) -> RagResult<PipelineContext> {
    let mode = param.mode;
    let mut ctx = PipelineContext::new(query, param);

    match mode {
        Mode::Naive => {
            ctx.param.as_mut().unwrap().chunk_top_k = ctx.param().chunk_top_k.min(5);
            run(&ChunkSearchStage, &mut ctx, collab).await?;
            run(
                &TruncateStage { max_tokens, chunk_ratio: 0.90, entity_ratio: 0.05, relation_ratio: 0.05 },
                &mut ctx,
                collab,
            )
            .await?;
            run(&MergeStage { merge_order: MergeOrder::ChunkEntityRelation, max_tokens }, &mut ctx, collab).await?;
            run(&ContextBuilderStage { grouped: false, include_headers: true }, &mut ctx, collab).await?;
        }

        Mode::Local => {
            run(&ChunkSearchStage, &mut ctx, collab).await?;
            run(
                &TruncateStage { max_tokens, chunk_ratio: 0.90, entity_ratio: 0.05, relation_ratio: 0.05 },
                &mut ctx,
                collab,
            )
            .await?;
            run(&MergeStage { merge_order: MergeOrder::ChunkEntityRelation, max_tokens }, &mut ctx, collab).await?;
            run(&ContextBuilderStage { grouped: false, include_headers: true }, &mut ctx, collab).await?;
        }

        Mode::Global => {
            run(&EntitySearchStage { include_relations: true }, &mut ctx, collab).await?;
            run(
                &TruncateStage {
                    max_tokens,
                    chunk_ratio: 0.10,
                    entity_ratio: ratios.entity,
                    relation_ratio: ratios.relation,
                },
                &mut ctx,
                collab,
            )
            .await?;
            run(&MergeStage { merge_order: MergeOrder::EntityRelationChunk, max_tokens }, &mut ctx, collab).await?;
            run(&ContextBuilderStage { grouped: true, include_headers: true }, &mut ctx, collab).await?;
        }

        Mode::Hybrid => {
            let mut chunk_ctx = PipelineContext::new(query, ctx.param().clone());
            let mut entity_ctx = PipelineContext::new(query, ctx.param().clone());
            let chunk_stage = ChunkSearchStage;
            let entity_stage = EntitySearchStage { include_relations: true };

            let (chunk_res, entity_res) = tokio::join!(
                run(&chunk_stage, &mut chunk_ctx, collab),
                run(&entity_stage, &mut entity_ctx, collab),
            );
            chunk_res?;
            entity_res?;

            ctx.chunk_candidates = chunk_ctx.chunk_candidates;
            ctx.entity_candidates = entity_ctx.entity_candidates;
            ctx.relation_candidates = entity_ctx.relation_candidates;
            ctx.keywords = chunk_ctx.keywords.or(entity_ctx.keywords);

            run(
                &TruncateStage {
                    max_tokens,
                    chunk_ratio: ratios.chunk,
                    entity_ratio: ratios.entity,
                    relation_ratio: ratios.relation,
                },
                &mut ctx,
                collab,
            )
            .await?;
            run(&MergeStage { merge_order: MergeOrder::ChunkEntityRelation, max_tokens }, &mut ctx, collab).await?;
            run(&ContextBuilderStage { grouped: true, include_headers: true }, &mut ctx, collab).await?;
        }

        Mode::Mix => {
            let mut chunk_ctx = PipelineContext::new(query, ctx.param().clone());
            let mut seed_ctx = PipelineContext::new(query, ctx.param().clone());
            let chunk_stage = ChunkSearchStage;
            let seed_stage = EntitySearchStage { include_relations: false };
            let project_id = ctx.param().project_id.clone();

            let graph_leg = async {
                run(&seed_stage, &mut seed_ctx, collab).await?;
                let seeds: Vec<String> = seed_ctx.entity_candidates.iter().map(|e| e.name.clone()).collect();
                let expansion = expand(&collab.graph, &project_id, &seeds, 1).await?;
                let visited: Vec<String> = expansion.visited.into_iter().collect();
                let entities = collab.graph.get_entities(&project_id, &visited).await?;
                Ok::<_, RagError>((entities, expansion.relations))
            };

            let (graph_res, chunk_res) = tokio::join!(graph_leg, run(&chunk_stage, &mut chunk_ctx, collab));
            let (entities, relations) = graph_res?;
            chunk_res?;

            ctx.entity_candidates = entities;
            ctx.relation_candidates = relations;
            ctx.chunk_candidates = chunk_ctx.chunk_candidates;
            ctx.keywords = chunk_ctx.keywords.or(seed_ctx.keywords);

            run(
                &TruncateStage {
                    max_tokens,
                    chunk_ratio: ratios.chunk,
                    entity_ratio: ratios.entity,
                    relation_ratio: ratios.relation,
                },
                &mut ctx,
                collab,
            )
            .await?;
            run(&MergeStage { merge_order: MergeOrder::EntityRelationChunk, max_tokens }, &mut ctx, collab).await?;
            run(&ContextBuilderStage { grouped: true, include_headers: true }, &mut ctx, collab).await?;
        }
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_select::VectorChunkSelector;
    use crate::keywords::KeywordExtractor;
    use ragweave_core::{ChunkSelectionConfig, KeywordExtractionConfig, ProjectId};
    use ragweave_llm::{MockEmbeddingProvider, MockLlmProvider};
    use ragweave_storage::{MockExtractionCacheStorage, MockGraphStorage, MockVectorRow, MockVectorStorage, VectorResultMetadata};

    fn default_ratios() -> ModeRatios {
        ModeRatios { chunk: 0.30, entity: 0.40, relation: 0.30 }
    }

    fn param(mode: Mode) -> QueryParam {
        QueryParam {
            mode,
            project_id: ProjectId::new("p1"),
            top_k: 10,
            chunk_top_k: 5,
            only_need_context: false,
            only_need_prompt: true,
            response_type: None,
            conversation_history: Vec::new(),
        }
    }

    async fn collaborators_with_chunk(id: &str, content: &str) -> Collaborators {
        let vector = Arc::new(MockVectorStorage::new());
        vector
            .insert(MockVectorRow {
                id: id.to_string(),
                embedding: vec![1.0, 0.0],
                project_id: ProjectId::new("p1"),
                item_type: "chunk".to_string(),
                metadata: VectorResultMetadata {
                    content: content.to_string(),
                    document_id: Some("doc1".to_string()),
                    chunk_index: Some(0),
                    item_type: "chunk".to_string(),
                },
            })
            .await;

        Collaborators {
            vector: vector.clone(),
            graph: Arc::new(MockGraphStorage::new()),
            embedding: Arc::new(MockEmbeddingProvider::new(2)),
            keyword_extractor: Arc::new(KeywordExtractor::new(
                Arc::new(MockExtractionCacheStorage::new()),
                Arc::new(MockLlmProvider::new()),
                KeywordExtractionConfig::default(),
            )),
            chunk_selector: Arc::new(VectorChunkSelector::new(vector)),
        }
    }

    #[tokio::test]
    async fn naive_mode_caps_chunk_top_k_at_five() {
        let collab = collaborators_with_chunk("c1", "hello world").await;
        let mut p = param(Mode::Naive);
        p.chunk_top_k = 50;
        let ctx = execute("hello", p, &collab, 800, default_ratios()).await.unwrap();
        assert!(ctx.param().chunk_top_k <= 5);
        assert!(ctx.final_prompt.is_some());
    }

    #[tokio::test]
    async fn local_mode_produces_flat_prompt_with_query_section() {
        let collab = collaborators_with_chunk("c1", "hello world").await;
        let ctx = execute("hello", param(Mode::Local), &collab, 800, default_ratios()).await.unwrap();
        assert!(ctx.final_prompt.as_ref().unwrap().contains("## Query\nhello"));
    }

    #[tokio::test]
    async fn hybrid_mode_populates_both_chunk_and_entity_legs() {
        let collab = collaborators_with_chunk("c1", "hello world").await;
        let ctx = execute("hello", param(Mode::Hybrid), &collab, 800, default_ratios()).await.unwrap();
        assert!(!ctx.chunk_candidates.is_empty());
        assert!(ctx.final_prompt.is_some());
    }

    #[tokio::test]
    async fn mix_mode_runs_without_seeds_or_chunks() {
        let collab = collaborators_with_chunk("c1", "hello world").await;
        let ctx = execute("hello", param(Mode::Mix), &collab, 800, default_ratios()).await.unwrap();
        assert!(ctx.final_prompt.is_some());
    }
}
