//! C7: PipelineStages — the mutable per-query context and the five
//! composable stages (ChunkSearch, EntitySearch, Truncate, Merge,
//! ContextBuilder) that every mode executor wires together.

use crate::chunk_select::ChunkSelector;
use crate::keywords::KeywordExtractor;
use async_trait::async_trait;
use futures::future::join_all;
use ragweave_context::{budget_allocation, estimate, merge, MergeResult};
use ragweave_core::{
    ContextItem, ContextItemType, Entity, MergeOrder, ProjectId, QueryParam, RagError, RagResult,
    Relation, SourceChunk, SourceChunkType,
};
use ragweave_llm::EmbeddingProvider;
use ragweave_storage::{GraphStorage, VectorFilter, VectorStorage};
use std::collections::HashSet;
use std::sync::Arc;

/// Collaborators shared read-only across every stage of one pipeline run.
pub struct Collaborators {
    pub vector: Arc<dyn VectorStorage>,
    pub graph: Arc<dyn GraphStorage>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub keyword_extractor: Arc<KeywordExtractor>,
    pub chunk_selector: Arc<dyn ChunkSelector>,
}

/// Per-query mutable state threaded through pipeline stages (§4.7).
/// Lives only for the duration of one query.
#[derive(Default)]
pub struct PipelineContext {
    pub query: String,
    pub param: Option<QueryParam>,

    pub keywords: Option<ragweave_core::KeywordResult>,

    pub chunk_candidates: Vec<SourceChunk>,
    pub entity_candidates: Vec<Entity>,
    pub relation_candidates: Vec<Relation>,

    pub truncated_chunks: Vec<ContextItem>,
    pub truncated_entities: Vec<ContextItem>,
    pub truncated_relations: Vec<ContextItem>,

    pub chunk_tokens: i32,
    pub entity_tokens: i32,
    pub relation_tokens: i32,

    pub merged: Option<MergeResult>,
    pub final_context: Option<String>,
    pub final_prompt: Option<String>,
}

impl PipelineContext {
    pub fn new(query: impl Into<String>, param: QueryParam) -> Self {
        Self {
            query: query.into(),
            param: Some(param),
            ..Default::default()
        }
    }

    pub fn param(&self) -> &QueryParam {
        self.param.as_ref().expect("PipelineContext constructed via new() always carries a param")
    }

    pub fn total_tokens(&self) -> i32 {
        self.chunk_tokens + self.entity_tokens + self.relation_tokens
    }

    /// All source chunks surfaced by this query, for the final result's
    /// `allSources` (§4.7).
    pub fn all_sources(&self) -> Vec<SourceChunk> {
        self.chunk_candidates.clone()
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn should_skip(&self, _ctx: &PipelineContext) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut PipelineContext, collab: &Collaborators) -> RagResult<()>;
}

/// Runs `stages` sequentially, chaining through the shared context.
/// A skipped stage logs at debug and passes through untouched; a
/// failing stage aborts with its cause wrapped in
/// [`RagError::Pipeline`] — the partial context is never reused.
pub async fn run_stages(
    stages: &[Arc<dyn Stage>],
    ctx: &mut PipelineContext,
    collab: &Collaborators,
) -> RagResult<()> {
    for stage in stages {
        if stage.should_skip(ctx) {
            tracing::debug!(stage = stage.name(), "skipping stage");
            continue;
        }
        stage.execute(ctx, collab).await.map_err(|cause| RagError::pipeline(stage.name(), cause))?;
    }
    Ok(())
}

/// Builds the embedding input text for a search stage: the raw query
/// plus the relevant keyword list, space-joined, when keywords are
/// available — otherwise the raw query alone (§4.7, scenario 2).
fn embedding_input(query: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        query.to_string()
    } else {
        format!("{query} {}", keywords.join(" "))
    }
}

/// C7 ChunkSearchStage: keyword-augmented (low-level) vector search
/// over chunks.
pub struct ChunkSearchStage;

#[async_trait]
impl Stage for ChunkSearchStage {
    fn name(&self) -> &'static str {
        "ChunkSearchStage"
    }

    async fn execute(&self, ctx: &mut PipelineContext, collab: &Collaborators) -> RagResult<()> {
        let project_id = ctx.param().project_id.clone();
        let chunk_top_k = ctx.param().chunk_top_k;

        if ctx.keywords.is_none() {
            let keywords = collab.keyword_extractor.extract(&ctx.query, &project_id).await?;
            ctx.keywords = Some(keywords);
        }
        let low_level = ctx.keywords.as_ref().map(|k| k.low_level_keywords.clone()).unwrap_or_default();
        let embed_text = embedding_input(&ctx.query, &low_level);
        let embedding = collab.embedding.embed_single(&embed_text).await?;

        let scored = collab.chunk_selector.select(&embedding, &project_id, chunk_top_k, None).await?;
        ctx.chunk_candidates = scored
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| SourceChunk {
                chunk_id: chunk.id,
                content: chunk.content,
                relevance_score: chunk.score,
                document_id: chunk.document_id,
                source_id: project_id.as_str().to_string(),
                chunk_index: chunk.chunk_index.unwrap_or(index as i32),
                chunk_type: SourceChunkType::Chunk,
            })
            .collect();
        Ok(())
    }
}

/// C7 EntitySearchStage: keyword-augmented (high-level) vector search
/// over entities, hydrated via graph storage, with an optional 1-hop
/// relation fetch.
pub struct EntitySearchStage {
    pub include_relations: bool,
}

#[async_trait]
impl Stage for EntitySearchStage {
    fn name(&self) -> &'static str {
        "EntitySearchStage"
    }

    async fn execute(&self, ctx: &mut PipelineContext, collab: &Collaborators) -> RagResult<()> {
        let project_id = ctx.param().project_id.clone();
        let top_k = ctx.param().top_k;

        if ctx.keywords.is_none() {
            let keywords = collab.keyword_extractor.extract(&ctx.query, &project_id).await?;
            ctx.keywords = Some(keywords);
        }
        let high_level = ctx.keywords.as_ref().map(|k| k.high_level_keywords.clone()).unwrap_or_default();
        let embed_text = embedding_input(&ctx.query, &high_level);
        let embedding = collab.embedding.embed_single(&embed_text).await?;

        let filter = VectorFilter::new("entity", project_id.clone());
        let hits = collab.vector.query(&embedding, top_k, filter).await?;
        let names: Vec<String> = hits.into_iter().map(|hit| hit.id).collect();

        ctx.entity_candidates = collab.graph.get_entities(&project_id, &names).await?;

        if self.include_relations && !ctx.entity_candidates.is_empty() {
            let fetches = ctx.entity_candidates.iter().map(|entity| {
                let graph = collab.graph.clone();
                let project_id = project_id.clone();
                let name = entity.name.clone();
                async move { graph.get_relations_for_entity(&project_id, &name).await }
            });
            let fetched: Vec<RagResult<Vec<Relation>>> = join_all(fetches).await;

            let mut seen = HashSet::new();
            let mut relations = Vec::new();
            for batch in fetched {
                for relation in batch? {
                    if seen.insert(relation.pair_key()) {
                        relations.push(relation);
                    }
                }
            }
            ctx.relation_candidates = relations;
        }

        Ok(())
    }
}

fn format_chunk(chunk: &SourceChunk) -> String {
    match &chunk.document_id {
        Some(document_id) if !document_id.is_empty() => format!("[{document_id}] {}", chunk.content),
        _ => chunk.content.clone(),
    }
}

fn format_entity(entity: &Entity) -> String {
    let mut out = entity.name.clone();
    if let Some(entity_type) = &entity.entity_type {
        out.push_str(&format!(" ({entity_type})"));
    }
    if !entity.description.is_empty() {
        out.push_str(&format!(": {}", entity.description));
    }
    out
}

fn format_relation(relation: &Relation) -> String {
    let mut out = format!("{} -> {}", relation.src_id, relation.tgt_id);
    if !relation.description.is_empty() {
        out.push_str(&format!(": {}", relation.description));
    }
    out
}

/// C7 TruncateStage: per-type budgets, prefix-inclusion in candidate
/// order, stopping at the first item that would overflow its budget.
pub struct TruncateStage {
    pub max_tokens: i32,
    pub chunk_ratio: f32,
    pub entity_ratio: f32,
    pub relation_ratio: f32,
}

impl TruncateStage {
    fn truncate_one_type<T>(
        items: &[T],
        budget: i32,
        item_type: ContextItemType,
        format: impl Fn(&T) -> String,
        source_id: impl Fn(&T) -> String,
        file_path: impl Fn(&T) -> Option<String>,
    ) -> (Vec<ContextItem>, i32) {
        let mut included = Vec::new();
        let mut total = 0;
        for item in items {
            let content = format(item);
            let tokens = estimate(&content);
            if total + tokens > budget {
                break;
            }
            total += tokens;
            included.push(ContextItem {
                content,
                item_type,
                source_id: source_id(item),
                file_path: file_path(item),
                tokens,
            });
        }
        (included, total)
    }
}

#[async_trait]
impl Stage for TruncateStage {
    fn name(&self) -> &'static str {
        "TruncateStage"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _collab: &Collaborators) -> RagResult<()> {
        let (chunk_budget, entity_budget, relation_budget) =
            budget_allocation(self.max_tokens, self.chunk_ratio, self.entity_ratio, self.relation_ratio);

        let (chunks, chunk_tokens) = Self::truncate_one_type(
            &ctx.chunk_candidates,
            chunk_budget,
            ContextItemType::Chunk,
            format_chunk,
            |c: &SourceChunk| c.source_id.clone(),
            |c: &SourceChunk| None.or_else(|| c.document_id.clone()),
        );
        let (entities, entity_tokens) = Self::truncate_one_type(
            &ctx.entity_candidates,
            entity_budget,
            ContextItemType::Entity,
            format_entity,
            |e: &Entity| e.source_id.clone(),
            |e: &Entity| e.file_path.clone(),
        );
        let (relations, relation_tokens) = Self::truncate_one_type(
            &ctx.relation_candidates,
            relation_budget,
            ContextItemType::Relation,
            format_relation,
            |r: &Relation| r.pair_key(),
            |r: &Relation| r.file_path.clone(),
        );

        ctx.truncated_chunks = chunks;
        ctx.truncated_entities = entities;
        ctx.truncated_relations = relations;
        ctx.chunk_tokens = chunk_tokens;
        ctx.entity_tokens = entity_tokens;
        ctx.relation_tokens = relation_tokens;
        Ok(())
    }
}

/// C7 MergeStage: orders the truncated lists per `merge_order` and
/// invokes the round-robin ContextMerger. Its `max_tokens` is the hard
/// cap even when it disagrees with TruncateStage's per-type budgets
/// (§9 Open Question).
pub struct MergeStage {
    pub merge_order: MergeOrder,
    pub max_tokens: i32,
}

#[async_trait]
impl Stage for MergeStage {
    fn name(&self) -> &'static str {
        "MergeStage"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _collab: &Collaborators) -> RagResult<()> {
        let sources = match self.merge_order {
            MergeOrder::EntityRelationChunk => vec![
                ctx.truncated_entities.clone(),
                ctx.truncated_relations.clone(),
                ctx.truncated_chunks.clone(),
            ],
            MergeOrder::ChunkEntityRelation => vec![
                ctx.truncated_chunks.clone(),
                ctx.truncated_entities.clone(),
                ctx.truncated_relations.clone(),
            ],
            MergeOrder::RelationEntityChunk => vec![
                ctx.truncated_relations.clone(),
                ctx.truncated_entities.clone(),
                ctx.truncated_chunks.clone(),
            ],
        };

        let result = merge(&sources, self.max_tokens);
        ctx.final_context = Some(result.merged_context.clone());
        ctx.merged = Some(result);
        Ok(())
    }
}

fn capitalize_role(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// C7 ContextBuilderStage: assembles the final prompt from conversation
/// history, context (grouped-by-type or flat), the query, and an
/// optional response-type trailer.
pub struct ContextBuilderStage {
    pub grouped: bool,
    pub include_headers: bool,
}

#[async_trait]
impl Stage for ContextBuilderStage {
    fn name(&self) -> &'static str {
        "ContextBuilderStage"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _collab: &Collaborators) -> RagResult<()> {
        let mut sections: Vec<String> = Vec::new();

        if !ctx.param().conversation_history.is_empty() {
            let history = ctx
                .param()
                .conversation_history
                .iter()
                .map(|turn| format!("{}: {}", capitalize_role(&turn.role), turn.content))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(history);
        }

        let merged_items = ctx.merged.as_ref().map(|m| m.included_items.clone()).unwrap_or_default();
        if !merged_items.is_empty() {
            sections.push(self.render_context(&merged_items));
        }

        sections.push(format!("## Query\n{}", ctx.query));

        if let Some(response_type) = &ctx.param().response_type {
            sections.push(format!("Please respond with: {response_type}"));
        }

        ctx.final_prompt = Some(sections.join("\n\n"));
        Ok(())
    }
}

impl ContextBuilderStage {
    fn render_context(&self, items: &[ContextItem]) -> String {
        if !self.grouped {
            return items
                .iter()
                .map(|item| format!("[{}] {}", self.label(item.item_type), item.content))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let mut sections = Vec::new();
        for (item_type, header) in [
            (ContextItemType::Entity, "### Entities"),
            (ContextItemType::Relation, "### Relations"),
            (ContextItemType::Chunk, "### Sources"),
        ] {
            let rendered: Vec<&ContextItem> = items.iter().filter(|i| i.item_type == item_type).collect();
            if rendered.is_empty() {
                continue;
            }
            let body = rendered.iter().map(|i| i.content.clone()).collect::<Vec<_>>().join("\n");
            if self.include_headers {
                sections.push(format!("{header}\n{body}"));
            } else {
                sections.push(body);
            }
        }
        sections.join("\n\n")
    }

    fn label(&self, item_type: ContextItemType) -> &'static str {
        match item_type {
            ContextItemType::Entity => "Entity",
            ContextItemType::Relation => "Relation",
            ContextItemType::Chunk => "Source",
        }
    }
}
