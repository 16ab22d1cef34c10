//! Storage collaborators consumed by the retrieval core (§6).
//!
//! These are pure interfaces: raw drivers (key-value, vector, graph,
//! persistent cache) are out of scope per spec.md's Non-goals. Traits
//! are `async_trait` and object-safe so the engine can hold them as
//! `Arc<dyn Trait>`, exactly as the teacher's `AsyncStorageTrait` does.

use async_trait::async_trait;
use ragweave_core::{CacheType, Entity, ProjectId, Relation, RagResult};
use serde::{Deserialize, Serialize};

/// Flat key-value lookup, used for chunk-content retrieval by id.
#[async_trait]
pub trait KVStorage: Send + Sync {
    async fn get(&self, key: &str) -> RagResult<Option<String>>;
    async fn keys(&self) -> RagResult<Vec<String>>;
}

/// Metadata carried alongside a vector search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorResultMetadata {
    pub content: String,
    pub document_id: Option<String>,
    pub chunk_index: Option<i32>,
    pub item_type: String,
}

/// A single hit from [`VectorStorage::query`], descending by score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResult {
    pub id: String,
    pub score: f64,
    pub metadata: VectorResultMetadata,
}

/// Filter applied server-side by the vector backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFilter {
    pub item_type: String,
    pub project_id: ProjectId,
    pub id_subset: Option<Vec<String>>,
}

impl VectorFilter {
    pub fn new(item_type: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            item_type: item_type.into(),
            project_id,
            id_subset: None,
        }
    }

    pub fn with_id_subset(mut self, ids: Vec<String>) -> Self {
        self.id_subset = Some(ids);
        self
    }
}

/// Nearest-neighbor vector search. The storage owns cosine-similarity
/// computation and filtering; results are returned in descending score
/// order.
#[async_trait]
pub trait VectorStorage: Send + Sync {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: i32,
        filter: VectorFilter,
    ) -> RagResult<Vec<VectorSearchResult>>;
}

/// Knowledge-graph reads (and the one write path used by the
/// description summarizer).
#[async_trait]
pub trait GraphStorage: Send + Sync {
    async fn get_entities(&self, project_id: &ProjectId, names: &[String]) -> RagResult<Vec<Entity>>;

    async fn get_relations_for_entity(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> RagResult<Vec<Relation>>;

    /// Upserts a merged description onto an existing entity. Callers
    /// must hold the entity-name lock from `ragweave-storage::lock`
    /// before calling this (§3 Lifecycles).
    async fn upsert_entity_description(
        &self,
        project_id: &ProjectId,
        name: &str,
        entity_type: Option<&str>,
        description: &str,
    ) -> RagResult<()>;
}

/// Persistent cache backing keyword extraction, the query-response
/// cache, and description summarization (§3 Cache entry, §4.9).
#[async_trait]
pub trait ExtractionCacheStorage: Send + Sync {
    async fn get(
        &self,
        project_id: &ProjectId,
        cache_type: CacheType,
        content_hash: &str,
    ) -> RagResult<Option<ragweave_core::CacheEntry>>;

    async fn store(
        &self,
        project_id: &ProjectId,
        cache_type: CacheType,
        chunk_id: Option<String>,
        content_hash: &str,
        result: String,
        tokens_used: Option<i32>,
    ) -> RagResult<String>;

    /// Deletes all rows for `(project_id, cache_type)`, returning the
    /// delete count. `QueryResponseCache::invalidate` scopes this to
    /// `CacheType::QueryResponse` only, per §4.9.
    async fn delete_by_project(
        &self,
        project_id: &ProjectId,
        cache_type: CacheType,
    ) -> RagResult<i32>;
}
