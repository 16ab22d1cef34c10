//! In-memory reference implementations of the four storage traits.
//!
//! Grounded on the teacher's `MockStorage` (`Arc<RwLock<HashMap<...>>>`
//! per entity type, plus small `*_count`/`clear` test helpers). Used by
//! `ragweave-query`'s own test suite and available to downstream
//! integrators as a starting point.

use crate::traits::{
    ExtractionCacheStorage, GraphStorage, KVStorage, VectorFilter, VectorResultMetadata,
    VectorSearchResult, VectorStorage,
};
use async_trait::async_trait;
use ragweave_core::{CacheEntry, CacheType, Entity, ProjectId, RagResult, Relation};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A vector row as stored by [`MockVectorStorage`]: an id, its
/// embedding, a score-independent payload, and the project/type it's
/// scoped to.
#[derive(Debug, Clone)]
pub struct MockVectorRow {
    pub id: String,
    pub embedding: Vec<f32>,
    pub project_id: ProjectId,
    pub item_type: String,
    pub metadata: VectorResultMetadata,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MockKVStorage {
    rows: RwLock<HashMap<String, String>>,
}

impl MockKVStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.rows.write().await.insert(key.into(), value.into());
    }
}

#[async_trait]
impl KVStorage for MockKVStorage {
    async fn get(&self, key: &str) -> RagResult<Option<String>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn keys(&self) -> RagResult<Vec<String>> {
        Ok(self.rows.read().await.keys().cloned().collect())
    }
}

/// In-memory vector index with brute-force cosine similarity.
#[derive(Debug, Default)]
pub struct MockVectorStorage {
    rows: RwLock<Vec<MockVectorRow>>,
}

impl MockVectorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, row: MockVectorRow) {
        self.rows.write().await.push(row);
    }

    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }
}

#[async_trait]
impl VectorStorage for MockVectorStorage {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: i32,
        filter: VectorFilter,
    ) -> RagResult<Vec<VectorSearchResult>> {
        let rows = self.rows.read().await;
        let mut scored: Vec<VectorSearchResult> = rows
            .iter()
            .filter(|row| row.project_id == filter.project_id && row.item_type == filter.item_type)
            .filter(|row| match &filter.id_subset {
                Some(subset) => subset.contains(&row.id),
                None => true,
            })
            .map(|row| VectorSearchResult {
                id: row.id.clone(),
                score: cosine_similarity(embedding, &row.embedding),
                metadata: row.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(0) as usize);
        Ok(scored)
    }
}

/// In-memory knowledge graph keyed by `(project, entity name lowercased)`.
#[derive(Debug, Default)]
pub struct MockGraphStorage {
    entities: RwLock<HashMap<(ProjectId, String), Entity>>,
    relations: RwLock<HashMap<ProjectId, Vec<Relation>>>,
}

impl MockGraphStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_entity(&self, project_id: ProjectId, entity: Entity) {
        let key = (project_id, entity.name.to_lowercase());
        self.entities.write().await.insert(key, entity);
    }

    pub async fn insert_relation(&self, project_id: ProjectId, relation: Relation) {
        self.relations.write().await.entry(project_id).or_default().push(relation);
    }
}

#[async_trait]
impl GraphStorage for MockGraphStorage {
    async fn get_entities(&self, project_id: &ProjectId, names: &[String]) -> RagResult<Vec<Entity>> {
        let entities = self.entities.read().await;
        Ok(names
            .iter()
            .filter_map(|name| entities.get(&(project_id.clone(), name.to_lowercase())).cloned())
            .collect())
    }

    async fn get_relations_for_entity(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> RagResult<Vec<Relation>> {
        let relations = self.relations.read().await;
        Ok(relations
            .get(project_id)
            .map(|rels| {
                rels.iter()
                    .filter(|r| {
                        r.src_id.eq_ignore_ascii_case(name) || r.tgt_id.eq_ignore_ascii_case(name)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_entity_description(
        &self,
        project_id: &ProjectId,
        name: &str,
        entity_type: Option<&str>,
        description: &str,
    ) -> RagResult<()> {
        let key = (project_id.clone(), name.to_lowercase());
        let mut entities = self.entities.write().await;
        match entities.get_mut(&key) {
            Some(entity) => {
                entity.description = description.to_string();
                Ok(())
            }
            None => {
                entities.insert(
                    key,
                    Entity {
                        name: name.to_string(),
                        entity_type: entity_type.map(|s| s.to_string()),
                        description: description.to_string(),
                        source_id: String::new(),
                        file_path: None,
                        source_chunk_ids: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }
}

/// In-memory extraction/response/summarization cache.
#[derive(Debug, Default)]
pub struct MockExtractionCacheStorage {
    rows: RwLock<HashMap<(ProjectId, CacheType, String), CacheEntry>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl MockExtractionCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtractionCacheStorage for MockExtractionCacheStorage {
    async fn get(
        &self,
        project_id: &ProjectId,
        cache_type: CacheType,
        content_hash: &str,
    ) -> RagResult<Option<CacheEntry>> {
        let key = (project_id.clone(), cache_type, content_hash.to_string());
        Ok(self.rows.read().await.get(&key).cloned())
    }

    async fn store(
        &self,
        project_id: &ProjectId,
        cache_type: CacheType,
        chunk_id: Option<String>,
        content_hash: &str,
        result: String,
        tokens_used: Option<i32>,
    ) -> RagResult<String> {
        let entry = CacheEntry {
            project_id: project_id.clone(),
            cache_type,
            chunk_id,
            content_hash: content_hash.to_string(),
            result,
            tokens_used,
            created_at: chrono::Utc::now(),
        };
        let key = (project_id.clone(), cache_type, content_hash.to_string());
        self.rows.write().await.insert(key, entry);
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(format!("cache-{id}"))
    }

    async fn delete_by_project(&self, project_id: &ProjectId, cache_type: CacheType) -> RagResult<i32> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(pid, ct, _), _| !(pid == project_id && *ct == cache_type));
        Ok((before - rows.len()) as i32)
    }
}

/// Bundles the four mock stores behind `Arc` for convenient test wiring.
#[derive(Clone)]
pub struct MockStorageBundle {
    pub kv: Arc<MockKVStorage>,
    pub vector: Arc<MockVectorStorage>,
    pub graph: Arc<MockGraphStorage>,
    pub cache: Arc<MockExtractionCacheStorage>,
}

impl MockStorageBundle {
    pub fn new() -> Self {
        Self {
            kv: Arc::new(MockKVStorage::new()),
            vector: Arc::new(MockVectorStorage::new()),
            graph: Arc::new(MockGraphStorage::new()),
            cache: Arc::new(MockExtractionCacheStorage::new()),
        }
    }
}

impl Default for MockStorageBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, embedding: Vec<f32>, project_id: ProjectId) -> MockVectorRow {
        MockVectorRow {
            id: id.to_string(),
            embedding,
            project_id,
            item_type: "chunk".to_string(),
            metadata: VectorResultMetadata {
                content: format!("content-{id}"),
                document_id: None,
                chunk_index: Some(0),
                item_type: "chunk".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn kv_roundtrip() {
        let kv = MockKVStorage::new();
        kv.put("k1", "v1").await;
        assert_eq!(kv.get("k1").await.unwrap(), Some("v1".to_string()));
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn vector_query_respects_project_scope_and_top_k() {
        let store = MockVectorStorage::new();
        let p1 = ProjectId::new("p1");
        let p2 = ProjectId::new("p2");
        store.insert(row("a", vec![1.0, 0.0], p1.clone())).await;
        store.insert(row("b", vec![0.9, 0.1], p1.clone())).await;
        store.insert(row("c", vec![1.0, 0.0], p2.clone())).await;

        let results = store
            .query(&[1.0, 0.0], 1, VectorFilter::new("chunk", p1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn graph_upsert_then_fetch() {
        let graph = MockGraphStorage::new();
        let project_id = ProjectId::new("p1");
        graph
            .upsert_entity_description(&project_id, "Warren", Some("person"), "An investor")
            .await
            .unwrap();
        let entities = graph
            .get_entities(&project_id, &["warren".to_string()])
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].description, "An investor");
    }

    #[tokio::test]
    async fn cache_delete_by_project_scoped_to_cache_type() {
        let cache = MockExtractionCacheStorage::new();
        let project_id = ProjectId::new("p1");
        cache
            .store(&project_id, CacheType::QueryResponse, None, "h1", "{}".into(), None)
            .await
            .unwrap();
        cache
            .store(&project_id, CacheType::KeywordExtraction, None, "h2", "{}".into(), None)
            .await
            .unwrap();

        let deleted = cache
            .delete_by_project(&project_id, CacheType::QueryResponse)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(cache
            .get(&project_id, CacheType::KeywordExtraction, "h2")
            .await
            .unwrap()
            .is_some());
    }
}
