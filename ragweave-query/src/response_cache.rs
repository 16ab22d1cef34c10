//! C9: QueryResponseCache — content-addressed response cache keyed by
//! (query, mode, topK, chunkTopK); project-scoped invalidation.

use ragweave_core::{sha256_hex, CacheType, Mode, ProjectId, RagResult};
use ragweave_storage::ExtractionCacheStorage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Minimal cached payload (§4.9) — source chunks are deliberately never
/// cached, to bound cache storage size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedResponse {
    answer: String,
    mode: Mode,
    total_sources: i32,
}

/// Outcome of a cache hit: an answer, its mode, and the source count it
/// was originally produced with. Source chunks are always empty on a
/// cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQueryResult {
    pub answer: String,
    pub mode: Mode,
    pub total_sources: i32,
}

pub struct QueryResponseCache {
    cache: Arc<dyn ExtractionCacheStorage>,
}

impl QueryResponseCache {
    pub fn new(cache: Arc<dyn ExtractionCacheStorage>) -> Self {
        Self { cache }
    }

    /// `projectId` is deliberately excluded from the key material — it's
    /// an independent dimension carried by the persistent cache row, not
    /// part of the content hash (§4.9, Property 1).
    pub fn cache_key(query: &str, mode: Mode, top_k: i32, chunk_top_k: i32) -> String {
        let material = format!("{query}|{mode}|{top_k}|{chunk_top_k}");
        sha256_hex(material.as_bytes())
    }

    pub async fn get(
        &self,
        project_id: &ProjectId,
        query: &str,
        mode: Mode,
        top_k: i32,
        chunk_top_k: i32,
    ) -> Option<CachedQueryResult> {
        let key = Self::cache_key(query, mode, top_k, chunk_top_k);
        match self.cache.get(project_id, CacheType::QueryResponse, &key).await {
            Ok(Some(entry)) => serde_json::from_str::<CachedResponse>(&entry.result).ok().map(|cached| {
                CachedQueryResult {
                    answer: cached.answer,
                    mode: cached.mode,
                    total_sources: cached.total_sources,
                }
            }),
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(error = %err, "response cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn store(
        &self,
        project_id: &ProjectId,
        query: &str,
        mode: Mode,
        top_k: i32,
        chunk_top_k: i32,
        answer: &str,
        total_sources: i32,
    ) {
        let key = Self::cache_key(query, mode, top_k, chunk_top_k);
        let payload = CachedResponse {
            answer: answer.to_string(),
            mode,
            total_sources,
        };
        let Ok(serialized) = serde_json::to_string(&payload) else {
            return;
        };
        if let Err(err) = self
            .cache
            .store(project_id, CacheType::QueryResponse, None, &key, serialized, None)
            .await
        {
            tracing::debug!(error = %err, "response cache write failed");
        }
    }

    /// Deletes all `QUERY_RESPONSE` rows for `project_id`. Failures are
    /// non-fatal: logged at warn and reported as zero deletions (§7).
    pub async fn invalidate(&self, project_id: &ProjectId) -> RagResult<i32> {
        match self.cache.delete_by_project(project_id, CacheType::QueryResponse).await {
            Ok(count) => Ok(count),
            Err(err) => {
                tracing::warn!(error = %err, "response cache invalidation failed");
                Ok(0)
            }
        }
    }
}
