//! Core data types of the retrieval engine (§3). Pure data, no behavior
//! beyond the small invariant-preserving helpers noted per type.

use crate::enums::{CacheType, ContextItemType, Mode, SourceChunkType};
use crate::identity::{normalize_pair_key, ProjectId, Timestamp};
use serde::{Deserialize, Serialize};

/// A knowledge-graph node. `name` + `type` (case-insensitive) is the
/// project-scoped primary key (Invariant 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: Option<String>,
    pub description: String,
    pub source_id: String,
    pub file_path: Option<String>,
    pub source_chunk_ids: Vec<String>,
}

impl Entity {
    /// Key used for type-safe comparisons: same name with differently
    /// cased types (e.g. "Person" vs "person") collapse to the same key,
    /// but distinct types never do (Invariant 1).
    pub fn type_key(&self) -> String {
        format!(
            "{}::{}",
            self.name,
            self.entity_type
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
        )
    }

    /// Adds a chunk id to the provenance set if not already present.
    pub fn add_source_chunk(&mut self, chunk_id: impl Into<String>) {
        let chunk_id = chunk_id.into();
        if !self.source_chunk_ids.contains(&chunk_id) {
            self.source_chunk_ids.push(chunk_id);
        }
    }
}

/// A knowledge-graph edge. Undirected for traversal purposes; pairs are
/// identified by the normalized pair key (Invariant 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub src_id: String,
    pub tgt_id: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub weight: f64,
    pub file_path: Option<String>,
}

impl Relation {
    pub fn pair_key(&self) -> String {
        normalize_pair_key(&self.src_id, &self.tgt_id)
    }
}

/// A retrieved source slice, prior to truncation/merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub chunk_id: String,
    pub content: String,
    pub relevance_score: f64,
    pub document_id: Option<String>,
    pub source_id: String,
    pub chunk_index: i32,
    pub chunk_type: SourceChunkType,
}

/// A single piece of context destined for the final prompt. `tokens`
/// must be non-negative (Invariant 4); callers that receive a zero
/// token count on ingress are expected to re-estimate it before
/// constructing one of these (the estimator lives in `ragweave-context`,
/// which this crate does not depend on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub content: String,
    pub item_type: ContextItemType,
    pub source_id: String,
    pub file_path: Option<String>,
    pub tokens: i32,
}

/// Result of keyword extraction (§4.4). Keywords are already lowercased
/// and stopword-stripped by the LLM prompt contract; this type enforces
/// no further normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub high_level_keywords: Vec<String>,
    pub low_level_keywords: Vec<String>,
    pub query_hash: String,
    pub cached_at: Option<Timestamp>,
}

impl KeywordResult {
    /// The result returned when extraction is disabled or fails; failure
    /// is swallowed per §7 rather than propagated.
    pub fn empty(query_hash: impl Into<String>) -> Self {
        Self {
            high_level_keywords: Vec::new(),
            low_level_keywords: Vec::new(),
            query_hash: query_hash.into(),
            cached_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.high_level_keywords.is_empty() && self.low_level_keywords.is_empty()
    }
}

/// A single turn of prior conversation, threaded into the final prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Parameters controlling one query (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub mode: Mode,
    pub project_id: ProjectId,
    pub top_k: i32,
    pub chunk_top_k: i32,
    pub only_need_context: bool,
    pub only_need_prompt: bool,
    pub response_type: Option<String>,
    pub conversation_history: Vec<ConversationTurn>,
}

impl QueryParam {
    /// The four fields that determine the response-cache key (Property 1).
    /// Field order here never affects the resulting hash: the cache key
    /// builder formats them into a fixed-order string.
    pub fn cache_fields(&self) -> (Mode, i32, i32) {
        (self.mode, self.top_k, self.chunk_top_k)
    }
}

/// A row in the persistent extraction/response/summarization cache.
/// Uniqueness key: `(project_id, cache_type, content_hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub project_id: ProjectId,
    pub cache_type: CacheType,
    pub chunk_id: Option<String>,
    pub content_hash: String,
    pub result: String,
    pub tokens_used: Option<i32>,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_key_is_case_insensitive_on_type_only() {
        let mut a = entity("warren", Some("Person"));
        let b = entity("warren", Some("person"));
        assert_eq!(a.type_key(), b.type_key());

        let c = entity("Warren", Some("Person"));
        assert_ne!(a.type_key(), c.type_key(), "name stays case-sensitive");

        a.add_source_chunk("c1");
        a.add_source_chunk("c1");
        assert_eq!(a.source_chunk_ids, vec!["c1".to_string()]);
    }

    #[test]
    fn distinct_types_never_collapse() {
        let a = entity("warren", Some("person"));
        let b = entity("warren", Some("company"));
        assert_ne!(a.type_key(), b.type_key());
    }

    #[test]
    fn relation_pair_key_is_order_independent() {
        let r1 = relation("a", "b");
        let r2 = relation("b", "a");
        assert_eq!(r1.pair_key(), r2.pair_key());
    }

    #[test]
    fn keyword_result_empty_has_no_keywords() {
        let kr = KeywordResult::empty("hash");
        assert!(kr.is_empty());
    }

    fn entity(name: &str, entity_type: Option<&str>) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: entity_type.map(|s| s.to_string()),
            description: String::new(),
            source_id: "s1".to_string(),
            file_path: None,
            source_chunk_ids: Vec::new(),
        }
    }

    fn relation(src: &str, tgt: &str) -> Relation {
        Relation {
            src_id: src.to_string(),
            tgt_id: tgt.to_string(),
            description: String::new(),
            keywords: Vec::new(),
            weight: 1.0,
            file_path: None,
        }
    }
}
