//! Enumerations used across the retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieval strategy requested by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Naive,
    Local,
    Global,
    Hybrid,
    Mix,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Naive => "NAIVE",
            Mode::Local => "LOCAL",
            Mode::Global => "GLOBAL",
            Mode::Hybrid => "HYBRID",
            Mode::Mix => "MIX",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NAIVE" => Ok(Mode::Naive),
            "LOCAL" => Ok(Mode::Local),
            "GLOBAL" => Ok(Mode::Global),
            "HYBRID" => Ok(Mode::Hybrid),
            "MIX" => Ok(Mode::Mix),
            _ => Err(format!("invalid mode: {s}")),
        }
    }
}

/// Discriminator for a [`crate::entities::ContextItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextItemType {
    Entity,
    Relation,
    Chunk,
}

/// Discriminator for a [`crate::entities::SourceChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceChunkType {
    Chunk,
    Entity,
    Relation,
}

/// Cache row kind — together with `(projectId, contentHash)` forms the
/// uniqueness key of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheType {
    KeywordExtraction,
    QueryResponse,
    Summarization,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::KeywordExtraction => "KEYWORD_EXTRACTION",
            CacheType::QueryResponse => "QUERY_RESPONSE",
            CacheType::Summarization => "SUMMARIZATION",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order in which MergeStage presents the truncated source lists to
/// ContextMerger (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeOrder {
    EntityRelationChunk,
    ChunkEntityRelation,
    RelationEntityChunk,
}

/// Chunk-selection strategy (§4.6). Resolved from configuration by a
/// case-insensitive factory; unknown values fall back to `Vector` with a
/// warning logged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkSelectionStrategy {
    Vector,
    Weighted,
}

impl fmt::Display for ChunkSelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkSelectionStrategy::Vector => "vector",
            ChunkSelectionStrategy::Weighted => "weighted",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ChunkSelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vector" => Ok(ChunkSelectionStrategy::Vector),
            "weighted" => Ok(ChunkSelectionStrategy::Weighted),
            _ => Err(format!("invalid chunk selection strategy: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        for mode in [Mode::Naive, Mode::Local, Mode::Global, Mode::Hybrid, Mode::Mix] {
            let parsed: Mode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn mode_from_str_is_case_insensitive() {
        assert_eq!("naive".parse::<Mode>().unwrap(), Mode::Naive);
        assert_eq!("Hybrid".parse::<Mode>().unwrap(), Mode::Hybrid);
    }

    #[test]
    fn unknown_mode_is_err() {
        assert!("bogus".parse::<Mode>().is_err());
    }

    #[test]
    fn chunk_selection_strategy_defaults_are_parseable() {
        assert_eq!(
            "VECTOR".parse::<ChunkSelectionStrategy>().unwrap(),
            ChunkSelectionStrategy::Vector
        );
        assert_eq!(
            "weighted".parse::<ChunkSelectionStrategy>().unwrap(),
            ChunkSelectionStrategy::Weighted
        );
        assert!("bogus".parse::<ChunkSelectionStrategy>().is_err());
    }
}
