//! Configuration surface (§6). ALL values are required — no defaults are
//! buried in business logic; `RagConfig::default()` centralizes the
//! documented defaults so callers opt into them explicitly.

use crate::enums::{ChunkSelectionStrategy, MergeOrder};
use crate::error::{ConfigError, RagError, RagResult};
use serde::{Deserialize, Serialize};

/// Token-budget allocation for context assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_tokens: i32,
    pub chunk_budget_ratio: f32,
    pub entity_budget_ratio: f32,
    pub relation_budget_ratio: f32,
    pub merge_order: MergeOrder,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            chunk_budget_ratio: 0.30,
            entity_budget_ratio: 0.40,
            relation_budget_ratio: 0.30,
            merge_order: MergeOrder::EntityRelationChunk,
        }
    }
}

impl ContextConfig {
    /// True when the three ratios sum to 1.0 within ±0.01 (§4.1 edge case).
    /// A violation is non-fatal: callers log a warning and proceed.
    pub fn ratios_balanced(&self) -> bool {
        let sum = self.chunk_budget_ratio + self.entity_budget_ratio + self.relation_budget_ratio;
        (sum - 1.0).abs() <= 0.01
    }
}

/// Keyword-extraction configuration (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordExtractionConfig {
    pub enabled: bool,
    pub cache_ttl_secs: u64,
    pub l1_cache_ttl_secs: u64,
    pub l1_cache_max_entries: usize,
}

impl Default for KeywordExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_secs: 3600,
            l1_cache_ttl_secs: 300,
            l1_cache_max_entries: 1000,
        }
    }
}

/// Chunk-selection configuration (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSelectionConfig {
    pub strategy: ChunkSelectionStrategy,
    pub entity_boost: f64,
    pub partial_entity_boost: f64,
    pub relation_keyword_boost: f64,
    pub search_multiplier: i32,
}

impl Default for ChunkSelectionConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkSelectionStrategy::Vector,
            entity_boost: 0.30,
            partial_entity_boost: 0.15,
            relation_keyword_boost: 0.20,
            search_multiplier: 2,
        }
    }
}

/// Description-summarization configuration (§4.10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionConfig {
    pub summarization_threshold: i32,
    pub max_tokens: i32,
    pub separator: String,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            summarization_threshold: 300,
            max_tokens: 500,
            separator: " | ".to_string(),
        }
    }
}

/// Master configuration for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RagConfig {
    pub context: ContextConfig,
    pub keyword_extraction: KeywordExtractionConfig,
    pub chunk_selection: ChunkSelectionConfig,
    pub description: DescriptionConfig,
}

impl RagConfig {
    /// Validates the hard constraints from §4.1/§4.10. Ratio-sum
    /// violations are intentionally not validated here — per spec they
    /// are a warning, not a construction-time error — callers should
    /// check `ContextConfig::ratios_balanced` and log separately.
    pub fn validate(&self) -> RagResult<()> {
        if self.context.max_tokens <= 0 {
            return Err(RagError::Config(ConfigError::InvalidValue {
                field: "context.max_tokens".to_string(),
                value: self.context.max_tokens.to_string(),
                reason: "max_tokens must be greater than 0".to_string(),
            }));
        }

        if self.description.summarization_threshold <= 0 {
            return Err(RagError::Config(ConfigError::InvalidValue {
                field: "description.summarization_threshold".to_string(),
                value: self.description.summarization_threshold.to_string(),
                reason: "summarization_threshold must be greater than 0".to_string(),
            }));
        }

        if self.description.max_tokens <= 0 {
            return Err(RagError::Config(ConfigError::InvalidValue {
                field: "description.max_tokens".to_string(),
                value: self.description.max_tokens.to_string(),
                reason: "max_tokens must be greater than 0".to_string(),
            }));
        }

        if self.chunk_selection.search_multiplier <= 0 {
            return Err(RagError::Config(ConfigError::InvalidValue {
                field: "chunk_selection.search_multiplier".to_string(),
                value: self.chunk_selection.search_multiplier.to_string(),
                reason: "search_multiplier must be greater than 0".to_string(),
            }));
        }

        if self.keyword_extraction.l1_cache_max_entries == 0 {
            return Err(RagError::Config(ConfigError::InvalidValue {
                field: "keyword_extraction.l1_cache_max_entries".to_string(),
                value: "0".to_string(),
                reason: "l1_cache_max_entries must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_tokens_is_invalid() {
        let mut cfg = RagConfig::default();
        cfg.context.max_tokens = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_ratios_are_balanced() {
        assert!(ContextConfig::default().ratios_balanced());
    }

    #[test]
    fn unbalanced_ratios_are_detected_but_not_a_validation_error() {
        let mut cfg = RagConfig::default();
        cfg.context.chunk_budget_ratio = 0.5;
        assert!(!cfg.context.ratios_balanced());
        assert!(cfg.validate().is_ok());
    }
}
