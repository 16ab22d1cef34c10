//! RAGweave Query - Retrieval Engine
//!
//! Keyword extraction, chunk selection, pipeline stages, mode
//! executors, response caching, description summarization and graph
//! expansion, wired behind [`engine::Engine`].

mod chunk_select;
mod engine;
mod graph_expand;
mod keywords;
mod modes;
mod pipeline;
mod response_cache;
mod summarizer;

pub use chunk_select::{resolve_selector, ChunkSelector, ScoredChunk, SelectionContext};
pub use engine::{Engine, QueryOutcome, ANSWER_SYSTEM_PROMPT};
pub use graph_expand::{expand, ExpansionResult};
pub use keywords::{KeywordExtractor, KEYWORD_EXTRACTION_SYSTEM_PROMPT};
pub use modes::ModeRatios;
pub use pipeline::{Collaborators, PipelineContext, Stage};
pub use response_cache::{CachedQueryResult, QueryResponseCache};
pub use summarizer::{DescriptionSummarizer, SUMMARIZATION_SYSTEM_PROMPT};
