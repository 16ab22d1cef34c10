//! LLM and embedding provider traits (§6).
//!
//! Transport is out of scope per spec.md's Non-goals — this crate
//! declares the collaborator interfaces the retrieval core calls
//! through, grounded on the teacher's `EmbeddingProvider` and
//! `SummarizationProvider` traits (`caliber-llm::lib`), generalized to
//! the single `apply` entry point the retrieval core actually needs.

use async_trait::async_trait;
use ragweave_core::RagResult;

/// Tags an LLM call for token-usage accounting, carried via `kwargs` in
/// the source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    KeywordExtraction,
    Summarization,
    Answer,
}

/// A chat-style LLM collaborator. `apply` is the one entry point every
/// mode executor, the keyword extractor, and the description
/// summarizer call through.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn apply(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        history: &[ragweave_core::ConversationTurn],
        operation_type: Option<OperationType>,
    ) -> RagResult<String>;
}

/// Single-text embedding collaborator.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_single(&self, text: &str) -> RagResult<Vec<f32>>;

    /// Dimensionality of vectors this provider returns. Implementations
    /// that can't know this statically may compute it from a sample
    /// embedding.
    fn dimensions(&self) -> usize;
}
