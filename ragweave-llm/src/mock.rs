//! Deterministic mock providers for tests.

use crate::provider::{EmbeddingProvider, LlmProvider, OperationType};
use async_trait::async_trait;
use ragweave_core::{sha256_hex, ConversationTurn, RagResult};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Returns queued canned responses in order; once exhausted, echoes the
/// user prompt back. Good enough to drive keyword-extraction and
/// summarization tests without a real model.
#[derive(Default)]
pub struct MockLlmProvider {
    responses: Mutex<VecDeque<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub async fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().await.push_back(response.into());
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn apply(
        &self,
        user_prompt: &str,
        _system_prompt: &str,
        _history: &[ConversationTurn],
        _operation_type: Option<OperationType>,
    ) -> RagResult<String> {
        let mut responses = self.responses.lock().await;
        Ok(responses.pop_front().unwrap_or_else(|| user_prompt.to_string()))
    }
}

/// Deterministic embedding derived from the SHA-256 digest of the input
/// text, spread across `dimensions` floats in `[0, 1)`. Not semantically
/// meaningful, but stable and project-independent — sufficient for
/// exercising cosine-similarity ranking in tests.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_single(&self, text: &str) -> RagResult<Vec<f32>> {
        let digest = sha256_hex(text.as_bytes());
        let bytes = digest.as_bytes();
        let mut vector = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let byte = bytes[i % bytes.len()];
            vector.push(byte as f32 / 255.0);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
