//! Error taxonomy for the RAGweave query engine.

use thiserror::Error;

/// Coarse classification of a native storage failure.
///
/// Populated by storage collaborators that can tell transient conditions
/// (dropped connection, timeout) apart from everything else at the point
/// the error is raised, without inspecting SQLSTATE or the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    TransientConnection,
    Timeout,
    Other,
}

/// An error surfaced by a storage collaborator (KV, vector, graph, cache).
///
/// Carries an optional SQLSTATE and an optional link to the error it
/// wraps, so [`crate::transient::is_transient`] can walk the whole chain
/// the way the source system's retry layer does.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<StorageError>>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Other,
            sqlstate: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_kind(mut self, kind: StorageErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    pub fn with_source(mut self, source: StorageError) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// LLM and embedding provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    ProviderNotConfigured,

    #[error("request to {provider} failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Configuration errors raised by [`crate::config::RagConfig::validate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for RAGweave operations.
///
/// Mirrors the §7 taxonomy directly as variants, rather than as a
/// separate classification layered over a single error type, so an
/// outer retry policy can `match` on it without re-deriving the
/// classification.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transient storage error: {0}")]
    Transient(#[source] StorageError),

    #[error("permanent storage error: {0}")]
    Permanent(#[source] StorageError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline stage '{stage}' failed")]
    Pipeline {
        stage: String,
        #[source]
        cause: Box<RagError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Classify a raw storage error per §4.3 and wrap it as
    /// [`RagError::Transient`] or [`RagError::Permanent`].
    pub fn from_storage(err: StorageError) -> Self {
        if crate::transient::is_transient(&err) {
            RagError::Transient(err)
        } else {
            RagError::Permanent(err)
        }
    }

    pub fn pipeline(stage: impl Into<String>, cause: RagError) -> Self {
        RagError::Pipeline {
            stage: stage.into(),
            cause: Box::new(cause),
        }
    }
}

/// Result type alias for RAGweave operations.
pub type RagResult<T> = Result<T, RagError>;
