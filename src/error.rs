//! Error taxonomy for the chunk materialization pipeline

use thiserror::Error;

/// Result type alias used throughout the pipeline.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// The seven error kinds the orchestrator dispatches on.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pre-flight validation failure; no side effects have occurred.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Timeout, 5xx, or connection reset against an external endpoint. Retried
    /// at sub-batch granularity.
    #[error("transient remote error calling {endpoint}: {detail}")]
    TransientRemote { endpoint: String, detail: String },

    /// 4xx from the parse service or chunk store. Never retried.
    #[error("permanent remote error calling {endpoint}: {detail}")]
    PermanentRemote { endpoint: String, detail: String },

    /// The parse service returned no `md_content`. Fatal for the document.
    #[error("parse service returned no markdown content for document {doc_id}")]
    ParseFailure { doc_id: String },

    /// An encode call failed after retries. Fatal for the batch, not the document.
    #[error("embedding batch {batch_index} failed: {detail}")]
    EmbeddingFailure { batch_index: usize, detail: String },

    /// A sub-batch insert failed after retries. Fatal for that sub-batch only.
    #[error("store sub-batch {sub_batch_index} failed: {detail}")]
    StoreFailure { sub_batch_index: usize, detail: String },

    /// Layout JSON malformed or positions internally inconsistent.
    #[error("integrity error resolving positions: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the BatchWriter should retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientRemote { .. } | PipelineError::Http(_)
        )
    }

    /// Coarse category used for logging and the caller-facing envelope.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::TransientRemote { .. } => "transient_remote",
            PipelineError::PermanentRemote { .. } => "permanent_remote",
            PipelineError::ParseFailure { .. } => "parse_failure",
            PipelineError::EmbeddingFailure { .. } => "embedding_failure",
            PipelineError::StoreFailure { .. } => "store_failure",
            PipelineError::Integrity(_) => "integrity",
            PipelineError::Config(_) => "config",
            PipelineError::Io(_) => "io",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Http(_) => "http",
            PipelineError::Database(_) => "database",
            PipelineError::Other(_) => "other",
        }
    }

    /// Whether this error is fatal for the whole document rather than one batch.
    pub fn is_document_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::ParseFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_remote_is_retryable() {
        let err = PipelineError::TransientRemote {
            endpoint: "http://parse".into(),
            detail: "timeout".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "transient_remote");
    }

    #[test]
    fn permanent_remote_is_not_retryable() {
        let err = PipelineError::PermanentRemote {
            endpoint: "http://parse".into(),
            detail: "400".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_and_parse_failure_are_document_fatal() {
        assert!(PipelineError::Validation("bad".into()).is_document_fatal());
        assert!(PipelineError::ParseFailure {
            doc_id: "d1".into()
        }
        .is_document_fatal());
        assert!(!PipelineError::StoreFailure {
            sub_batch_index: 0,
            detail: "x".into()
        }
        .is_document_fatal());
    }
}
