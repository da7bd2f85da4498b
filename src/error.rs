//! Error taxonomy for pipeline operations.
//!
//! Every variant carries enough context (stage, status, reason) for a caller
//! to resume by re-invoking `advance` on the same session.

use thiserror::Error;

use crate::core::StageKind;
use crate::domain::SessionStatus;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Errors surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed caller input, rejected before any stage runs
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stage's provider call failed or returned unusable data
    #[error("Stage '{stage}' failed at status {status}: {reason}")]
    Provider {
        stage: StageKind,
        status: SessionStatus,
        reason: String,
        retryable: bool,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Publishing failed; the draft is unchanged
    #[error("Publishing draft {draft_id} failed: {reason}")]
    Publish { draft_id: String, reason: String },

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn session_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Session",
            id: id.to_string(),
        }
    }

    pub fn draft_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Draft",
            id: id.to_string(),
        }
    }

    /// Whether re-invoking the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::Publish { .. } | Self::Store(_) => true,
            Self::Validation(_) | Self::NotFound { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display_has_context() {
        let err = PipelineError::Provider {
            stage: StageKind::GenerateConcepts,
            status: SessionStatus::TopicsCollected,
            reason: "no concepts returned".to_string(),
            retryable: true,
        };

        let message = err.to_string();
        assert!(message.contains("generate_concepts"));
        assert!(message.contains("TOPICS_COLLECTED"));
        assert!(message.contains("no concepts returned"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = PipelineError::draft_not_found("drf_123");
        assert_eq!(err.to_string(), "Draft not found: drf_123");
        assert!(!err.is_retryable());
    }
}
