//! Adapter interfaces for external generation and publishing services.
//!
//! Each stage provider is a request/response operation over a session's
//! current artifacts. The orchestrator only sees these traits; `http`
//! provides the concrete JSON-over-HTTP clients.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Concept, Content, Session, Topic};

pub use http::{HttpPublisher, HttpStageProvider};

/// Failure of a generation provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ProviderError {
    pub reason: String,

    /// Transient failures (timeouts, malformed data) may succeed on retry;
    /// upstream rejections will not
    pub retryable: bool,
}

impl ProviderError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Input for the collect stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub theme: String,
    pub platform: String,
    pub style: String,
}

/// Input for the conceptualize stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRequest {
    pub theme: String,
    pub platform: String,
    pub style: String,
    pub topics: Vec<Topic>,
}

/// Input for the finalize stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub theme: String,
    pub platform: String,
    pub style: String,

    /// Every generated concept
    pub concepts: Vec<Concept>,

    /// Ids of the concepts to write content for
    pub selected_concept_ids: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

impl TopicRequest {
    pub fn from_session(session: &Session) -> Self {
        Self {
            theme: session.theme.clone(),
            platform: session.platform.clone(),
            style: session.style.clone(),
        }
    }
}

/// Topic-collection service
#[async_trait]
pub trait TopicCollector: Send + Sync {
    async fn collect_topics(&self, request: &TopicRequest) -> Result<Vec<Topic>, ProviderError>;
}

/// Concept-generation service
#[async_trait]
pub trait ConceptGenerator: Send + Sync {
    async fn generate_concepts(
        &self,
        request: &ConceptRequest,
    ) -> Result<Vec<Concept>, ProviderError>;
}

/// Final-content service
#[async_trait]
pub trait ContentFinalizer: Send + Sync {
    async fn finalize_content(
        &self,
        request: &FinalizeRequest,
    ) -> Result<Vec<Content>, ProviderError>;
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Published {
    pub url: String,
}

/// Publishing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PublishFailure {
    pub reason: String,
}

impl PublishFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Social-platform publishing client
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<Published, PublishFailure>;
}

/// The three generation services a pipeline needs
#[derive(Clone)]
pub struct Providers {
    pub topics: Arc<dyn TopicCollector>,
    pub concepts: Arc<dyn ConceptGenerator>,
    pub contents: Arc<dyn ContentFinalizer>,
}

impl Providers {
    pub fn new(
        topics: Arc<dyn TopicCollector>,
        concepts: Arc<dyn ConceptGenerator>,
        contents: Arc<dyn ContentFinalizer>,
    ) -> Self {
        Self {
            topics,
            concepts,
            contents,
        }
    }

    /// Use one service for all three stages
    pub fn from_single<P>(provider: Arc<P>) -> Self
    where
        P: TopicCollector + ConceptGenerator + ContentFinalizer + 'static,
    {
        Self {
            topics: provider.clone(),
            concepts: provider.clone(),
            contents: provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionConfig;

    #[test]
    fn test_provider_error_constructors() {
        assert!(ProviderError::retryable("timeout").retryable);
        assert!(!ProviderError::fatal("rejected").retryable);
        assert_eq!(ProviderError::fatal("rejected").to_string(), "rejected");
    }

    #[test]
    fn test_topic_request_from_session() {
        let session = Session::new(SessionConfig::new("remote work").with_style("casual"));
        let request = TopicRequest::from_session(&session);

        assert_eq!(request.theme, "remote work");
        assert_eq!(request.style, "casual");
        assert_eq!(request.platform, "Twitter");
    }

    #[test]
    fn test_finalize_request_omits_missing_character() {
        let request = FinalizeRequest {
            theme: "t".to_string(),
            platform: "p".to_string(),
            style: "s".to_string(),
            concepts: Vec::new(),
            selected_concept_ids: Vec::new(),
            character_id: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("character_id").is_none());
    }
}
