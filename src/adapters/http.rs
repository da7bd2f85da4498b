//! JSON-over-HTTP clients for the generation services and the publisher.
//!
//! Endpoints (relative to the provider base URL):
//! - POST /topics   → `{"topics": [...]}`
//! - POST /concepts → `{"concepts": [...]}`
//! - POST /contents → `{"contents": [...]}`
//!
//! The publisher is a single endpoint: POST `{"text": ...}` → `{"url": ...}`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    ConceptGenerator, ConceptRequest, ContentFinalizer, FinalizeRequest, ProviderError,
    PublishFailure, Published, Publisher, TopicCollector, TopicRequest,
};
use crate::domain::{Concept, Content, Topic};

/// Generation services behind one base URL
pub struct HttpStageProvider {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct ConceptsResponse {
    concepts: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    contents: Vec<Content>,
}

impl HttpStageProvider {
    /// Create a client with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build endpoint URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = format!("{} returned {}: {}", url, status, text.trim());
            return Err(if is_retryable_status(status) {
                ProviderError::retryable(reason)
            } else {
                ProviderError::fatal(reason)
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ProviderError::retryable(format!("malformed response from {}: {}", url, e)))
    }
}

/// Transport failures and timeouts are always worth retrying
fn transport_error(url: &str, error: &reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::retryable(format!("{} timed out: {}", url, error))
    } else {
        ProviderError::retryable(format!("request to {} failed: {}", url, error))
    }
}

/// 5xx and 429 are transient; other 4xx are upstream rejections
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl TopicCollector for HttpStageProvider {
    async fn collect_topics(&self, request: &TopicRequest) -> Result<Vec<Topic>, ProviderError> {
        let response: TopicsResponse = self.post_json("topics", request).await?;
        Ok(response.topics)
    }
}

#[async_trait]
impl ConceptGenerator for HttpStageProvider {
    async fn generate_concepts(
        &self,
        request: &ConceptRequest,
    ) -> Result<Vec<Concept>, ProviderError> {
        let response: ConceptsResponse = self.post_json("concepts", request).await?;
        Ok(response.concepts)
    }
}

#[async_trait]
impl ContentFinalizer for HttpStageProvider {
    async fn finalize_content(
        &self,
        request: &FinalizeRequest,
    ) -> Result<Vec<Content>, ProviderError> {
        let response: ContentsResponse = self.post_json("contents", request).await?;
        Ok(response.contents)
    }
}

/// Publishing client posting text to a single endpoint
pub struct HttpPublisher {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PublishPayload<'a> {
    text: &'a str,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build publisher HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            token: None,
            client,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, text: &str) -> Result<Published, PublishFailure> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&PublishPayload { text });

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PublishFailure::new(format!("Failed to reach publisher: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PublishFailure::new(format!(
                "Publisher error ({}): {}",
                status,
                text.trim()
            )));
        }

        response
            .json::<Published>()
            .await
            .map_err(|e| PublishFailure::new(format!("Failed to parse publisher response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let provider =
            HttpStageProvider::new("http://localhost:3000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            provider.endpoint("concepts"),
            "http://localhost:3000/api/concepts"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_response_shapes() {
        let topics: TopicsResponse =
            serde_json::from_str(r#"{"topics":[{"title":"Remote teams","summary":"s"}]}"#)
                .unwrap();
        assert_eq!(topics.topics.len(), 1);

        let contents: ContentsResponse =
            serde_json::from_str(r#"{"contents":[{"text":"post","concept_id":"c1"}]}"#).unwrap();
        assert_eq!(contents.contents[0].concept_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_retryable() {
        let provider =
            HttpStageProvider::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let request = TopicRequest {
            theme: "t".to_string(),
            platform: "p".to_string(),
            style: "s".to_string(),
        };

        let err = provider.collect_topics(&request).await.unwrap_err();
        assert!(err.retryable);
    }
}
