//! Shared fixtures: a scripted provider, a recording store and publisher.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use contentflow::adapters::{ConceptRequest, FinalizeRequest, TopicRequest};
use contentflow::{
    Concept, ConceptGenerator, Content, ContentFinalizer, Draft, InMemoryStore, Orchestrator,
    PipelineSettings, ProviderError, Providers, PublishFailure, Published, Publisher, Session,
    SessionConfig, SessionStore, TopicCollector,
};
use contentflow::Topic;

pub const THEME: &str = "AI and the future of work";

/// Provider returning canned artifacts unless a response is scripted
#[derive(Default)]
pub struct ScriptedProvider {
    topics: Mutex<VecDeque<Result<Vec<Topic>, ProviderError>>>,
    concepts: Mutex<VecDeque<Result<Vec<Concept>, ProviderError>>>,
    contents: Mutex<VecDeque<Result<Vec<Content>, ProviderError>>>,
    calls: AtomicUsize,
    last_finalize: Mutex<Option<FinalizeRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_topics(&self, response: Result<Vec<Topic>, ProviderError>) {
        self.topics.lock().unwrap().push_back(response);
    }

    pub fn script_concepts(&self, response: Result<Vec<Concept>, ProviderError>) {
        self.concepts.lock().unwrap().push_back(response);
    }

    pub fn script_contents(&self, response: Result<Vec<Content>, ProviderError>) {
        self.contents.lock().unwrap().push_back(response);
    }

    /// Provider calls made so far, across all stages
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_finalize_request(&self) -> Option<FinalizeRequest> {
        self.last_finalize.lock().unwrap().clone()
    }
}

/// c2 > c3 > c1 > c4 by score
pub fn default_concepts() -> Vec<Concept> {
    vec![
        Concept::new("c1", "Robots as coworkers", 70.0),
        Concept::new("c2", "The four-day week", 95.0),
        Concept::new("c3", "Prompting is the new typing", 80.0),
        Concept::new("c4", "Careers that AI creates", 60.0),
    ]
}

#[async_trait]
impl TopicCollector for ScriptedProvider {
    async fn collect_topics(&self, _request: &TopicRequest) -> Result<Vec<Topic>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.topics.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(vec![
            Topic::new("Automation at work", "Which jobs change first"),
            Topic::new("Remote collaboration", "AI assistants in meetings"),
            Topic::new("Reskilling", "Learning alongside models"),
        ])
    }
}

#[async_trait]
impl ConceptGenerator for ScriptedProvider {
    async fn generate_concepts(
        &self,
        _request: &ConceptRequest,
    ) -> Result<Vec<Concept>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.concepts.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(default_concepts())
    }
}

#[async_trait]
impl ContentFinalizer for ScriptedProvider {
    async fn finalize_content(
        &self,
        request: &FinalizeRequest,
    ) -> Result<Vec<Content>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_finalize.lock().unwrap() = Some(request.clone());
        if let Some(scripted) = self.contents.lock().unwrap().pop_front() {
            return scripted;
        }

        Ok(request
            .selected_concept_ids
            .iter()
            .map(|id| {
                Content::new(format!("A post about concept {}", id))
                    .for_concept(id.clone())
                    .with_hashtags(["AI", "FutureOfWork"])
            })
            .collect())
    }
}

/// In-memory store that counts writes and can fail draft batches
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    writes: AtomicUsize,
    failing_draft_batches: AtomicUsize,
    failing_post_records: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Writes performed through save, save_drafts, save_draft and mark_draft_posted
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls to save_drafts fail without writing
    pub fn fail_draft_batches(&self, count: usize) {
        self.failing_draft_batches.store(count, Ordering::SeqCst);
    }

    /// Make mark_draft_posted fail without writing
    pub fn fail_post_records(&self, failing: bool) {
        self.failing_post_records.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create(&self, config: SessionConfig) -> anyhow::Result<Session> {
        self.inner.create(config).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Session>> {
        self.inner.get(id).await
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(session).await
    }

    async fn save_drafts(&self, session: &Session, drafts: &[Draft]) -> anyhow::Result<()> {
        let remaining = self.failing_draft_batches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_draft_batches
                .store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("disk full"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_drafts(session, drafts).await
    }

    async fn list_sessions(&self, limit: usize) -> anyhow::Result<Vec<Session>> {
        self.inner.list_sessions(limit).await
    }

    async fn latest_incomplete(&self) -> anyhow::Result<Option<Session>> {
        self.inner.latest_incomplete().await
    }

    async fn drafts_for_session(&self, session_id: Uuid) -> anyhow::Result<Vec<Draft>> {
        self.inner.drafts_for_session(session_id).await
    }

    async fn get_draft(&self, id: &str) -> anyhow::Result<Option<Draft>> {
        self.inner.get_draft(id).await
    }

    async fn save_draft(&self, draft: &Draft) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_draft(draft).await
    }

    async fn mark_draft_posted(
        &self,
        id: &str,
        posted_at: DateTime<Utc>,
        url: &str,
    ) -> anyhow::Result<bool> {
        if self.failing_post_records.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_draft_posted(id, posted_at, url).await
    }
}

/// Publisher that records posted text
#[derive(Default)]
pub struct RecordingPublisher {
    posts: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str) -> Result<Published, PublishFailure> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishFailure::new("rate limited"));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(text.to_string());
        Ok(Published {
            url: format!("https://social.example/posts/{}", posts.len()),
        })
    }
}

pub fn orchestrator(store: Arc<RecordingStore>, provider: Arc<ScriptedProvider>) -> Orchestrator {
    Orchestrator::new(
        store,
        Providers::from_single(provider),
        PipelineSettings::default(),
    )
}

/// Create a session and advance it `steps` times
pub async fn session_at(orchestrator: &Orchestrator, steps: usize) -> Uuid {
    let session = orchestrator
        .create_session(SessionConfig::new(THEME))
        .await
        .unwrap();
    for _ in 0..steps {
        orchestrator.advance(session.id).await.unwrap();
    }
    session.id
}
