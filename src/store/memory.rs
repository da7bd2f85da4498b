use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;
use crate::domain::{Draft, Session, SessionConfig};

/// Process-local store backed by hash maps
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    /// Creation order
    session_order: Vec<Uuid>,
    drafts: HashMap<String, Draft>,
    /// Assembly order per session
    draft_order: HashMap<Uuid, Vec<String>>,
}

impl Inner {
    fn put_session(&mut self, session: &Session) {
        if self.sessions.insert(session.id, session.clone()).is_none() {
            self.session_order.push(session.id);
        }
    }

    fn put_draft(&mut self, draft: &Draft) {
        if self.drafts.insert(draft.id.clone(), draft.clone()).is_none() {
            self.draft_order
                .entry(draft.session_id)
                .or_default()
                .push(draft.id.clone());
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create(&self, config: SessionConfig) -> Result<Session> {
        let session = Session::new(config);
        self.inner.write().await.put_session(&session);
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.inner.write().await.put_session(session);
        Ok(())
    }

    async fn save_drafts(&self, session: &Session, drafts: &[Draft]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for draft in drafts {
            if !inner.drafts.contains_key(&draft.id) {
                inner.put_draft(draft);
            }
        }
        inner.put_session(session);
        Ok(())
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .session_order
            .iter()
            .rev()
            .filter_map(|id| inner.sessions.get(id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_incomplete(&self) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .session_order
            .iter()
            .rev()
            .filter_map(|id| inner.sessions.get(id))
            .find(|s| s.can_advance())
            .cloned())
    }

    async fn drafts_for_session(&self, session_id: Uuid) -> Result<Vec<Draft>> {
        let inner = self.inner.read().await;
        let Some(ids) = inner.draft_order.get(&session_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.drafts.get(id))
            .cloned()
            .collect())
    }

    async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        Ok(self.inner.read().await.drafts.get(id).cloned())
    }

    async fn save_draft(&self, draft: &Draft) -> Result<()> {
        self.inner.write().await.put_draft(draft);
        Ok(())
    }

    async fn mark_draft_posted(
        &self,
        id: &str,
        posted_at: DateTime<Utc>,
        url: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.drafts.get_mut(id) {
            Some(draft) if !draft.is_posted() => {
                draft.mark_posted(url.to_string(), posted_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DraftStatus, SessionStatus};

    fn draft(session_id: Uuid, id: &str, content: &str) -> Draft {
        Draft {
            id: id.to_string(),
            session_id,
            concept_id: None,
            title: "t".to_string(),
            content: content.to_string(),
            hashtags: Vec::new(),
            platform: "Twitter".to_string(),
            character_id: None,
            status: DraftStatus::Draft,
            created_at: Utc::now(),
            posted_at: None,
            post_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        let session = store.create(SessionConfig::new("theme")).await.unwrap();

        let loaded = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_newest_first() {
        let store = InMemoryStore::new();
        let first = store.create(SessionConfig::new("one")).await.unwrap();
        let mut second = store.create(SessionConfig::new("two")).await.unwrap();

        let listed = store.list_sessions(10).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        second.status = SessionStatus::Completed;
        store.save(&second).await.unwrap();

        let latest = store.latest_incomplete().await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
    }

    #[tokio::test]
    async fn test_save_drafts_keeps_existing() {
        let store = InMemoryStore::new();
        let mut session = store.create(SessionConfig::new("theme")).await.unwrap();
        session.status = SessionStatus::Completed;

        let mut posted = draft(session.id, "drf_a", "a");
        posted.mark_posted("https://example.com/a".to_string(), Utc::now());
        store.save_draft(&posted).await.unwrap();

        let batch = vec![draft(session.id, "drf_a", "a"), draft(session.id, "drf_b", "b")];
        store.save_drafts(&session, &batch).await.unwrap();

        let drafts = store.drafts_for_session(session.id).await.unwrap();
        assert_eq!(drafts.len(), 2);
        assert!(drafts[0].is_posted());
        assert_eq!(drafts[1].id, "drf_b");
    }

    #[tokio::test]
    async fn test_mark_draft_posted_only_once() {
        let store = InMemoryStore::new();
        let session = store.create(SessionConfig::new("theme")).await.unwrap();
        store.save_draft(&draft(session.id, "drf_a", "a")).await.unwrap();

        let posted_at = Utc::now();
        assert!(store
            .mark_draft_posted("drf_a", posted_at, "https://example.com/a")
            .await
            .unwrap());
        assert!(!store
            .mark_draft_posted("drf_a", Utc::now(), "https://example.com/b")
            .await
            .unwrap());
        assert!(!store
            .mark_draft_posted("drf_missing", Utc::now(), "https://example.com/c")
            .await
            .unwrap());

        let stored = store.get_draft("drf_a").await.unwrap().unwrap();
        assert_eq!(stored.posted_at, Some(posted_at));
        assert_eq!(stored.post_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(stored.content, "a");
    }
}
