//! Durable record of sessions and their drafts.
//!
//! The orchestrator holds no state between calls; everything it needs to
//! resume a session is read back through [`SessionStore`].

mod memory;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Draft, Session, SessionConfig};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persistence for sessions and drafts
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session in CREATED
    async fn create(&self, config: SessionConfig) -> Result<Session>;

    async fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// Overwrite the stored session
    async fn save(&self, session: &Session) -> Result<()>;

    /// Write the session and its drafts in one atomic step.
    ///
    /// Drafts whose id already exists are left as stored.
    async fn save_drafts(&self, session: &Session, drafts: &[Draft]) -> Result<()>;

    /// Most recently created sessions first
    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>>;

    /// Newest session that is neither COMPLETED nor ERROR
    async fn latest_incomplete(&self) -> Result<Option<Session>>;

    /// Drafts of a session in assembly order
    async fn drafts_for_session(&self, session_id: Uuid) -> Result<Vec<Draft>>;

    async fn get_draft(&self, id: &str) -> Result<Option<Draft>>;

    /// Insert or overwrite a single draft
    async fn save_draft(&self, draft: &Draft) -> Result<()>;

    /// Flip an unposted draft to posted, leaving its other fields as stored.
    ///
    /// Returns `false` when no draft with this id is still unposted.
    async fn mark_draft_posted(&self, id: &str, posted_at: DateTime<Utc>, url: &str)
        -> Result<bool>;
}
