//! SQLite-backed store.
//!
//! Artifacts are kept as JSON text columns. Timestamps are fixed-width
//! RFC 3339 strings so they order lexically.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::SessionStore;
use crate::domain::{Draft, DraftStatus, Session, SessionConfig, SessionStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    theme TEXT NOT NULL,
    platform TEXT NOT NULL,
    style TEXT NOT NULL,
    status TEXT NOT NULL,
    topics TEXT,
    concepts TEXT,
    selected_concept_ids TEXT,
    contents TEXT,
    character_id TEXT,
    error_details TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);

CREATE TABLE IF NOT EXISTS drafts (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    concept_id TEXT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    hashtags TEXT NOT NULL,
    platform TEXT NOT NULL,
    character_id TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    posted_at TEXT,
    post_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_drafts_session ON drafts(session_id, position);
"#;

const SESSION_COLUMNS: &str = "id, theme, platform, style, status, topics, concepts, \
     selected_concept_ids, contents, character_id, error_details, created_at, updated_at";

const DRAFT_COLUMNS: &str = "id, session_id, concept_id, title, content, hashtags, platform, \
     character_id, status, created_at, posted_at, post_url";

/// Store backed by a single SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        debug!(path = %path.display(), "Opened session database");
        Self::with_connection(conn)
    }

    /// Private database that disappears with the store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("Database task failed")?
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, config: SessionConfig) -> Result<Session> {
        let session = Session::new(config);
        let stored = session.clone();
        self.call(move |conn| write_session(conn, &stored)).await?;
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        self.call(move |conn| {
            let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
            let row = conn
                .query_row(&sql, params![id.to_string()], SessionRow::from_row)
                .optional()
                .context("Failed to query session")?;
            row.map(SessionRow::into_session).transpose()
        })
        .await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.call(move |conn| write_session(conn, &session)).await
    }

    async fn save_drafts(&self, session: &Session, drafts: &[Draft]) -> Result<()> {
        let session = session.clone();
        let drafts = drafts.to_vec();
        self.call(move |conn| {
            let tx = conn.transaction().context("Failed to begin transaction")?;
            for (position, draft) in drafts.iter().enumerate() {
                insert_draft(&tx, draft, position, false)?;
            }
            write_session(&tx, &session)?;
            tx.commit().context("Failed to commit drafts")?;
            Ok(())
        })
        .await
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM sessions ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                SESSION_COLUMNS
            );
            query_sessions(conn, &sql, params![limit])
        })
        .await
    }

    async fn latest_incomplete(&self) -> Result<Option<Session>> {
        self.call(|conn| {
            let sql = format!(
                "SELECT {} FROM sessions WHERE status NOT IN (?1, ?2) \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                SESSION_COLUMNS
            );
            let sessions = query_sessions(
                conn,
                &sql,
                params![
                    SessionStatus::Completed.as_str(),
                    SessionStatus::Error.as_str()
                ],
            )?;
            Ok(sessions.into_iter().next())
        })
        .await
    }

    async fn drafts_for_session(&self, session_id: Uuid) -> Result<Vec<Draft>> {
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM drafts WHERE session_id = ?1 ORDER BY position",
                DRAFT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql).context("Failed to prepare draft query")?;
            let rows = stmt
                .query_map(params![session_id.to_string()], DraftRow::from_row)
                .context("Failed to query drafts")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read draft rows")?;
            rows.into_iter().map(DraftRow::into_draft).collect()
        })
        .await
    }

    async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        let id = id.to_string();
        self.call(move |conn| {
            let sql = format!("SELECT {} FROM drafts WHERE id = ?1", DRAFT_COLUMNS);
            let row = conn
                .query_row(&sql, params![id], DraftRow::from_row)
                .optional()
                .context("Failed to query draft")?;
            row.map(DraftRow::into_draft).transpose()
        })
        .await
    }

    async fn save_draft(&self, draft: &Draft) -> Result<()> {
        let draft = draft.clone();
        self.call(move |conn| {
            let position: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM drafts WHERE session_id = ?1",
                    params![draft.session_id.to_string()],
                    |row| row.get(0),
                )
                .context("Failed to count drafts")?;
            insert_draft(conn, &draft, position as usize, true)
        })
        .await
    }

    async fn mark_draft_posted(
        &self,
        id: &str,
        posted_at: DateTime<Utc>,
        url: &str,
    ) -> Result<bool> {
        let id = id.to_string();
        let url = url.to_string();
        self.call(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE drafts SET status = ?1, posted_at = ?2, post_url = ?3 \
                     WHERE id = ?4 AND status = ?5",
                    params![
                        DraftStatus::Posted.as_str(),
                        timestamp(&posted_at),
                        url,
                        id,
                        DraftStatus::Draft.as_str()
                    ],
                )
                .with_context(|| format!("Failed to mark draft {} posted", id))?;
            Ok(updated == 1)
        })
        .await
    }
}

fn write_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, theme, platform, style, status, topics, concepts, \
             selected_concept_ids, contents, character_id, error_details, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
             theme = excluded.theme,
             platform = excluded.platform,
             style = excluded.style,
             status = excluded.status,
             topics = excluded.topics,
             concepts = excluded.concepts,
             selected_concept_ids = excluded.selected_concept_ids,
             contents = excluded.contents,
             character_id = excluded.character_id,
             error_details = excluded.error_details,
             updated_at = excluded.updated_at",
        params![
            session.id.to_string(),
            session.theme,
            session.platform,
            session.style,
            session.status.as_str(),
            to_json_column(&session.topics)?,
            to_json_column(&session.concepts)?,
            to_json_column(&session.selected_concept_ids)?,
            to_json_column(&session.contents)?,
            session.character_id,
            to_json_column(&session.error_details)?,
            timestamp(&session.created_at),
            timestamp(&session.updated_at),
        ],
    )
    .with_context(|| format!("Failed to write session {}", session.id))?;
    Ok(())
}

/// Insert a draft; `overwrite` decides whether an existing row is replaced
fn insert_draft(conn: &Connection, draft: &Draft, position: usize, overwrite: bool) -> Result<()> {
    let conflict = if overwrite {
        "ON CONFLICT(id) DO UPDATE SET
             concept_id = excluded.concept_id,
             title = excluded.title,
             content = excluded.content,
             hashtags = excluded.hashtags,
             platform = excluded.platform,
             character_id = excluded.character_id,
             status = excluded.status,
             posted_at = excluded.posted_at,
             post_url = excluded.post_url"
    } else {
        "ON CONFLICT(id) DO NOTHING"
    };

    let sql = format!(
        "INSERT INTO drafts (id, session_id, position, concept_id, title, content, hashtags, \
             platform, character_id, status, created_at, posted_at, post_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         {}",
        conflict
    );

    conn.execute(
        &sql,
        params![
            draft.id,
            draft.session_id.to_string(),
            position as i64,
            draft.concept_id,
            draft.title,
            draft.content,
            serde_json::to_string(&draft.hashtags).context("Failed to encode hashtags")?,
            draft.platform,
            draft.character_id,
            draft.status.as_str(),
            timestamp(&draft.created_at),
            draft.posted_at.as_ref().map(timestamp),
            draft.post_url,
        ],
    )
    .with_context(|| format!("Failed to write draft {}", draft.id))?;
    Ok(())
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare session query")?;
    let rows = stmt
        .query_map(params, SessionRow::from_row)
        .context("Failed to query sessions")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read session rows")?;
    rows.into_iter().map(SessionRow::into_session).collect()
}

/// Raw column values of a `sessions` row
struct SessionRow {
    id: String,
    theme: String,
    platform: String,
    style: String,
    status: String,
    topics: Option<String>,
    concepts: Option<String>,
    selected_concept_ids: Option<String>,
    contents: Option<String>,
    character_id: Option<String>,
    error_details: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            theme: row.get(1)?,
            platform: row.get(2)?,
            style: row.get(3)?,
            status: row.get(4)?,
            topics: row.get(5)?,
            concepts: row.get(6)?,
            selected_concept_ids: row.get(7)?,
            contents: row.get(8)?,
            character_id: row.get(9)?,
            error_details: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: Uuid::parse_str(&self.id)
                .with_context(|| format!("Invalid session id: {}", self.id))?,
            theme: self.theme,
            platform: self.platform,
            style: self.style,
            status: SessionStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("Unknown session status: {}", self.status))?,
            topics: from_json_column(self.topics, "topics")?,
            concepts: from_json_column(self.concepts, "concepts")?,
            selected_concept_ids: from_json_column(
                self.selected_concept_ids,
                "selected_concept_ids",
            )?,
            contents: from_json_column(self.contents, "contents")?,
            character_id: self.character_id,
            error_details: from_json_column(self.error_details, "error_details")?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Raw column values of a `drafts` row
struct DraftRow {
    id: String,
    session_id: String,
    concept_id: Option<String>,
    title: String,
    content: String,
    hashtags: String,
    platform: String,
    character_id: Option<String>,
    status: String,
    created_at: String,
    posted_at: Option<String>,
    post_url: Option<String>,
}

impl DraftRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            concept_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            hashtags: row.get(5)?,
            platform: row.get(6)?,
            character_id: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            posted_at: row.get(10)?,
            post_url: row.get(11)?,
        })
    }

    fn into_draft(self) -> Result<Draft> {
        Ok(Draft {
            session_id: Uuid::parse_str(&self.session_id)
                .with_context(|| format!("Invalid session id on draft {}", self.id))?,
            hashtags: serde_json::from_str(&self.hashtags)
                .with_context(|| format!("Invalid hashtags on draft {}", self.id))?,
            status: DraftStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("Unknown draft status: {}", self.status))?,
            created_at: parse_timestamp(&self.created_at)?,
            posted_at: self.posted_at.as_deref().map(parse_timestamp).transpose()?,
            id: self.id,
            concept_id: self.concept_id,
            title: self.title,
            content: self.content,
            platform: self.platform,
            character_id: self.character_id,
            post_url: self.post_url,
        })
    }
}

fn to_json_column<T: Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).context("Failed to encode JSON column"))
        .transpose()
}

fn from_json_column<T: DeserializeOwned>(value: Option<String>, column: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in column {}", column))
        })
        .transpose()
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp: {}", value))
}
