//! Publishable drafts derived from finalized content.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A publishable unit owned by exactly one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Deterministic key, see [`draft_key`]
    pub id: String,

    /// Owning session
    pub session_id: Uuid,

    /// Originating concept, when it resolves to one the session generated
    pub concept_id: Option<String>,

    pub title: String,
    pub content: String,
    pub hashtags: Vec<String>,
    pub platform: String,
    pub character_id: Option<String>,

    pub status: DraftStatus,

    pub created_at: DateTime<Utc>,

    /// Set only on the transition to `Posted`
    pub posted_at: Option<DateTime<Utc>>,

    /// Link returned by the publisher
    pub post_url: Option<String>,
}

impl Draft {
    pub fn is_posted(&self) -> bool {
        self.status == DraftStatus::Posted
    }

    /// Text sent to the publisher: body followed by the hashtags
    pub fn publish_text(&self) -> String {
        let tags: Vec<String> = self
            .hashtags
            .iter()
            .map(|t| t.trim().trim_start_matches('#'))
            .filter(|t| !t.is_empty())
            .map(|t| format!("#{}", t))
            .collect();

        if tags.is_empty() {
            self.content.clone()
        } else {
            format!("{}\n\n{}", self.content, tags.join(" "))
        }
    }

    /// One-way transition to `Posted`
    pub fn mark_posted(&mut self, url: String, posted_at: DateTime<Utc>) {
        self.status = DraftStatus::Posted;
        self.posted_at = Some(posted_at);
        self.post_url = Some(url);
    }
}

/// Lifecycle of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Posted,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "posted" => Some(Self::Posted),
            _ => None,
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate the key for the draft at `position` of a session's contents.
///
/// Format: "drf_{hash16}" over session id, position and text, so assembling
/// the same contents twice yields the same keys.
pub fn draft_key(session_id: Uuid, position: usize, text: &str) -> String {
    format!(
        "drf_{}",
        hash_input(&format!("{}:{}:{}", session_id, position, text))
    )
}

/// Hash input content (first 16 chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
