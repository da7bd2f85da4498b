//! Session state and its fixed status sequence.
//!
//! A Session represents one end-to-end pipeline run, from theme to drafts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{Concept, Content, Topic};

/// Caller-supplied configuration for a new session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Subject the generated content is about
    pub theme: String,

    /// Target social platform
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Tone of the generated content
    #[serde(default = "default_style")]
    pub style: String,
}

fn default_platform() -> String {
    "Twitter".to_string()
}

fn default_style() -> String {
    "entertainment".to_string()
}

impl SessionConfig {
    /// Create a config with default platform and style
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            platform: default_platform(),
            style: default_style(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }
}

/// A pipeline session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session
    pub id: Uuid,

    pub theme: String,
    pub platform: String,
    pub style: String,

    /// Current position in the stage sequence
    pub status: SessionStatus,

    /// Collected topics (set by the collect stage)
    pub topics: Option<Vec<Topic>>,

    /// Candidate concepts (set by the conceptualize stage)
    pub concepts: Option<Vec<Concept>>,

    /// Ids of the concepts chosen for finalization
    pub selected_concept_ids: Option<Vec<String>>,

    /// Finalized content items (set by the finalize stage)
    pub contents: Option<Vec<Content>>,

    /// Character voice used for finalization
    pub character_id: Option<String>,

    /// Why the session entered ERROR
    pub error_details: Option<ErrorDetails>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in the CREATED state
    pub fn new(config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            theme: config.theme,
            platform: config.platform,
            style: config.style,
            status: SessionStatus::Created,
            topics: None,
            concepts: None,
            selected_concept_ids: None,
            contents: None,
            character_id: None,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`; call on every mutation
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether another stage can run on this session
    pub fn can_advance(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Progress through the fixed stage sequence (0-100)
    pub fn progress_percent(&self) -> u8 {
        self.status.progress_percent()
    }

    /// Look up a generated concept by id
    pub fn concept(&self, concept_id: &str) -> Option<&Concept> {
        self.concepts
            .as_ref()
            .and_then(|concepts| concepts.iter().find(|c| c.id == concept_id))
    }

    /// Verify the populated artifacts match the status.
    ///
    /// Returns the name of the first missing artifact.
    pub fn check_consistency(&self) -> Result<(), &'static str> {
        // ERROR keeps whatever artifacts were written before the failure
        let Some(position) = self.status.position() else {
            return Ok(());
        };

        let required = [
            (SessionStatus::TopicsCollected, self.topics.is_some(), "topics"),
            (
                SessionStatus::ConceptsGenerated,
                self.concepts.is_some(),
                "concepts",
            ),
            (
                SessionStatus::ConceptsSelected,
                self.selected_concept_ids.is_some(),
                "selected_concept_ids",
            ),
            (
                SessionStatus::ContentsGenerated,
                self.contents.is_some(),
                "contents",
            ),
        ];

        for (status, present, name) in required {
            if status.position().is_some_and(|p| position >= p) && !present {
                return Err(name);
            }
        }

        Ok(())
    }
}

/// Status of a session in the linear stage sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    TopicsCollected,
    ConceptsGenerated,
    ConceptsSelected,
    ContentsGenerated,
    Completed,
    /// Unrecoverable provider failure
    Error,
}

impl SessionStatus {
    /// Non-error statuses in pipeline order
    pub const SEQUENCE: [SessionStatus; 6] = [
        SessionStatus::Created,
        SessionStatus::TopicsCollected,
        SessionStatus::ConceptsGenerated,
        SessionStatus::ConceptsSelected,
        SessionStatus::ContentsGenerated,
        SessionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::TopicsCollected => "TOPICS_COLLECTED",
            Self::ConceptsGenerated => "CONCEPTS_GENERATED",
            Self::ConceptsSelected => "CONCEPTS_SELECTED",
            Self::ContentsGenerated => "CONTENTS_GENERATED",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "TOPICS_COLLECTED" => Some(Self::TopicsCollected),
            "CONCEPTS_GENERATED" => Some(Self::ConceptsGenerated),
            "CONCEPTS_SELECTED" => Some(Self::ConceptsSelected),
            "CONTENTS_GENERATED" => Some(Self::ContentsGenerated),
            "COMPLETED" => Some(Self::Completed),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Index in `SEQUENCE`; `None` for ERROR
    pub fn position(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|s| s == self)
    }

    /// The single successor in the sequence
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::TopicsCollected),
            Self::TopicsCollected => Some(Self::ConceptsGenerated),
            Self::ConceptsGenerated => Some(Self::ConceptsSelected),
            Self::ConceptsSelected => Some(Self::ContentsGenerated),
            Self::ContentsGenerated => Some(Self::Completed),
            Self::Completed | Self::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Only the immediate successor, or ERROR from a non-terminal state
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SessionStatus::Error || self.next() == Some(to)
    }

    /// 0/20/40/60/80/100 by position; ERROR reports 0
    pub fn progress_percent(&self) -> u8 {
        match self.position() {
            Some(p) => (p * 100 / (Self::SEQUENCE.len() - 1)) as u8,
            None => 0,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context recorded when a session enters ERROR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stage that failed
    pub stage: String,

    /// Underlying failure reason
    pub reason: String,

    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new(SessionConfig::new("AI and the future of work"));

        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(session.platform, "Twitter");
        assert!(session.can_advance());
        assert!(session.topics.is_none());
        assert_eq!(session.progress_percent(), 0);
    }

    #[test]
    fn test_status_sequence_is_linear() {
        let mut status = SessionStatus::Created;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            assert!(status.can_transition_to(next));
            status = next;
            visited.push(status);
        }
        assert_eq!(visited, SessionStatus::SEQUENCE.to_vec());
    }

    #[test]
    fn test_no_skipping_or_regression() {
        assert!(!SessionStatus::Created.can_transition_to(SessionStatus::ConceptsGenerated));
        assert!(!SessionStatus::ConceptsSelected.can_transition_to(SessionStatus::TopicsCollected));
        assert!(SessionStatus::ConceptsSelected.can_transition_to(SessionStatus::Error));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Error));
        assert!(!SessionStatus::Error.can_transition_to(SessionStatus::Created));
    }

    #[test]
    fn test_progress_percent() {
        let percents: Vec<u8> = SessionStatus::SEQUENCE
            .iter()
            .map(|s| s.progress_percent())
            .collect();
        assert_eq!(percents, vec![0, 20, 40, 60, 80, 100]);
        assert_eq!(SessionStatus::Error.progress_percent(), 0);
    }

    #[test]
    fn test_status_string_roundtrip_matches_serde() {
        for status in SessionStatus::SEQUENCE.iter().chain([&SessionStatus::Error]) {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(SessionStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(SessionStatus::parse("GENERATING"), None);
    }

    #[test]
    fn test_consistency_check() {
        let mut session = Session::new(SessionConfig::new("theme"));
        assert!(session.check_consistency().is_ok());

        session.status = SessionStatus::ConceptsGenerated;
        session.topics = Some(Vec::new());
        assert_eq!(session.check_consistency(), Err("concepts"));

        session.status = SessionStatus::Error;
        assert!(session.check_consistency().is_ok());
    }
}
