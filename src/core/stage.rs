//! The five fixed pipeline stages and the status → action table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::SessionStatus;

/// One of the fixed pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    CollectTopics,
    GenerateConcepts,
    SelectConcepts,
    FinalizeContent,
    AssembleDrafts,
}

impl StageKind {
    /// Stages in execution order
    pub const ALL: [StageKind; 5] = [
        StageKind::CollectTopics,
        StageKind::GenerateConcepts,
        StageKind::SelectConcepts,
        StageKind::FinalizeContent,
        StageKind::AssembleDrafts,
    ];

    /// The single next action for a status; `None` when terminal
    pub fn for_status(status: SessionStatus) -> Option<Self> {
        match status {
            SessionStatus::Created => Some(Self::CollectTopics),
            SessionStatus::TopicsCollected => Some(Self::GenerateConcepts),
            SessionStatus::ConceptsGenerated => Some(Self::SelectConcepts),
            SessionStatus::ConceptsSelected => Some(Self::FinalizeContent),
            SessionStatus::ContentsGenerated => Some(Self::AssembleDrafts),
            SessionStatus::Completed | SessionStatus::Error => None,
        }
    }

    /// Status the stage runs from
    pub fn source_status(&self) -> SessionStatus {
        match self {
            Self::CollectTopics => SessionStatus::Created,
            Self::GenerateConcepts => SessionStatus::TopicsCollected,
            Self::SelectConcepts => SessionStatus::ConceptsGenerated,
            Self::FinalizeContent => SessionStatus::ConceptsSelected,
            Self::AssembleDrafts => SessionStatus::ContentsGenerated,
        }
    }

    /// Status written on success
    pub fn target_status(&self) -> SessionStatus {
        match self {
            Self::CollectTopics => SessionStatus::TopicsCollected,
            Self::GenerateConcepts => SessionStatus::ConceptsGenerated,
            Self::SelectConcepts => SessionStatus::ConceptsSelected,
            Self::FinalizeContent => SessionStatus::ContentsGenerated,
            Self::AssembleDrafts => SessionStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectTopics => "collect_topics",
            Self::GenerateConcepts => "generate_concepts",
            Self::SelectConcepts => "select_concepts",
            Self::FinalizeContent => "finalize_content",
            Self::AssembleDrafts => "assemble_drafts",
        }
    }

    /// Human-readable summary of a successful run of this stage
    pub fn completion_message(&self) -> &'static str {
        match self {
            Self::CollectTopics => "Topics collected",
            Self::GenerateConcepts => "Concepts generated",
            Self::SelectConcepts => "Concepts selected",
            Self::FinalizeContent => "Content finalized",
            Self::AssembleDrafts => "Drafts assembled",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
