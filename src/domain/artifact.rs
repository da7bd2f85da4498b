//! Artifacts produced by pipeline stages.
//!
//! Each stage's artifact is the input of the next: topics feed concept
//! generation, selected concepts feed finalization.

use serde::{Deserialize, Serialize};

/// A topic gathered by the collect stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,

    #[serde(default)]
    pub summary: String,

    /// Source link, when the collector reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Topic {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            url: None,
        }
    }
}

/// A candidate content angle produced by the conceptualize stage.
///
/// Concepts are never mutated after generation; selection only records ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Identifier unique within the session
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub outline: ConceptOutline,

    /// Ranking score used by auto-selection (higher is better)
    #[serde(default)]
    pub score: f64,
}

impl Concept {
    pub fn new(id: impl Into<String>, title: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            outline: ConceptOutline::default(),
            score,
        }
    }

    pub fn with_outline(mut self, outline: ConceptOutline) -> Self {
        self.outline = outline;
        self
    }
}

/// Structured outline of a concept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptOutline {
    #[serde(default)]
    pub hook: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub reflection: String,

    #[serde(default)]
    pub call_to_action: String,
}

/// A finalized content item, ready to become a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Concept this content was written from, if the finalizer reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,

    #[serde(default)]
    pub title: String,

    /// Post body
    pub text: String,

    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl Content {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            concept_id: None,
            title: String::new(),
            text: text.into(),
            hashtags: Vec::new(),
        }
    }

    pub fn for_concept(mut self, concept_id: impl Into<String>) -> Self {
        self.concept_id = Some(concept_id.into());
        self
    }

    pub fn with_hashtags<I, S>(mut self, hashtags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashtags = hashtags.into_iter().map(Into::into).collect();
        self
    }
}
