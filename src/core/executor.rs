//! Stage executor: maps a session's status to its single next action and
//! runs it.
//!
//! A successful stage performs exactly one store write. A failed stage
//! performs none, so the session stays at its current status and the same
//! call can be repeated.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::assembler::DraftAssembler;
use super::pipeline::PipelineSettings;
use super::selection::validate_selection;
use super::stage::StageKind;
use crate::adapters::{ConceptRequest, FinalizeRequest, ProviderError, Providers, TopicRequest};
use crate::domain::{Concept, Content, Draft, Session, SessionStatus, Topic};
use crate::error::{PipelineError, Result};
use crate::store::SessionStore;

/// Caller overrides for a single advance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOptions {
    /// Concepts to finalize instead of the auto-selected top N
    #[serde(default)]
    pub selected_concept_ids: Option<Vec<String>>,

    /// Character voice for the finalize stage
    #[serde(default)]
    pub character_id: Option<String>,
}

impl AdvanceOptions {
    pub fn with_selection<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_concept_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }

    /// Reject malformed overrides before any stage runs
    pub fn validate(&self) -> Result<()> {
        if let Some(ids) = &self.selected_concept_ids {
            if ids.is_empty() {
                return Err(PipelineError::validation("Concept selection is empty"));
            }
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(PipelineError::validation("Concept selection has a blank id"));
            }
        }
        if let Some(character) = &self.character_id {
            if character.trim().is_empty() {
                return Err(PipelineError::validation("character_id cannot be blank"));
            }
        }
        Ok(())
    }

    /// Reject overrides that the given stage would not consume
    pub fn check_stage(&self, stage: StageKind) -> Result<()> {
        if self.selected_concept_ids.is_some() && stage != StageKind::SelectConcepts {
            return Err(PipelineError::validation(format!(
                "Concept selection applies to {}, but the next stage is {}",
                StageKind::SelectConcepts,
                stage
            )));
        }
        if self.character_id.is_some() && stage != StageKind::FinalizeContent {
            return Err(PipelineError::validation(format!(
                "character_id applies to {}, but the next stage is {}",
                StageKind::FinalizeContent,
                stage
            )));
        }
        Ok(())
    }
}

/// A stage that ran and was persisted
#[derive(Debug, Clone)]
pub struct ExecutedStage {
    pub stage: StageKind,
    pub session: Session,

    /// Non-empty only for the assembly stage
    pub drafts: Vec<Draft>,
}

#[derive(Clone)]
pub struct StageExecutor {
    store: Arc<dyn SessionStore>,
    providers: Providers,
    settings: PipelineSettings,
    assembler: DraftAssembler,
}

impl StageExecutor {
    pub fn new(
        store: Arc<dyn SessionStore>,
        providers: Providers,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            assembler: DraftAssembler::new(Arc::clone(&store)),
            store,
            providers,
            settings,
        }
    }

    pub fn can_advance(&self, session: &Session) -> bool {
        session.can_advance()
    }

    pub fn next_action(&self, status: SessionStatus) -> Option<StageKind> {
        StageKind::for_status(status)
    }

    /// Run the single next stage for `session` and persist the result
    #[instrument(skip(self, session, options), fields(session_id = %session.id, status = %session.status))]
    pub async fn execute(&self, session: Session, options: &AdvanceOptions) -> Result<ExecutedStage> {
        let stage = self.next_action(session.status).ok_or_else(|| {
            PipelineError::validation(format!(
                "Session {} is {} and cannot advance",
                session.id, session.status
            ))
        })?;
        options.check_stage(stage)?;

        if let Err(missing) = session.check_consistency() {
            return Err(PipelineError::Store(anyhow::anyhow!(
                "Session {} is {} but has no {}",
                session.id,
                session.status,
                missing
            )));
        }

        debug!(stage = %stage, "Running stage");

        let (session, drafts) = match stage {
            StageKind::CollectTopics => (self.collect_topics(session).await?, Vec::new()),
            StageKind::GenerateConcepts => (self.generate_concepts(session).await?, Vec::new()),
            StageKind::SelectConcepts => (self.select_concepts(session, options).await?, Vec::new()),
            StageKind::FinalizeContent => (self.finalize_content(session, options).await?, Vec::new()),
            StageKind::AssembleDrafts => self.assembler.assemble(session).await?,
        };

        info!(stage = %stage, status = %session.status, "Stage complete");
        Ok(ExecutedStage {
            stage,
            session,
            drafts,
        })
    }

    async fn collect_topics(&self, mut session: Session) -> Result<Session> {
        let stage = StageKind::CollectTopics;
        let request = TopicRequest::from_session(&session);

        let topics = self
            .providers
            .topics
            .collect_topics(&request)
            .await
            .map_err(|e| provider_failure(stage, e))?;
        validate_topics(&topics).map_err(|reason| malformed(stage, reason))?;

        session.topics = Some(topics);
        self.commit(session, stage).await
    }

    async fn generate_concepts(&self, mut session: Session) -> Result<Session> {
        let stage = StageKind::GenerateConcepts;
        let request = ConceptRequest {
            theme: session.theme.clone(),
            platform: session.platform.clone(),
            style: session.style.clone(),
            topics: session.topics.clone().unwrap_or_default(),
        };

        let concepts = self
            .providers
            .concepts
            .generate_concepts(&request)
            .await
            .map_err(|e| provider_failure(stage, e))?;
        validate_concepts(&concepts).map_err(|reason| malformed(stage, reason))?;

        session.concepts = Some(concepts);
        self.commit(session, stage).await
    }

    async fn select_concepts(&self, mut session: Session, options: &AdvanceOptions) -> Result<Session> {
        let stage = StageKind::SelectConcepts;
        let concepts = session.concepts.clone().unwrap_or_default();

        let selected = match &options.selected_concept_ids {
            Some(ids) => {
                validate_selection(&concepts, ids).map_err(PipelineError::Validation)?;
                ids.clone()
            }
            None => {
                let ids = self.settings.selection.select(&concepts);
                debug!(selected = ?ids, "Auto-selected concepts");
                ids
            }
        };

        if selected.is_empty() {
            return Err(PipelineError::validation("No concepts available to select"));
        }

        session.selected_concept_ids = Some(selected);
        self.commit(session, stage).await
    }

    async fn finalize_content(&self, mut session: Session, options: &AdvanceOptions) -> Result<Session> {
        let stage = StageKind::FinalizeContent;
        let character_id = options
            .character_id
            .clone()
            .or_else(|| self.settings.default_character_id.clone());

        let request = FinalizeRequest {
            theme: session.theme.clone(),
            platform: session.platform.clone(),
            style: session.style.clone(),
            concepts: session.concepts.clone().unwrap_or_default(),
            selected_concept_ids: session.selected_concept_ids.clone().unwrap_or_default(),
            character_id: character_id.clone(),
        };

        let contents = self
            .providers
            .contents
            .finalize_content(&request)
            .await
            .map_err(|e| provider_failure(stage, e))?;
        validate_contents(&contents).map_err(|reason| malformed(stage, reason))?;

        session.contents = Some(contents);
        session.character_id = character_id;
        self.commit(session, stage).await
    }

    /// Advance the status and write the session once
    async fn commit(&self, mut session: Session, stage: StageKind) -> Result<Session> {
        let target = stage.target_status();
        if !session.status.can_transition_to(target) {
            return Err(PipelineError::validation(format!(
                "Invalid transition {} -> {}",
                session.status, target
            )));
        }

        session.status = target;
        session.touch();
        self.store.save(&session).await?;
        Ok(session)
    }
}

fn provider_failure(stage: StageKind, error: ProviderError) -> PipelineError {
    PipelineError::Provider {
        stage,
        status: stage.source_status(),
        reason: error.reason,
        retryable: error.retryable,
    }
}

/// Unusable provider output is treated as transient
fn malformed(stage: StageKind, reason: String) -> PipelineError {
    PipelineError::Provider {
        stage,
        status: stage.source_status(),
        reason,
        retryable: true,
    }
}

fn validate_topics(topics: &[Topic]) -> std::result::Result<(), String> {
    if topics.is_empty() {
        return Err("no topics returned".to_string());
    }
    if topics.iter().any(|t| t.title.trim().is_empty()) {
        return Err("topic with blank title".to_string());
    }
    Ok(())
}

fn validate_concepts(concepts: &[Concept]) -> std::result::Result<(), String> {
    if concepts.is_empty() {
        return Err("no concepts returned".to_string());
    }

    let mut seen = HashSet::new();
    for concept in concepts {
        if concept.id.trim().is_empty() {
            return Err("concept with blank id".to_string());
        }
        if !seen.insert(concept.id.as_str()) {
            return Err(format!("duplicate concept id '{}'", concept.id));
        }
    }
    Ok(())
}

fn validate_contents(contents: &[Content]) -> std::result::Result<(), String> {
    if contents.is_empty() {
        return Err("no content returned".to_string());
    }
    if contents.iter().any(|c| c.text.trim().is_empty()) {
        return Err("content with blank text".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_options_validation() {
        assert!(AdvanceOptions::default().validate().is_ok());
        assert!(AdvanceOptions::default()
            .with_selection(["c1"])
            .with_character("narrator")
            .validate()
            .is_ok());

        let empty = AdvanceOptions::default().with_selection(Vec::<String>::new());
        assert!(matches!(empty.validate(), Err(PipelineError::Validation(_))));

        let blank = AdvanceOptions::default().with_character("  ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_overrides_must_match_next_stage() {
        let selection = AdvanceOptions::default().with_selection(["c1"]);
        assert!(selection.check_stage(StageKind::SelectConcepts).is_ok());
        assert!(matches!(
            selection.check_stage(StageKind::CollectTopics),
            Err(PipelineError::Validation(_))
        ));

        let character = AdvanceOptions::default().with_character("narrator");
        assert!(character.check_stage(StageKind::FinalizeContent).is_ok());
        assert!(character.check_stage(StageKind::SelectConcepts).is_err());

        assert!(AdvanceOptions::default()
            .check_stage(StageKind::AssembleDrafts)
            .is_ok());
    }

    #[test]
    fn test_concept_validation() {
        assert!(validate_concepts(&[]).is_err());
        assert!(validate_concepts(&[Concept::new("", "t", 1.0)]).is_err());
        assert!(validate_concepts(&[Concept::new("a", "t", 1.0), Concept::new("a", "u", 2.0)]).is_err());
        assert!(validate_concepts(&[Concept::new("a", "t", 1.0), Concept::new("b", "u", 2.0)]).is_ok());
    }

    #[test]
    fn test_content_validation() {
        assert!(validate_contents(&[]).is_err());
        assert!(validate_contents(&[Content::new("   ")]).is_err());
        assert!(validate_contents(&[Content::new("post")]).is_ok());
    }

    #[test]
    fn test_malformed_data_is_retryable() {
        let err = malformed(StageKind::GenerateConcepts, "no concepts returned".to_string());
        assert!(err.is_retryable());
        match err {
            PipelineError::Provider { status, .. } => {
                assert_eq!(status, SessionStatus::TopicsCollected)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
