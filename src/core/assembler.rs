//! Draft assembly and publishing.
//!
//! Assembly turns a session's finalized contents into drafts and flips the
//! session to COMPLETED in one atomic store write. Draft ids are derived from
//! the content, so a retried assembly produces the same rows.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::adapters::Publisher;
use crate::domain::{draft_key, Draft, DraftStatus, Session, SessionStatus};
use crate::error::{PipelineError, Result};
use crate::store::SessionStore;

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub draft: Draft,
    pub url: String,
}

#[derive(Clone)]
pub struct DraftAssembler {
    store: Arc<dyn SessionStore>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl DraftAssembler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Build drafts for the session's contents and complete the session
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn assemble(&self, mut session: Session) -> Result<(Session, Vec<Draft>)> {
        let drafts = build_drafts(&session)?;

        session.status = SessionStatus::Completed;
        session.touch();
        self.store.save_drafts(&session, &drafts).await?;

        info!(drafts = drafts.len(), "Drafts assembled");
        Ok((session, drafts))
    }

    /// Send a draft to the publisher and record the result
    #[instrument(skip(self))]
    pub async fn publish(&self, draft_id: &str) -> Result<PublishResult> {
        let draft = self
            .store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| PipelineError::draft_not_found(draft_id))?;

        if draft.is_posted() {
            return Err(PipelineError::validation(format!(
                "Draft {} is already posted",
                draft_id
            )));
        }

        let publisher = self
            .publisher
            .as_ref()
            .ok_or_else(|| PipelineError::validation("No publisher configured"))?;

        let published = match publisher.publish(&draft.publish_text()).await {
            Ok(published) => published,
            Err(failure) => {
                warn!(error = %failure, "Publishing failed");
                return Err(PipelineError::Publish {
                    draft_id: draft_id.to_string(),
                    reason: failure.reason,
                });
            }
        };

        // Only the posting fields are written so concurrent edits survive
        let recorded = self
            .store
            .mark_draft_posted(draft_id, Utc::now(), &published.url)
            .await
            .map_err(|e| {
                error!(url = %published.url, error = %e, "Draft published but not recorded");
                PipelineError::Store(e.context(format!(
                    "Draft {} was published at {} but could not be recorded",
                    draft_id, published.url
                )))
            })?;

        if !recorded {
            error!(url = %published.url, "Draft was posted or removed while publishing");
            return Err(PipelineError::Store(anyhow::anyhow!(
                "Draft {} changed while publishing; post at {} was not recorded",
                draft_id,
                published.url
            )));
        }

        let draft = self
            .store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| PipelineError::draft_not_found(draft_id))?;

        info!(url = %published.url, "Draft published");
        Ok(PublishResult {
            draft,
            url: published.url,
        })
    }
}

/// One draft per content item, in content order
pub fn build_drafts(session: &Session) -> Result<Vec<Draft>> {
    let contents = session.contents.as_ref().ok_or_else(|| {
        PipelineError::Store(anyhow::anyhow!(
            "Session {} has no contents to assemble",
            session.id
        ))
    })?;

    let now = Utc::now();
    let drafts = contents
        .iter()
        .enumerate()
        .map(|(position, content)| {
            let concept = content
                .concept_id
                .as_deref()
                .and_then(|id| session.concept(id));

            let title = if !content.title.trim().is_empty() {
                content.title.clone()
            } else if let Some(concept) = concept {
                concept.title.clone()
            } else {
                session.theme.clone()
            };

            Draft {
                id: draft_key(session.id, position, &content.text),
                session_id: session.id,
                concept_id: concept.map(|c| c.id.clone()),
                title,
                content: content.text.clone(),
                hashtags: content.hashtags.clone(),
                platform: session.platform.clone(),
                character_id: session.character_id.clone(),
                status: DraftStatus::Draft,
                created_at: now,
                posted_at: None,
                post_url: None,
            }
        })
        .collect();

    Ok(drafts)
}
