//! Main orchestrator for session execution.
//!
//! Loads the session from the store on every call, runs the single next
//! stage, and converts unrecoverable provider failures into the ERROR
//! status. Nothing is cached between calls, so any call can be retried or
//! resumed from another process.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{Providers, Publisher};
use crate::domain::{Draft, ErrorDetails, Session, SessionConfig, SessionStatus};
use crate::error::{PipelineError, Result};
use crate::store::SessionStore;

use super::assembler::{DraftAssembler, PublishResult};
use super::budget::{BudgetTracker, StepBudget};
use super::executor::{AdvanceOptions, StageExecutor};
use super::pipeline::PipelineSettings;
use super::stage::StageKind;

/// Result of one `advance` call
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Stage that ran; `None` when the session was already terminal
    pub action: Option<StageKind>,
    pub message: String,
    pub session: Session,

    /// Drafts produced by the assembly stage
    pub drafts: Vec<Draft>,
}

/// Options for `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Keep advancing until terminal or out of budget
    pub auto_progress: bool,

    /// Stage executions allowed in this call; falls back to the settings
    pub max_steps: Option<u32>,
}

impl RunOptions {
    pub fn single_step() -> Self {
        Self::default()
    }

    pub fn auto() -> Self {
        Self {
            auto_progress: true,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

/// How a `run` call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    /// Session reached COMPLETED
    Completed,
    /// Session is in ERROR
    Errored,
    /// Single-step run that left the session mid-pipeline
    Stepped,
    /// Auto-run stopped by its step budget; the session can be resumed
    BudgetExceeded { max_steps: u32 },
    /// A stage failed transiently; nothing was written and the session can
    /// be resumed
    Failed { stage: StageKind, reason: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Errored => f.write_str("errored"),
            Self::Stepped => f.write_str("stepped"),
            Self::BudgetExceeded { max_steps } => {
                write!(f, "budget exceeded after {} steps", max_steps)
            }
            Self::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
        }
    }
}

/// Result of a `run` call
#[derive(Debug, Clone)]
pub struct RunResult {
    pub session_id: Uuid,
    pub final_status: SessionStatus,
    pub steps_taken: u32,
    pub outcome: RunOutcome,

    /// Drafts of the session once it is COMPLETED
    pub drafts: Vec<Draft>,

    /// Why the session is in ERROR
    pub error_details: Option<ErrorDetails>,
}

/// One advance made on behalf of `run`
enum RunStep {
    /// A stage ran and was written, including a move to ERROR
    Advanced(Session),
    /// The session was already terminal
    Idle(Session),
    /// The stage failed without writing
    Failed {
        session: Session,
        stage: StageKind,
        reason: String,
    },
}

/// Snapshot returned by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub progress_percent: u8,
    pub can_process: bool,
    pub drafts_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

/// Main session orchestrator
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    executor: StageExecutor,
    assembler: DraftAssembler,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        providers: Providers,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            executor: StageExecutor::new(Arc::clone(&store), providers, settings.clone()),
            assembler: DraftAssembler::new(Arc::clone(&store)),
            store,
            settings,
        }
    }

    /// Enable `publish`
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.assembler = self.assembler.with_publisher(publisher);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Create a session in CREATED
    #[instrument(skip(self, config), fields(theme = %config.theme))]
    pub async fn create_session(&self, config: SessionConfig) -> Result<Session> {
        if config.theme.trim().is_empty() {
            return Err(PipelineError::validation("Theme cannot be empty"));
        }
        if config.platform.trim().is_empty() {
            return Err(PipelineError::validation("Platform cannot be empty"));
        }
        if config.style.trim().is_empty() {
            return Err(PipelineError::validation("Style cannot be empty"));
        }

        let session = self.store.create(config).await?;
        info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Load a session or fail with NotFound
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| PipelineError::session_not_found(session_id))
    }

    /// Execute the single next stage of a session
    pub async fn advance(&self, session_id: Uuid) -> Result<StepResult> {
        self.advance_with(session_id, AdvanceOptions::default()).await
    }

    /// Execute the next stage with caller overrides.
    ///
    /// A concept selection is only accepted when the next stage is
    /// `select_concepts`, and a character only before `finalize_content`.
    #[instrument(skip(self, options), fields(session_id = %session_id))]
    pub async fn advance_with(&self, session_id: Uuid, options: AdvanceOptions) -> Result<StepResult> {
        options.validate()?;

        let session = self.get_session(session_id).await?;

        let Some(stage) = self.executor.next_action(session.status) else {
            info!(status = %session.status, "Session is terminal, nothing to do");
            return Ok(StepResult {
                action: None,
                message: format!("Session is already {}", session.status),
                session,
                drafts: Vec::new(),
            });
        };

        info!(stage = %stage, status = %session.status, "Advancing session");

        match self.executor.execute(session.clone(), &options).await {
            Ok(executed) => Ok(StepResult {
                action: Some(executed.stage),
                message: executed.stage.completion_message().to_string(),
                session: executed.session,
                drafts: executed.drafts,
            }),
            Err(PipelineError::Provider {
                stage,
                status,
                reason,
                retryable: false,
            }) => {
                error!(stage = %stage, reason = %reason, "Unrecoverable provider failure");
                self.mark_errored(session, stage, &reason).await?;
                Err(PipelineError::Provider {
                    stage,
                    status,
                    reason,
                    retryable: false,
                })
            }
            Err(e) => {
                warn!(stage = %stage, error = %e, "Stage failed, session unchanged");
                Err(e)
            }
        }
    }

    /// Advance once, or repeatedly until terminal or out of budget
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn run(&self, session_id: Uuid, options: RunOptions) -> Result<RunResult> {
        let max_steps = options.max_steps.unwrap_or(self.settings.max_steps);
        if max_steps == 0 {
            return Err(PipelineError::validation("max_steps must be at least 1"));
        }

        let (session, steps_taken, outcome) = if options.auto_progress {
            self.run_until_terminal(session_id, StepBudget::new(max_steps))
                .await?
        } else {
            match self.step(session_id).await? {
                RunStep::Advanced(session) => {
                    let outcome = settled_outcome(session.status);
                    (session, 1, outcome)
                }
                RunStep::Idle(session) => {
                    let outcome = settled_outcome(session.status);
                    (session, 0, outcome)
                }
                RunStep::Failed {
                    session,
                    stage,
                    reason,
                } => (session, 0, RunOutcome::Failed { stage, reason }),
            }
        };

        let drafts = if session.status == SessionStatus::Completed {
            self.store.drafts_for_session(session_id).await?
        } else {
            Vec::new()
        };

        info!(
            status = %session.status,
            steps_taken,
            outcome = %outcome,
            "Run finished"
        );

        Ok(RunResult {
            session_id,
            final_status: session.status,
            steps_taken,
            outcome,
            drafts,
            error_details: session.error_details,
        })
    }

    async fn run_until_terminal(
        &self,
        session_id: Uuid,
        budget: StepBudget,
    ) -> Result<(Session, u32, RunOutcome)> {
        let mut tracker = BudgetTracker::new();
        let mut session = self.get_session(session_id).await?;

        let outcome = loop {
            match session.status {
                SessionStatus::Completed => break RunOutcome::Completed,
                SessionStatus::Error => break RunOutcome::Errored,
                _ => {}
            }

            if let Err(violation) = budget.check(&tracker) {
                warn!(%violation, status = %session.status, "Step budget exhausted");
                break RunOutcome::BudgetExceeded {
                    max_steps: budget.max_steps,
                };
            }

            match self.step(session_id).await? {
                RunStep::Advanced(next) => {
                    tracker.record_step();
                    session = next;
                }
                RunStep::Idle(next) => session = next,
                RunStep::Failed {
                    session: current,
                    stage,
                    reason,
                } => {
                    warn!(
                        stage = %stage,
                        steps = tracker.steps_executed,
                        "Run stopped by stage failure"
                    );
                    session = current;
                    break RunOutcome::Failed { stage, reason };
                }
            }
        };

        Ok((session, tracker.steps_executed, outcome))
    }

    /// One advance for `run`. ERROR and transient stage failures are
    /// outcomes here, not errors.
    async fn step(&self, session_id: Uuid) -> Result<RunStep> {
        match self.advance(session_id).await {
            Ok(step) if step.action.is_some() => Ok(RunStep::Advanced(step.session)),
            Ok(step) => Ok(RunStep::Idle(step.session)),
            Err(PipelineError::Provider {
                retryable: false, ..
            }) => Ok(RunStep::Advanced(self.get_session(session_id).await?)),
            Err(e) if e.is_retryable() => {
                let session = self.get_session(session_id).await?;
                let Some(stage) = StageKind::for_status(session.status) else {
                    return Err(e);
                };
                let reason = match e {
                    PipelineError::Provider { reason, .. } => reason,
                    other => other.to_string(),
                };
                Ok(RunStep::Failed {
                    session,
                    stage,
                    reason,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Progress snapshot of a session
    pub async fn status(&self, session_id: Uuid) -> Result<StatusReport> {
        let session = self.get_session(session_id).await?;
        let drafts_count = self.store.drafts_for_session(session_id).await?.len();

        Ok(StatusReport {
            session_id,
            status: session.status,
            progress_percent: session.progress_percent(),
            can_process: session.can_advance(),
            drafts_count,
            error_details: session.error_details,
        })
    }

    /// Publish one draft through the configured publisher
    pub async fn publish(&self, draft_id: &str) -> Result<PublishResult> {
        self.assembler.publish(draft_id).await
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        Ok(self.store.list_sessions(limit).await?)
    }

    pub async fn latest_incomplete(&self) -> Result<Option<Session>> {
        Ok(self.store.latest_incomplete().await?)
    }

    /// Drafts of a session, which must exist
    pub async fn drafts(&self, session_id: Uuid) -> Result<Vec<Draft>> {
        self.get_session(session_id).await?;
        Ok(self.store.drafts_for_session(session_id).await?)
    }

    /// Record the failure and move the session to ERROR in one write
    async fn mark_errored(&self, mut session: Session, stage: StageKind, reason: &str) -> Result<()> {
        session.status = SessionStatus::Error;
        session.error_details = Some(ErrorDetails {
            stage: stage.as_str().to_string(),
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        });
        session.touch();
        self.store.save(&session).await?;
        Ok(())
    }
}

fn settled_outcome(status: SessionStatus) -> RunOutcome {
    match status {
        SessionStatus::Completed => RunOutcome::Completed,
        SessionStatus::Error => RunOutcome::Errored,
        _ => RunOutcome::Stepped,
    }
}
