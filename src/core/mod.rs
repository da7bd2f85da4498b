//! Core orchestration logic.
//!
//! This module contains:
//! - Stage: the fixed status → action table
//! - Executor: runs one stage with exactly one store write
//! - Assembler: drafts and publishing
//! - Orchestrator: advance/run/status entry points
//! - Budget, Selection, Pipeline: run limits and tunable settings

pub mod assembler;
pub mod budget;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod selection;
pub mod stage;

// Re-export commonly used types
pub use assembler::{build_drafts, DraftAssembler, PublishResult};
pub use budget::{BudgetTracker, BudgetViolation, StepBudget};
pub use executor::{AdvanceOptions, ExecutedStage, StageExecutor};
pub use orchestrator::{Orchestrator, RunOptions, RunOutcome, RunResult, StatusReport, StepResult};
pub use pipeline::PipelineSettings;
pub use selection::{validate_selection, SelectionPolicy, TieBreak};
pub use stage::StageKind;
