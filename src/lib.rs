//! contentflow - Session-driven content generation pipeline
//!
//! Drives a social-media content session through a fixed sequence of
//! generation stages, one resumable step at a time.
//!
//! # Architecture
//!
//! The session record in the store is the only state:
//! - Each `advance` re-reads the session and runs the single next stage
//! - A successful stage is persisted with exactly one store write
//! - A failed stage writes nothing, so the same call can be repeated
//!
//! # Modules
//!
//! - `adapters`: Generation providers and the publisher (HTTP)
//! - `core`: Stage table, executor, orchestrator, draft assembly
//! - `domain`: Session, artifacts, drafts
//! - `store`: Session persistence (SQLite, in-memory)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a session and drive it to completion
//! contentflow run --theme "AI and the future of work" --auto
//!
//! # Continue the most recent unfinished session
//! contentflow run --latest --auto
//!
//! # Check progress
//! contentflow status <session-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{
    ConceptGenerator, ContentFinalizer, ProviderError, Providers, PublishFailure, Published,
    Publisher, TopicCollector,
};
pub use core::{
    AdvanceOptions, Orchestrator, PipelineSettings, RunOptions, RunOutcome, RunResult, StageKind,
    StatusReport, StepResult,
};
pub use domain::{Concept, Content, Draft, DraftStatus, Session, SessionConfig, SessionStatus, Topic};
pub use error::{PipelineError, Result};
pub use store::{InMemoryStore, SessionStore, SqliteStore};
