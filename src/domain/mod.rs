//! Domain types for the content pipeline.
//!
//! This module contains the core data structures:
//! - Session: Pipeline session state and status sequence
//! - Artifact: Stage outputs (topics, concepts, contents)
//! - Draft: Publishable units produced by the final stage

pub mod artifact;
pub mod draft;
pub mod session;

// Re-export commonly used types
pub use artifact::{Concept, ConceptOutline, Content, Topic};
pub use draft::{draft_key, Draft, DraftStatus};
pub use session::{ErrorDetails, Session, SessionConfig, SessionStatus};
