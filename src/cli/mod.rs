//! Command-line interface for contentflow.
//!
//! Provides commands for creating sessions, advancing them one stage at a
//! time or to completion, inspecting progress and drafts, and publishing.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{HttpPublisher, HttpStageProvider, Providers};
use crate::config::{self, ResolvedConfig};
use crate::core::{AdvanceOptions, Orchestrator, RunOptions, RunOutcome};
use crate::domain::{Draft, Session, SessionConfig};
use crate::store::SqliteStore;

/// contentflow - Session-driven content generation pipeline
#[derive(Parser, Debug)]
#[command(name = "contentflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new session
    Create {
        /// Theme the content is about
        theme: String,

        /// Target platform
        #[arg(short, long, default_value = "Twitter")]
        platform: String,

        /// Content style
        #[arg(short, long, default_value = "entertainment")]
        style: String,
    },

    /// Run the next stage of a session
    Advance {
        /// Session ID (UUID)
        session_id: String,

        /// Concept ids to finalize (comma-separated; auto-selected if omitted)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Character voice for the finalize stage
        #[arg(long)]
        character: Option<String>,
    },

    /// Advance a session once, or to completion with --auto
    Run {
        /// Session ID (UUID)
        session_id: Option<String>,

        /// Keep advancing until the session completes or the budget runs out
        #[arg(long)]
        auto: bool,

        /// Maximum stage executions for --auto
        #[arg(long, env = "CONTENTFLOW_MAX_STEPS")]
        max_steps: Option<u32>,

        /// Continue the most recent incomplete session
        #[arg(long, conflicts_with = "session_id")]
        latest: bool,

        /// Create a new session with this theme and run it
        #[arg(long, conflicts_with_all = ["session_id", "latest"])]
        theme: Option<String>,
    },

    /// Show the progress of a session
    Status {
        /// Session ID (UUID)
        session_id: String,
    },

    /// List recent sessions
    Sessions {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List the drafts of a session
    Drafts {
        /// Session ID (UUID)
        session_id: String,
    },

    /// Publish a draft
    Publish {
        /// Draft ID
        draft_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Create {
                theme,
                platform,
                style,
            } => create_session(theme, platform, style).await,
            Commands::Advance {
                session_id,
                select,
                character,
            } => advance_session(&session_id, select, character).await,
            Commands::Run {
                session_id,
                auto,
                max_steps,
                latest,
                theme,
            } => run_session(session_id, auto, max_steps, latest, theme).await,
            Commands::Status { session_id } => show_status(&session_id).await,
            Commands::Sessions { limit } => list_sessions(limit).await,
            Commands::Drafts { session_id } => list_drafts(&session_id).await,
            Commands::Publish { draft_id } => publish_draft(&draft_id).await,
            Commands::Config => show_config(),
        }
    }
}

/// Wire the orchestrator from the resolved configuration
fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let store = SqliteStore::open(&cfg.database)?;

    let provider = HttpStageProvider::new(&cfg.providers.base_url, cfg.providers.timeout())?;
    let providers = Providers::from_single(Arc::new(provider));

    let mut orchestrator = Orchestrator::new(Arc::new(store), providers, cfg.pipeline.clone());

    if let Some(publish_url) = &cfg.providers.publish_url {
        let mut publisher = HttpPublisher::new(publish_url, cfg.providers.timeout())?;
        if let Some(token) = &cfg.providers.publish_token {
            publisher = publisher.with_token(token);
        }
        orchestrator = orchestrator.with_publisher(Arc::new(publisher));
    }

    Ok(orchestrator)
}

fn orchestrator() -> Result<Orchestrator> {
    build_orchestrator(config::config()?)
}

fn parse_session_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid session ID: {}", value))
}

async fn create_session(theme: String, platform: String, style: String) -> Result<()> {
    let orchestrator = orchestrator()?;
    let session = orchestrator
        .create_session(
            SessionConfig::new(theme)
                .with_platform(platform)
                .with_style(style),
        )
        .await?;

    println!("{}", session.id);
    eprintln!("[Session created: {}]", session.status);
    Ok(())
}

async fn advance_session(
    session_id: &str,
    select: Vec<String>,
    character: Option<String>,
) -> Result<()> {
    let session_id = parse_session_id(session_id)?;

    let options = AdvanceOptions {
        selected_concept_ids: if select.is_empty() { None } else { Some(select) },
        character_id: character,
    };

    let step = orchestrator()?.advance_with(session_id, options).await?;

    match step.action {
        Some(action) => println!("{}: {}", action, step.message),
        None => println!("{}", step.message),
    }
    println!(
        "Status: {} ({}%)",
        step.session.status,
        step.session.progress_percent()
    );
    print_drafts(&step.drafts);

    Ok(())
}

async fn run_session(
    session_id: Option<String>,
    auto: bool,
    max_steps: Option<u32>,
    latest: bool,
    theme: Option<String>,
) -> Result<()> {
    let orchestrator = orchestrator()?;

    let session_id = if let Some(id) = session_id {
        parse_session_id(&id)?
    } else if latest {
        orchestrator
            .latest_incomplete()
            .await?
            .map(|s| s.id)
            .context("No incomplete session found")?
    } else if let Some(theme) = theme {
        let session = orchestrator.create_session(SessionConfig::new(theme)).await?;
        eprintln!("[Session created: {}]", session.id);
        session.id
    } else {
        anyhow::bail!("No session given. Pass a session ID, --latest, or --theme");
    };

    let options = RunOptions {
        auto_progress: auto,
        max_steps,
    };
    let result = orchestrator.run(session_id, options).await?;

    print_drafts(&result.drafts);

    match result.outcome {
        RunOutcome::Completed => {
            eprintln!(
                "\n[Session {} completed in {} steps]",
                session_id, result.steps_taken
            );
        }
        RunOutcome::Stepped => {
            eprintln!(
                "\n[Session {} now {} ({}%)]",
                session_id,
                result.final_status,
                result.final_status.progress_percent()
            );
        }
        RunOutcome::Errored => {
            match &result.error_details {
                Some(details) => eprintln!(
                    "\n[Session {} is in ERROR: {} failed: {}]",
                    session_id, details.stage, details.reason
                ),
                None => eprintln!("\n[Session {} is in ERROR]", session_id),
            }
            std::process::exit(1);
        }
        RunOutcome::Failed { stage, reason } => {
            eprintln!(
                "\n[Session {} stopped at {} after {} steps: {} failed: {}]",
                session_id, result.final_status, result.steps_taken, stage, reason
            );
            eprintln!("[Resume with: contentflow run {} --auto]", session_id);
            std::process::exit(1);
        }
        RunOutcome::BudgetExceeded { max_steps } => {
            eprintln!(
                "\n[Session {} stopped at {}: step budget of {} reached]",
                session_id, result.final_status, max_steps
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn show_status(session_id: &str) -> Result<()> {
    let session_id = parse_session_id(session_id)?;
    let report = orchestrator()?.status(session_id).await?;

    println!("Session ID:  {}", report.session_id);
    println!("Status:      {}", report.status);
    println!("Progress:    {}%", report.progress_percent);
    println!("Can process: {}", report.can_process);
    println!("Drafts:      {}", report.drafts_count);
    if let Some(details) = &report.error_details {
        println!(
            "Error:       {} ({}, {})",
            details.reason, details.stage, details.occurred_at
        );
    }

    Ok(())
}

async fn list_sessions(limit: usize) -> Result<()> {
    let sessions = orchestrator()?.list_sessions(limit).await?;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!("{:<38} {:<20} {:<8} {}", "SESSION ID", "STATUS", "PROGRESS", "THEME");
    println!("{}", "-".repeat(90));

    for session in sessions {
        print_session_row(&session);
    }

    Ok(())
}

fn print_session_row(session: &Session) {
    println!(
        "{:<38} {:<20} {:<8} {}",
        session.id,
        session.status,
        format!("{}%", session.progress_percent()),
        session.theme
    );
}

async fn list_drafts(session_id: &str) -> Result<()> {
    let session_id = parse_session_id(session_id)?;
    let drafts = orchestrator()?.drafts(session_id).await?;

    if drafts.is_empty() {
        println!("No drafts for session {}", session_id);
        return Ok(());
    }

    print_drafts(&drafts);
    Ok(())
}

fn print_drafts(drafts: &[Draft]) {
    for draft in drafts {
        println!("\n[{}] {} ({})", draft.id, draft.title, draft.status);
        println!("{}", draft.publish_text());
        if let Some(url) = &draft.post_url {
            println!("Posted: {}", url);
        }
    }
}

async fn publish_draft(draft_id: &str) -> Result<()> {
    let result = orchestrator()?.publish(draft_id).await?;

    println!("{}", result.url);
    eprintln!("[Draft {} posted]", result.draft.id);
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("contentflow configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", config::contentflow_home()?.display());
    println!("  Database: {}", config::database_path()?.display());
    println!();
    println!("Providers:");
    println!("  Base URL:    {}", cfg.providers.base_url);
    println!(
        "  Publish URL: {}",
        cfg.providers.publish_url.as_deref().unwrap_or("(not configured)")
    );
    println!("  Timeout:     {}s", cfg.providers.timeout_seconds);
    println!();
    println!("Pipeline:");
    println!("  Max steps:         {}", cfg.pipeline.max_steps);
    println!("  Auto-select top N: {}", cfg.pipeline.selection.top_n);
    println!("  Tie break:         {:?}", cfg.pipeline.selection.tie_break);
    println!(
        "  Default character: {}",
        cfg.pipeline.default_character_id.as_deref().unwrap_or("(none)")
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from(["contentflow", "run", "--latest", "--auto", "--max-steps", "4"])
            .unwrap();

        match cli.command {
            Commands::Run {
                session_id,
                auto,
                max_steps,
                latest,
                theme,
            } => {
                assert!(session_id.is_none());
                assert!(auto && latest);
                assert_eq!(max_steps, Some(4));
                assert!(theme.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_selection_list() {
        let cli = Cli::try_parse_from([
            "contentflow",
            "advance",
            "550e8400-e29b-41d4-a716-446655440000",
            "--select",
            "c1,c3",
        ])
        .unwrap();

        match cli.command {
            Commands::Advance { select, character, .. } => {
                assert_eq!(select, vec!["c1", "c3"]);
                assert!(character.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_latest_conflicts_with_session_id() {
        let parsed = Cli::try_parse_from([
            "contentflow",
            "run",
            "550e8400-e29b-41d4-a716-446655440000",
            "--latest",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_invalid_session_id() {
        assert!(parse_session_id("not-a-uuid").is_err());
    }
}
