//! Pipeline settings.
//!
//! The stage sequence itself is fixed; what callers tune is the step budget
//! for auto-runs, how concepts are auto-selected, and the character voice
//! passed to the finalizer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::budget::{default_max_steps, StepBudget};
use super::selection::SelectionPolicy;

/// Tunable behaviour of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Default budget for auto-runs when the caller passes none
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Auto-selection when the caller supplies no concept ids
    #[serde(default)]
    pub selection: SelectionPolicy,

    /// Character used at the finalize stage unless the caller overrides it
    #[serde(default = "default_character_id")]
    pub default_character_id: Option<String>,
}

fn default_character_id() -> Option<String> {
    Some("default".to_string())
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            selection: SelectionPolicy::default(),
            default_character_id: default_character_id(),
        }
    }
}

impl PipelineSettings {
    /// Parse settings from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self =
            serde_yaml::from_str(content).context("Failed to parse pipeline settings YAML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            anyhow::bail!("max_steps must be at least 1");
        }

        if self.selection.top_n == 0 {
            anyhow::bail!("selection.top_n must be at least 1");
        }

        if let Some(character) = &self.default_character_id {
            if character.trim().is_empty() {
                anyhow::bail!("default_character_id cannot be blank");
            }
        }

        Ok(())
    }

    /// Budget used by auto-runs that don't pass their own
    pub fn default_budget(&self) -> StepBudget {
        StepBudget::new(self.max_steps)
    }
}
