//! Step budget for auto-progression.
//!
//! Each stage invokes a paid external provider, so an auto-run is bounded by
//! a maximum number of stage executions. Exhausting the budget is reported
//! as a distinct outcome and leaves the session resumable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits for a single `run` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBudget {
    /// Maximum stage executions per run (default: 10)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

pub(crate) fn default_max_steps() -> u32 {
    10
}

impl Default for StepBudget {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

impl StepBudget {
    pub fn new(max_steps: u32) -> Self {
        Self { max_steps }
    }

    /// Check current tracker state against the budget
    pub fn check(&self, tracker: &BudgetTracker) -> Result<(), BudgetViolation> {
        if tracker.steps_executed >= self.max_steps {
            return Err(BudgetViolation::MaxSteps {
                actual: tracker.steps_executed,
                limit: self.max_steps,
            });
        }
        Ok(())
    }
}

/// Tracks stage executions during a run
#[derive(Debug, Clone, Default)]
pub struct BudgetTracker {
    /// Number of stages executed
    pub steps_executed: u32,
}

impl BudgetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage execution
    pub fn record_step(&mut self) {
        self.steps_executed += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetViolation {
    #[error("Maximum steps reached: {actual} >= {limit}")]
    MaxSteps { actual: u32, limit: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        assert_eq!(StepBudget::default().max_steps, 10);
    }

    #[test]
    fn test_tracker_step_counting() {
        let budget = StepBudget::new(2);

        let mut tracker = BudgetTracker::new();
        assert!(budget.check(&tracker).is_ok());

        tracker.record_step();
        assert!(budget.check(&tracker).is_ok());

        tracker.record_step();
        assert_eq!(
            budget.check(&tracker),
            Err(BudgetViolation::MaxSteps { actual: 2, limit: 2 })
        );
    }

    #[test]
    fn test_zero_budget_allows_nothing() {
        let budget = StepBudget::new(0);
        assert!(budget.check(&BudgetTracker::new()).is_err());
    }
}
