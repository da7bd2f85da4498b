//! Concept selection: auto top-N ranking and caller selection checks.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::Concept;

/// How auto-selection picks concepts when the caller supplies none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Number of concepts to select (default: 3)
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Ordering among concepts with equal scores
    #[serde(default)]
    pub tie_break: TieBreak,
}

fn default_top_n() -> usize {
    3
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            tie_break: TieBreak::default(),
        }
    }
}

/// Tie-break rule for equal scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the order the generator returned (stable sort)
    #[default]
    GenerationOrder,

    /// Lexical order of concept ids
    ConceptId,
}

impl SelectionPolicy {
    /// Pick concept ids by score descending, at most `top_n`.
    ///
    /// NaN scores rank below every real score.
    pub fn select(&self, concepts: &[Concept]) -> Vec<String> {
        let mut ranked: Vec<&Concept> = concepts.iter().collect();

        ranked.sort_by(|a, b| {
            compare_scores(b.score, a.score).then_with(|| match self.tie_break {
                TieBreak::GenerationOrder => Ordering::Equal,
                TieBreak::ConceptId => a.id.cmp(&b.id),
            })
        });

        ranked
            .into_iter()
            .take(self.top_n.max(1))
            .map(|c| c.id.clone())
            .collect()
    }
}

/// Ascending comparison with NaN lowest
fn compare_scores(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Check a selection is a non-empty, duplicate-free subset of generated ids
pub fn validate_selection(concepts: &[Concept], selected: &[String]) -> Result<(), String> {
    if selected.is_empty() {
        return Err("selection is empty".to_string());
    }

    let known: HashSet<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
    let mut seen = HashSet::new();

    for id in selected {
        if !known.contains(id.as_str()) {
            return Err(format!("unknown concept id '{}'", id));
        }
        if !seen.insert(id.as_str()) {
            return Err(format!("concept id '{}' selected twice", id));
        }
    }

    Ok(())
}
