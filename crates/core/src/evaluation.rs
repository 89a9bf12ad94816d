//! Evaluation results
//!
//! Output of comparing a replayed conversation against the live frame or
//! a golden expectation.

use serde::{Deserialize, Serialize};

/// Result of one shadow evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub call_sid: String,
    /// Fraction of assistant turns where the shadow decision matched the
    /// live decision, 0.0 to 1.0
    pub match_score: f64,
    pub intent_match: bool,
    pub tool_match: bool,
    /// Human-readable per-turn diffs
    pub discrepancies: Vec<String>,
    /// Tool names the shadow replay chose, in order
    pub tool_sequence: Vec<String>,
    pub passed: bool,
}

impl EvaluationResult {
    /// Perfect-parity result for a frame with no assistant decisions.
    pub fn trivial_pass(call_sid: impl Into<String>) -> Self {
        Self {
            call_sid: call_sid.into(),
            match_score: 1.0,
            intent_match: true,
            tool_match: true,
            discrepancies: Vec::new(),
            tool_sequence: Vec::new(),
            passed: true,
        }
    }
}
