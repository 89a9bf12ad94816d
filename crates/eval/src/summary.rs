//! Aggregation over stored evaluation results
//!
//! Rolling quality picture across recent calls, logged beside the golden
//! benchmark. Purely derived data; nothing here feeds back into live calls.

use receptionist_core::EvaluationResult;
use serde::{Deserialize, Serialize};

/// Aggregate over a batch of evaluation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub avg_match_score: f64,
    /// Results where the shadow's tool choices diverged from the live call
    pub tool_divergences: usize,
}

impl EvalSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Summarize a batch of results. An empty batch reads as fully passing.
pub fn summarize(results: &[EvaluationResult]) -> EvalSummary {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let tool_divergences = results.iter().filter(|r| !r.tool_match).count();
    let avg_match_score = if total == 0 {
        1.0
    } else {
        results.iter().map(|r| r.match_score).sum::<f64>() / total as f64
    };

    EvalSummary {
        total,
        passed,
        avg_match_score,
        tool_divergences,
    }
}
