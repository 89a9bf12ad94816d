//! Golden frame benchmark
//!
//! Runs the shadow evaluator over a versioned set of curated frames and
//! checks each against its expected intent and tool sequence. A failing
//! report blocks promotion of a changed configuration; it never touches
//! live calls.

use receptionist_core::BusinessConfig;
use receptionist_store::GoldenSet;
use serde::{Deserialize, Serialize};

use crate::shadow::ShadowEvaluator;
use crate::EvalError;

/// Aggregated outcome of one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub version: u32,
    pub total: usize,
    pub passed: usize,
    /// One line per failing frame: id plus what diverged
    pub failures: Vec<String>,
    pub avg_score: f64,
}

impl BenchmarkReport {
    /// A failing benchmark blocks promotion of the configuration under
    /// test; it does not affect admitted calls.
    pub fn blocks_promotion(&self) -> bool {
        self.passed < self.total
    }
}

/// Evaluate every frame in `set` and compare against its expectation.
pub async fn run_benchmark(
    evaluator: &ShadowEvaluator,
    set: &GoldenSet,
    business: &BusinessConfig,
) -> Result<BenchmarkReport, EvalError> {
    let mut passed = 0usize;
    let mut failures = Vec::new();
    let mut score_sum = 0.0;

    for golden in &set.frames {
        let result = match evaluator.evaluate(&golden.frame, business).await {
            Ok(result) => result,
            Err(EvalError::UnauthorizedWrite { tool, .. }) => {
                // The write gate tripping on a curated frame is itself a
                // benchmark failure, not an infrastructure error.
                failures.push(format!("{}: unauthorized write via '{tool}'", golden.id));
                continue;
            }
            Err(e) => return Err(e),
        };
        score_sum += result.match_score;

        let intent_ok = golden.frame.overall_intent() == golden.expected.intent;
        let tools_ok = result.tool_sequence == golden.expected.tool_calls;

        if intent_ok && tools_ok && result.passed {
            passed += 1;
        } else {
            let mut reasons = Vec::new();
            if !intent_ok {
                reasons.push(format!(
                    "intent {:?} != expected {:?}",
                    golden.frame.overall_intent(),
                    golden.expected.intent
                ));
            }
            if !tools_ok {
                reasons.push(format!(
                    "tools {:?} != expected {:?}",
                    result.tool_sequence, golden.expected.tool_calls
                ));
            }
            if !result.passed {
                reasons.push("shadow/live divergence".to_string());
            }
            failures.push(format!("{}: {}", golden.id, reasons.join("; ")));
        }
    }

    let total = set.frames.len();
    let report = BenchmarkReport {
        version: set.version,
        total,
        passed,
        failures,
        avg_score: if total == 0 { 1.0 } else { score_sum / total as f64 },
    };

    if report.blocks_promotion() {
        tracing::warn!(
            version = report.version,
            passed = report.passed,
            total = report.total,
            "Golden benchmark failing, configuration promotion blocked"
        );
    } else {
        tracing::info!(
            version = report.version,
            total = report.total,
            avg_score = report.avg_score,
            "Golden benchmark passing"
        );
    }
    Ok(report)
}
