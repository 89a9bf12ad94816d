//! Shadow evaluator
//!
//! Replays one conversation frame against the same system instructions and
//! tool definitions the live call used. Tool calls are simulated: the
//! recorded result is fed back verbatim, so the shadow conditions on the
//! exact values the live AI observed. Temporal context comes from the
//! frame's own timestamps, never the wall clock, which keeps the whole
//! evaluation deterministic for a given frame.

use std::sync::Arc;

use receptionist_core::{BusinessConfig, ConversationFrame, EvaluationResult, Speaker, Turn};
use receptionist_tools::{ToolRegistry, ToolSpec};

use crate::replay::{ReplayClient, ReplayMessage};
use crate::EvalError;

pub struct ShadowEvaluator {
    client: Arc<dyn ReplayClient>,
    tools: Arc<ToolRegistry>,
}

impl ShadowEvaluator {
    pub fn new(client: Arc<dyn ReplayClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { client, tools }
    }

    /// Replay `frame` and score shadow-vs-live parity.
    pub async fn evaluate(
        &self,
        frame: &ConversationFrame,
        business: &BusinessConfig,
    ) -> Result<EvaluationResult, EvalError> {
        let specs = self.tools.specs_for(&business.tool_definitions);
        let mut history = vec![ReplayMessage::system(self.instructions(frame, business))];

        let mut matches = 0usize;
        let mut assistant_turns = 0usize;
        let mut tool_match = true;
        let mut discrepancies = Vec::new();
        let mut shadow_tools = Vec::new();

        for turn in &frame.turns {
            match turn.speaker {
                Speaker::Caller => history.push(ReplayMessage::user(turn.text.clone())),
                Speaker::Ai => {
                    assistant_turns += 1;
                    let decision = self.client.decide(&history, &specs).await?;

                    let live_tool = turn.tool_calls.first().map(|c| c.name.as_str());
                    let shadow_tool = decision.tool_call.as_ref().map(|c| c.name.as_str());

                    if let Some(name) = shadow_tool {
                        shadow_tools.push(name.to_string());
                        // Simulation write gate: a write-classified tool may
                        // only be "run" by feeding back a recorded result.
                        // If the live call never ran it, there is nothing to
                        // simulate and executing for real is off the table.
                        if self.tools.is_write_action(name) && live_tool != Some(name) {
                            return Err(EvalError::UnauthorizedWrite {
                                call_sid: frame.call_sid.clone(),
                                tool: name.to_string(),
                            });
                        }
                    }

                    if shadow_tool == live_tool {
                        matches += 1;
                    } else {
                        tool_match = false;
                        discrepancies.push(format!(
                            "turn {}: shadow wanted {:?}, live used {:?}",
                            assistant_turns, shadow_tool, live_tool
                        ));
                    }

                    self.append_live_turn(&mut history, turn);
                }
            }
        }

        let match_score = if assistant_turns == 0 {
            1.0
        } else {
            matches as f64 / assistant_turns as f64
        };
        // Score the shadow's transcript under the same intent rules the
        // live frame was scored with, substituting the shadow's tool
        // decisions. The caller turns are shared, so the two labels can
        // only diverge on whether a booking landed.
        let shadow_booked = shadow_tools.iter().any(|t| t == "book_appointment")
            && frame.booking_completed();
        let intent_match = frame.intent_given_booking(shadow_booked) == frame.overall_intent();

        Ok(EvaluationResult {
            call_sid: frame.call_sid.clone(),
            match_score,
            intent_match,
            tool_match,
            discrepancies,
            tool_sequence: shadow_tools,
            passed: tool_match && intent_match,
        })
    }

    /// Same prompt the live session was configured with, plus the call's
    /// recorded temporal context.
    fn instructions(&self, frame: &ConversationFrame, business: &BusinessConfig) -> String {
        let mut instructions = business.system_instructions();
        if let Some(first) = frame.turns.first() {
            instructions.push_str(&format!(
                "\n\nCurrent Date: {}",
                first.timestamp.format("%A, %Y-%m-%d")
            ));
        }
        instructions.push_str(&format!("\nCurrent Timezone: {}", frame.timezone));
        instructions
    }

    /// Extend history with what the live AI actually did, so the next
    /// shadow decision is conditioned on the real conversation.
    fn append_live_turn(&self, history: &mut Vec<ReplayMessage>, turn: &Turn) {
        if !turn.text.is_empty() {
            history.push(ReplayMessage::assistant(turn.text.clone()));
        }
        if let (Some(call), Some(result)) = (turn.tool_calls.first(), turn.tool_result.as_deref()) {
            history.push(ReplayMessage::function(call.name.clone(), result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayDecision, ScriptedReplayClient};
    use chrono::{DateTime, Utc};
    use receptionist_core::ToolCall;
    use receptionist_tools::{create_default_registry, SimulatedCalendar};
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(create_default_registry(Arc::new(SimulatedCalendar::new())))
    }

    fn booking_frame() -> ConversationFrame {
        let mut frame = ConversationFrame::new("CA1", "+15550001111", "America/New_York");
        frame
            .turns
            .push(Turn::ai("Hi, thank you for calling Acme.", ts("2025-03-01T10:00:00Z")));
        frame.turns.push(Turn::caller(
            "Can I book an appointment Monday at two?",
            ts("2025-03-01T10:00:10Z"),
        ));
        frame.turns.push(Turn::tool(
            ToolCall {
                name: "check_availability".to_string(),
                arguments: json!({"start_iso": "2025-03-03T14:00:00"}),
            },
            "The slot on March 03 at 02:00 PM is available.",
            ts("2025-03-01T10:00:15Z"),
        ));
        frame.turns.push(Turn::ai(
            "That slot is open. Shall I book it?",
            ts("2025-03-01T10:00:20Z"),
        ));
        frame
    }

    fn scripted_matching_decisions() -> Vec<ReplayDecision> {
        vec![
            // Greeting turn: no tool either side.
            ReplayDecision {
                text: Some("Hello!".to_string()),
                tool_call: None,
            },
            // Tool turn: shadow also wants check_availability.
            ReplayDecision {
                text: None,
                tool_call: Some(ToolCall {
                    name: "check_availability".to_string(),
                    arguments: json!({"start_iso": "2025-03-03T14:00:00"}),
                }),
            },
            // Follow-up text turn.
            ReplayDecision {
                text: Some("That works, want me to book it?".to_string()),
                tool_call: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_full_parity_scores_one() {
        let evaluator = ShadowEvaluator::new(
            Arc::new(ScriptedReplayClient::new(scripted_matching_decisions())),
            registry(),
        );

        let result = evaluator
            .evaluate(&booking_frame(), &BusinessConfig::default())
            .await
            .unwrap();

        assert_eq!(result.match_score, 1.0);
        assert!(result.tool_match);
        assert!(result.passed);
        assert_eq!(result.tool_sequence, vec!["check_availability"]);
        assert!(result.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_replay_is_deterministic_for_identical_input() {
        let frame = booking_frame();
        let business = BusinessConfig::default();

        let mut results = Vec::new();
        for _ in 0..2 {
            let evaluator = ShadowEvaluator::new(
                Arc::new(ScriptedReplayClient::new(scripted_matching_decisions())),
                registry(),
            );
            results.push(evaluator.evaluate(&frame, &business).await.unwrap());
        }
        assert_eq!(results[0], results[1]);
    }

    #[tokio::test]
    async fn test_tool_divergence_is_a_discrepancy() {
        let decisions = vec![
            ReplayDecision::default(),
            // Shadow skips the availability check the live call made.
            ReplayDecision {
                text: Some("It's probably free".to_string()),
                tool_call: None,
            },
            ReplayDecision::default(),
        ];
        let evaluator =
            ShadowEvaluator::new(Arc::new(ScriptedReplayClient::new(decisions)), registry());

        let result = evaluator
            .evaluate(&booking_frame(), &BusinessConfig::default())
            .await
            .unwrap();

        assert!(!result.tool_match);
        assert!(!result.passed);
        assert!(result.match_score < 1.0);
        assert_eq!(result.discrepancies.len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_write_is_a_hard_fault() {
        // Shadow wants to book, but the live call never did, so there is
        // no recorded result to simulate with.
        let decisions = vec![
            ReplayDecision::default(),
            ReplayDecision {
                text: None,
                tool_call: Some(ToolCall {
                    name: "book_appointment".to_string(),
                    arguments: json!({
                        "start_iso": "2025-03-03T14:00:00",
                        "customer_name": "Someone"
                    }),
                }),
            },
            ReplayDecision::default(),
        ];
        let evaluator =
            ShadowEvaluator::new(Arc::new(ScriptedReplayClient::new(decisions)), registry());

        let err = evaluator
            .evaluate(&booking_frame(), &BusinessConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EvalError::UnauthorizedWrite { ref tool, .. } if tool == "book_appointment"
        ));
    }

    #[tokio::test]
    async fn test_simulated_write_with_recorded_result_is_allowed() {
        let mut frame = booking_frame();
        frame.turns.push(Turn::caller(
            "Yes please book it",
            ts("2025-03-01T10:00:30Z"),
        ));
        frame.turns.push(Turn::tool(
            ToolCall {
                name: "book_appointment".to_string(),
                arguments: json!({
                    "start_iso": "2025-03-03T14:00:00",
                    "customer_name": "Ana"
                }),
            },
            "Appointment confirmed for March 03 at 02:00 PM. Confirmation ID: abc",
            ts("2025-03-01T10:00:35Z"),
        ));

        let mut decisions = scripted_matching_decisions();
        decisions.push(ReplayDecision {
            text: None,
            tool_call: Some(ToolCall {
                name: "book_appointment".to_string(),
                arguments: json!({
                    "start_iso": "2025-03-03T14:00:00",
                    "customer_name": "Ana"
                }),
            }),
        });

        let evaluator =
            ShadowEvaluator::new(Arc::new(ScriptedReplayClient::new(decisions)), registry());
        let result = evaluator
            .evaluate(&frame, &BusinessConfig::default())
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(
            result.tool_sequence,
            vec!["check_availability", "book_appointment"]
        );
    }

    #[tokio::test]
    async fn test_declined_booking_flips_intent_match() {
        // Live call booked; shadow checks availability but then talks
        // the caller out of it. Same caller turns, different outcome.
        let mut frame = booking_frame();
        frame.turns.push(Turn::caller(
            "Yes please book it",
            ts("2025-03-01T10:00:30Z"),
        ));
        frame.turns.push(Turn::tool(
            ToolCall {
                name: "book_appointment".to_string(),
                arguments: json!({
                    "start_iso": "2025-03-03T14:00:00",
                    "customer_name": "Ana"
                }),
            },
            "Appointment confirmed for March 03 at 02:00 PM. Confirmation ID: abc",
            ts("2025-03-01T10:00:35Z"),
        ));

        let mut decisions = scripted_matching_decisions();
        decisions.push(ReplayDecision {
            text: Some("I'd suggest calling back tomorrow instead.".to_string()),
            tool_call: None,
        });

        let evaluator =
            ShadowEvaluator::new(Arc::new(ScriptedReplayClient::new(decisions)), registry());
        let result = evaluator
            .evaluate(&frame, &BusinessConfig::default())
            .await
            .unwrap();

        assert!(!result.intent_match);
        assert!(!result.passed);
        assert!(!result.tool_match);
    }

    #[tokio::test]
    async fn test_empty_frame_trivially_passes() {
        let evaluator = ShadowEvaluator::new(
            Arc::new(ScriptedReplayClient::default()),
            registry(),
        );
        let frame = ConversationFrame::new("CA9", "+1555", "UTC");
        let result = evaluator
            .evaluate(&frame, &BusinessConfig::default())
            .await
            .unwrap();
        assert_eq!(result, EvaluationResult::trivial_pass("CA9"));
    }
}
