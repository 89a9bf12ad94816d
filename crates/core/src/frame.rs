//! Conversation Frames
//!
//! Structured summary of a call, recorded independently of raw audio and
//! persisted after the call ends. This is the input to the shadow
//! evaluator, so the recorded tool results must be exactly what the live
//! AI observed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Caller,
    Ai,
}

/// A tool invocation issued by the AI during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    /// Intent inferred from the caller's words, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Tool calls issued within this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The structured result the live AI was given for the tool call.
    /// Fed back verbatim during shadow replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
    /// Opaque UTC timestamp (never converted to a local zone)
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn caller(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let text = text.into();
        Self {
            speaker: Speaker::Caller,
            intent: crate::intent::infer_intent(&text).map(str::to_string),
            text,
            tool_calls: Vec::new(),
            tool_result: None,
            timestamp,
        }
    }

    pub fn ai(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            speaker: Speaker::Ai,
            text: text.into(),
            intent: None,
            tool_calls: Vec::new(),
            tool_result: None,
            timestamp,
        }
    }

    pub fn tool(call: ToolCall, result: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            speaker: Speaker::Ai,
            text: String::new(),
            intent: None,
            tool_calls: vec![call],
            tool_result: Some(result.into()),
            timestamp,
        }
    }
}

/// Persisted structured summary of one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationFrame {
    /// Carrier call identifier
    pub call_sid: String,
    /// Caller phone number
    pub caller_number: String,
    /// Business timezone at call time, opaque
    pub timezone: String,
    /// Turns ordered by timestamp
    pub turns: Vec<Turn>,
}

impl ConversationFrame {
    pub fn new(
        call_sid: impl Into<String>,
        caller_number: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            call_sid: call_sid.into(),
            caller_number: caller_number.into(),
            timezone: timezone.into(),
            turns: Vec::new(),
        }
    }

    /// Overall intent of the call, derived from turns.
    ///
    /// A completed booking tool call dominates; otherwise the strongest
    /// caller intent wins, defaulting to a plain inquiry.
    pub fn overall_intent(&self) -> &'static str {
        self.intent_given_booking(self.booking_completed())
    }

    /// Whether a booking tool call ran and did not error.
    pub fn booking_completed(&self) -> bool {
        self.turns.iter().any(|t| {
            t.tool_calls.iter().any(|c| c.name == "book_appointment")
                && t.tool_result.as_deref().is_some_and(|r| !r.starts_with("Error"))
        })
    }

    /// Intent label for these caller turns given whether a booking
    /// landed. Lets a replay with different tool decisions be scored
    /// against the live call under the same rules.
    pub fn intent_given_booking(&self, booked: bool) -> &'static str {
        if booked {
            return "booking";
        }
        if self
            .turns
            .iter()
            .any(|t| t.intent.as_deref() == Some("booking"))
        {
            return "booking_inquiry";
        }
        if self
            .turns
            .iter()
            .any(|t| t.intent.as_deref() == Some("message"))
        {
            return "message";
        }
        "inquiry"
    }

    /// Names of tools actually invoked during the call, in order.
    pub fn tool_sequence(&self) -> Vec<String> {
        self.turns
            .iter()
            .flat_map(|t| t.tool_calls.iter().map(|c| c.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        "2025-03-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_caller_turn_infers_intent() {
        let turn = Turn::caller("I'd like to book an appointment", ts());
        assert_eq!(turn.intent.as_deref(), Some("booking"));
    }

    #[test]
    fn test_overall_intent_booked() {
        let mut frame = ConversationFrame::new("CA1", "+1555", "UTC");
        frame.turns.push(Turn::caller("Can I book tomorrow at 2?", ts()));
        frame.turns.push(Turn::tool(
            ToolCall {
                name: "book_appointment".to_string(),
                arguments: json!({"start_iso": "2025-03-02T14:00:00"}),
            },
            "Confirmed! Appointment ID: abc",
            ts(),
        ));
        assert_eq!(frame.overall_intent(), "booking");
    }

    #[test]
    fn test_overall_intent_inquiry_only() {
        let mut frame = ConversationFrame::new("CA2", "+1555", "UTC");
        frame.turns.push(Turn::caller("What are your opening hours?", ts()));
        assert_eq!(frame.overall_intent(), "inquiry");
    }

    #[test]
    fn test_failed_booking_is_not_booked() {
        let mut frame = ConversationFrame::new("CA3", "+1555", "UTC");
        frame.turns.push(Turn::caller("book me in please", ts()));
        frame.turns.push(Turn::tool(
            ToolCall {
                name: "book_appointment".to_string(),
                arguments: json!({}),
            },
            "Error: slot unavailable",
            ts(),
        ));
        assert_eq!(frame.overall_intent(), "booking_inquiry");
    }

    #[test]
    fn test_tool_sequence_ordering() {
        let mut frame = ConversationFrame::new("CA4", "+1555", "UTC");
        frame.turns.push(Turn::tool(
            ToolCall { name: "check_availability".to_string(), arguments: json!({}) },
            "Available",
            ts(),
        ));
        frame.turns.push(Turn::tool(
            ToolCall { name: "book_appointment".to_string(), arguments: json!({}) },
            "Confirmed! Appointment ID: x",
            ts(),
        ));
        assert_eq!(
            frame.tool_sequence(),
            vec!["check_availability", "book_appointment"]
        );
    }

    #[test]
    fn test_frame_round_trips_through_json() {
        let mut frame = ConversationFrame::new("CA5", "+1555", "America/New_York");
        frame.turns.push(Turn::caller("hello", ts()));
        let json = serde_json::to_string(&frame).unwrap();
        let back: ConversationFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.call_sid, "CA5");
        assert_eq!(back.timezone, "America/New_York");
        assert_eq!(back.turns.len(), 1);
    }
}
