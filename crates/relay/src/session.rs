//! Per-call turn-taking state machine
//!
//! Pure core of the relay: carrier/AI events go in, a list of actions
//! comes out, and the relay loop performs them. All sequencing rules live
//! here, ordered by how much they hurt when violated:
//!
//! 1. No egress audio before the carrier's stream handle exists. Audio
//!    sent earlier is silently discarded by the carrier and the caller
//!    hears dead air.
//! 2. The opening turn is requested only after stream-start, exactly once.
//! 3. On barge-in the current AI turn is cancelled, the carrier's playback
//!    buffer flushed, and stale deltas from the cancelled turn suppressed.

use chrono::{DateTime, Utc};
use serde_json::Value;

use receptionist_core::{Turn, ToolCall};

use crate::carrier::{CarrierEvent, CarrierMessage};
use crate::realtime::{ClientEvent, ServerEvent};

/// Phrases that indicate a prompt-injection attempt in a caller transcript
const GUARDRAIL_PATTERNS: &[&str] = &[
    "forget your instructions",
    "ignore your instructions",
    "ignore the rules",
    "new rules",
    "forget previous",
];

const GUARDRAIL_RESPONSE: &str = "Politely say: 'I apologize, but I must follow my business \
     protocols. How can I help with your appointment?'";

fn guardrail_triggered(text: &str) -> bool {
    let lower = text.to_lowercase();
    GUARDRAIL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Relay lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    /// AI session configured, carrier stream handle not yet known
    AwaitingStreamStart,
    /// Bidirectional forwarding
    Active,
    /// One leg has closed; finalize and close the other
    Terminating,
}

/// Who currently holds the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    CallerSpeaking,
    AiSpeaking,
    /// Caller barged in mid-turn; AI audio for the cancelled turn is
    /// suppressed until the AI acknowledges the cancellation
    AiSpeakingInterrupted,
}

/// Side effects the relay loop must perform, in order
#[derive(Debug, Clone, PartialEq)]
pub enum RelayAction {
    ToAi(ClientEvent),
    ToCarrier(CarrierMessage),
    ExecuteTool {
        call_id: String,
        name: String,
        arguments: Value,
    },
    Record(Turn),
}

/// State for one admitted call
pub struct CallSession {
    pub call_sid: String,
    stream_sid: Option<String>,
    greeting: String,
    greeting_sent: bool,
    phase: RelayPhase,
    turn: TurnState,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    /// Egress audio events dropped by the stream-start guard
    dropped_egress: u64,
}

impl CallSession {
    pub fn new(call_sid: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            call_sid: call_sid.into(),
            stream_sid: None,
            greeting: greeting.into(),
            greeting_sent: false,
            phase: RelayPhase::AwaitingStreamStart,
            turn: TurnState::Idle,
            started_at: Utc::now(),
            ended_at: None,
            dropped_egress: 0,
        }
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// End timestamp once a stop has been observed. Duration is derived
    /// from these two timestamps outside the AI path, never from the
    /// conversation itself.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn dropped_egress(&self) -> u64 {
        self.dropped_egress
    }

    /// Handle an event from the carrier leg.
    pub fn on_carrier_event(&mut self, event: CarrierEvent) -> Vec<RelayAction> {
        match event {
            CarrierEvent::Connected | CarrierEvent::Other => Vec::new(),

            CarrierEvent::Start { start } => {
                if self.stream_sid.is_some() {
                    // Duplicate delivery of stream-start. Keep the original
                    // handle and do not re-trigger the opening turn.
                    tracing::warn!(call_sid = %self.call_sid, "Duplicate stream-start ignored");
                    return Vec::new();
                }
                tracing::info!(
                    call_sid = %self.call_sid,
                    stream_sid = %start.stream_sid,
                    "Carrier stream started"
                );
                self.stream_sid = Some(start.stream_sid);
                self.phase = RelayPhase::Active;

                if self.greeting_sent {
                    return Vec::new();
                }
                self.greeting_sent = true;
                vec![
                    RelayAction::ToAi(ClientEvent::scripted_response(format!(
                        "Say: {}. KEEP IT FAST.",
                        self.greeting
                    ))),
                    RelayAction::Record(Turn::ai(self.greeting.clone(), Utc::now())),
                ]
            }

            CarrierEvent::Media { media } => {
                if self.phase == RelayPhase::Terminating {
                    return Vec::new();
                }
                // Ingress passthrough. The AI side buffers appended audio
                // itself, so this is safe even before stream-start.
                vec![RelayAction::ToAi(ClientEvent::AudioAppend {
                    audio: media.payload,
                })]
            }

            CarrierEvent::Stop => {
                if self.phase != RelayPhase::Terminating {
                    tracing::info!(call_sid = %self.call_sid, "Carrier stream stopped");
                    self.phase = RelayPhase::Terminating;
                    self.ended_at = Some(Utc::now());
                }
                Vec::new()
            }
        }
    }

    /// Handle an event from the AI leg.
    pub fn on_ai_event(&mut self, event: ServerEvent) -> Vec<RelayAction> {
        match event {
            ServerEvent::AudioDelta { delta: Some(delta) } => {
                let Some(stream_sid) = self.stream_sid.clone() else {
                    // Stream handle not established yet. Forwarding now
                    // would silently discard the audio carrier-side.
                    self.dropped_egress += 1;
                    tracing::warn!(
                        call_sid = %self.call_sid,
                        dropped = self.dropped_egress,
                        "Dropping AI audio before stream-start"
                    );
                    return Vec::new();
                };
                if self.turn == TurnState::AiSpeakingInterrupted {
                    // Stale audio from the cancelled turn.
                    return Vec::new();
                }
                self.turn = TurnState::AiSpeaking;
                vec![RelayAction::ToCarrier(CarrierMessage::media(
                    stream_sid, delta,
                ))]
            }
            ServerEvent::AudioDelta { delta: None } => Vec::new(),

            ServerEvent::SpeechStarted => match self.turn {
                TurnState::AiSpeaking => {
                    tracing::info!(call_sid = %self.call_sid, "Caller barge-in, cancelling AI turn");
                    self.turn = TurnState::AiSpeakingInterrupted;
                    let mut actions = vec![RelayAction::ToAi(ClientEvent::ResponseCancel)];
                    if let Some(stream_sid) = self.stream_sid.clone() {
                        actions.push(RelayAction::ToCarrier(CarrierMessage::clear(stream_sid)));
                    }
                    actions
                }
                // Suppression holds until the AI acknowledges the cancel
                // with a turn-boundary event; renewed caller speech must
                // not re-open the door for the cancelled turn's audio.
                TurnState::AiSpeakingInterrupted => Vec::new(),
                _ => {
                    self.turn = TurnState::CallerSpeaking;
                    Vec::new()
                }
            },

            ServerEvent::SpeechStopped => {
                if self.turn == TurnState::CallerSpeaking {
                    self.turn = TurnState::Idle;
                }
                Vec::new()
            }

            ServerEvent::ResponseCancelled | ServerEvent::ResponseDone | ServerEvent::AudioDone => {
                // Turn boundary: lift any barge-in suppression.
                if self.turn != TurnState::CallerSpeaking {
                    self.turn = TurnState::Idle;
                }
                Vec::new()
            }

            ServerEvent::CallerTranscript { transcript } => {
                let text = transcript.trim();
                if text.is_empty() {
                    return Vec::new();
                }
                let mut actions = vec![RelayAction::Record(Turn::caller(text, Utc::now()))];
                if guardrail_triggered(text) {
                    tracing::warn!(call_sid = %self.call_sid, "Guardrail triggered on caller transcript");
                    actions.push(RelayAction::ToAi(ClientEvent::ResponseCancel));
                    actions.push(RelayAction::ToAi(ClientEvent::scripted_response(
                        GUARDRAIL_RESPONSE,
                    )));
                }
                actions
            }

            ServerEvent::AiTranscript { transcript } => {
                let text = transcript.trim();
                if text.is_empty() {
                    return Vec::new();
                }
                vec![RelayAction::Record(Turn::ai(text, Utc::now()))]
            }

            ServerEvent::ToolCall {
                call_id,
                name,
                arguments,
            } => {
                let arguments: Value =
                    serde_json::from_str(&arguments).unwrap_or(Value::Object(Default::default()));
                tracing::info!(call_sid = %self.call_sid, tool = %name, "Tool call requested");
                vec![RelayAction::ExecuteTool {
                    call_id,
                    name,
                    arguments,
                }]
            }

            ServerEvent::Error { error } => {
                tracing::error!(call_sid = %self.call_sid, %error, "AI session error event");
                Vec::new()
            }

            ServerEvent::Other => Vec::new(),
        }
    }

    /// Handle the result of a completed tool execution. The result string
    /// is recorded exactly as handed to the AI so later replay sees the
    /// same value the live response was conditioned on.
    pub fn on_tool_result(
        &mut self,
        call_id: &str,
        name: &str,
        arguments: Value,
        result: &str,
    ) -> Vec<RelayAction> {
        vec![
            RelayAction::Record(Turn::tool(
                ToolCall {
                    name: name.to_string(),
                    arguments,
                },
                result,
                Utc::now(),
            )),
            RelayAction::ToAi(ClientEvent::tool_output(call_id, result)),
            RelayAction::ToAi(ClientEvent::response_create()),
        ]
    }

    /// Mark the session over from the relay side (AI leg dropped, or the
    /// loop is shutting down).
    pub fn terminate(&mut self) {
        if self.phase != RelayPhase::Terminating {
            self.phase = RelayPhase::Terminating;
            self.ended_at = Some(Utc::now());
        }
    }

    /// Termination when the AI leg is lost mid-call. Flushes the
    /// carrier's playback buffer and plays a pre-encoded mu-law
    /// farewell tone so the caller hears the call end rather than
    /// dead air followed by a hangup.
    pub fn terminate_with_farewell(&mut self) -> Vec<RelayAction> {
        if self.phase == RelayPhase::Terminating {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if let Some(stream_sid) = self.stream_sid.clone() {
            actions.push(RelayAction::ToCarrier(CarrierMessage::clear(
                stream_sid.clone(),
            )));
            actions.push(RelayAction::ToCarrier(CarrierMessage::media(
                stream_sid,
                FAREWELL_CLIP_ULAW,
            )));
        }
        self.terminate();
        actions
    }
}

/// 8 kHz mu-law farewell clip, base64-encoded for the carrier's
/// outbound media event.
pub const FAREWELL_CLIP_ULAW: &str = include_str!("farewell_ulaw.b64");
