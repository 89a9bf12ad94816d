//! AI realtime session protocol
//!
//! Typed client/server events for the OpenAI Realtime API plus a thin
//! websocket wrapper. Only the events the relay acts on get their own
//! variant; everything else parses into `Other` and is ignored.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use receptionist_config::{RealtimeSettings, TurnDetectionSettings};
use receptionist_core::BusinessConfig;
use receptionist_tools::ToolSpec;

use crate::RelayError;

/// Events the relay sends to the AI session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },

    #[serde(rename = "input_audio_buffer.append")]
    AudioAppend { audio: String },

    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },

    #[serde(rename = "response.cancel")]
    ResponseCancel,

    #[serde(rename = "conversation.item.create")]
    ItemCreate { item: Value },
}

impl ClientEvent {
    /// Plain `response.create`, letting the session continue on its own.
    pub fn response_create() -> Self {
        Self::ResponseCreate { response: None }
    }

    /// `response.create` with explicit spoken instructions.
    pub fn scripted_response(instructions: impl Into<String>) -> Self {
        Self::ResponseCreate {
            response: Some(json!({
                "modalities": ["audio", "text"],
                "instructions": instructions.into(),
            })),
        }
    }

    /// Feed a tool result back into the conversation.
    pub fn tool_output(call_id: &str, output: &str) -> Self {
        Self::ItemCreate {
            item: json!({
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            }),
        }
    }

    /// Initial session configuration: codec, voice, turn detection,
    /// instructions and tool definitions. The audio format must match the
    /// carrier's codec so no transcoding happens in the relay.
    pub fn session_config(
        settings: &RealtimeSettings,
        turn_detection: &TurnDetectionSettings,
        business: &BusinessConfig,
        tools: &[ToolSpec],
    ) -> Self {
        let tool_defs: Vec<Value> = tools.iter().map(ToolSpec::to_realtime_json).collect();
        Self::SessionUpdate {
            session: json!({
                "modalities": ["audio", "text"],
                "instructions": business.system_instructions(),
                "voice": settings.voice,
                "input_audio_format": settings.audio_format,
                "output_audio_format": settings.audio_format,
                "input_audio_transcription": {"model": "whisper-1"},
                "turn_detection": {
                    "type": "server_vad",
                    "threshold": turn_detection.threshold,
                    "prefix_padding_ms": turn_detection.prefix_padding_ms,
                    "silence_duration_ms": turn_detection.silence_duration_ms,
                },
                "temperature": settings.temperature,
                "tools": tool_defs,
                "tool_choice": "auto",
            }),
        }
    }
}

/// Events the AI session sends back
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Incremental audio output, base64 in the session's codec
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        delta: Option<String>,
    },

    #[serde(rename = "response.audio.done")]
    AudioDone,

    /// Server-side VAD: the caller started speaking
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// Transcript of what the caller just said
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    CallerTranscript {
        #[serde(default)]
        transcript: String,
    },

    /// Transcript of what the AI just said
    #[serde(rename = "response.audio_transcript.done")]
    AiTranscript {
        #[serde(default)]
        transcript: String,
    },

    /// Completed tool-call request, arguments as a JSON string
    #[serde(rename = "response.function_call_arguments.done")]
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },

    #[serde(rename = "response.cancelled")]
    ResponseCancelled,

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Value,
    },

    #[serde(other)]
    Other,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Open websocket to the AI realtime service
pub struct AiSession {
    ws: WsStream,
}

impl AiSession {
    /// Connect and authenticate. Does not send any session configuration.
    pub async fn connect(settings: &RealtimeSettings) -> Result<Self, RelayError> {
        let api_key = settings.api_key.as_deref().ok_or(RelayError::MissingApiKey)?;

        let url = format!("{}?model={}", settings.endpoint, settings.model);
        let mut request = url
            .into_client_request()
            .map_err(RelayError::AiSession)?;
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| RelayError::MissingApiKey)?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws, _) = connect_async(request).await?;
        tracing::info!(model = %settings.model, "Connected to AI realtime service");
        Ok(Self { ws })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), RelayError> {
        let text = serde_json::to_string(event)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Next server event. `None` when the session is closed. Non-text
    /// frames and unparseable payloads are skipped with a log line.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        tracing::warn!(error = %e, "Unparseable AI event, skipping");
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "AI session read error");
                    return None;
                }
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_append_shape() {
        let json = serde_json::to_value(ClientEvent::AudioAppend {
            audio: "AAAA".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "AAAA");
    }

    #[test]
    fn test_plain_response_create_has_no_body() {
        let json = serde_json::to_value(ClientEvent::response_create()).unwrap();
        assert_eq!(json["type"], "response.create");
        assert!(json.get("response").is_none());
    }

    #[test]
    fn test_tool_output_shape() {
        let json = serde_json::to_value(ClientEvent::tool_output("call_1", "Available")).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_1");
        assert_eq!(json["item"]["output"], "Available");
    }

    #[test]
    fn test_parse_audio_delta() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"response.audio.delta","delta":"AAAA"}"#).unwrap();
        assert!(matches!(event, ServerEvent::AudioDelta { delta: Some(d) } if d == "AAAA"));
    }

    #[test]
    fn test_parse_tool_call() {
        let raw = r#"{
            "type": "response.function_call_arguments.done",
            "call_id": "call_1",
            "name": "check_availability",
            "arguments": "{\"start_iso\":\"2025-06-02T14:00:00\"}"
        }"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        match event {
            ServerEvent::ToolCall { call_id, name, arguments } => {
                assert_eq!(call_id, "call_1");
                assert_eq!(name, "check_availability");
                assert!(arguments.contains("start_iso"));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_server_event_is_other() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }
}
