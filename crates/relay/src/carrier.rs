//! Carrier media stream protocol
//!
//! Twilio Media Streams wire format: an ordered sequence of JSON events
//! over the websocket. Inbound we care about `start` (carries the stream
//! handle), `media` (base64 mu-law audio) and `stop`. Outbound we emit
//! `media` and `clear`, both addressed by the stream handle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payload of an inbound `media` event
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMedia {
    /// Base64-encoded G.711 mu-law audio, forwarded untouched
    pub payload: String,
}

/// Payload of the `start` event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    /// Parameters the entry handler attached to the stream directive
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
}

/// Events arriving from the carrier leg
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierEvent {
    /// Handshake banner, sent once before `start`
    Connected,
    Start { start: StreamStart },
    Media { media: InboundMedia },
    Stop,
    /// Event types we don't act on (`mark`, `dtmf`, ...)
    #[serde(other)]
    Other,
}

/// Payload of an outbound `media` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

/// Events we emit to the carrier leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Flush the carrier's playback buffer, used on barge-in
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl CarrierMessage {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        Self::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let raw = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "streamSid": "MZ123",
                "callSid": "CA456",
                "customParameters": {"call_sid": "CA456", "from_number": "+15550001111"}
            },
            "streamSid": "MZ123"
        }"#;

        let event: CarrierEvent = serde_json::from_str(raw).unwrap();
        match event {
            CarrierEvent::Start { start } => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.call_sid.as_deref(), Some("CA456"));
                assert_eq!(
                    start.custom_parameters.get("from_number").map(String::as_str),
                    Some("+15550001111")
                );
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_and_stop() {
        let media: CarrierEvent =
            serde_json::from_str(r#"{"event":"media","media":{"payload":"AAAA"}}"#).unwrap();
        assert!(matches!(media, CarrierEvent::Media { .. }));

        let stop: CarrierEvent =
            serde_json::from_str(r#"{"event":"stop","stop":{"callSid":"CA456"}}"#).unwrap();
        assert!(matches!(stop, CarrierEvent::Stop));
    }

    #[test]
    fn test_unknown_event_is_other() {
        let event: CarrierEvent =
            serde_json::from_str(r#"{"event":"mark","mark":{"name":"x"}}"#).unwrap();
        assert!(matches!(event, CarrierEvent::Other));
    }

    #[test]
    fn test_outbound_media_shape() {
        let msg = CarrierMessage::media("MZ123", "AAAA");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ123");
        assert_eq!(json["media"]["payload"], "AAAA");
    }

    #[test]
    fn test_clear_shape() {
        let json = serde_json::to_value(CarrierMessage::clear("MZ123")).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ123");
    }
}
