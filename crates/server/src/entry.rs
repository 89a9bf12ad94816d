//! Call entry handler
//!
//! First decision point for an inbound call: run the admission gate over
//! the current business config snapshot and answer with a routing
//! directive. Admitted calls are told to open a media stream to us;
//! denied calls hear a short offline message and hang up. Either way the
//! carrier gets well-formed TwiML.

use chrono::{DateTime, Utc};

use receptionist_core::{admit, AdmissionDecision, BusinessConfig, DenyReason};

use crate::twiml;

/// Inbound call notification from the carrier
#[derive(Debug, Clone)]
pub struct InboundCall {
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub received_at: DateTime<Utc>,
}

/// What the carrier is told to do with the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDirective {
    /// Open a bidirectional media stream to `url`, carrying `parameters`
    /// back in the stream-start event
    ConnectStream {
        url: String,
        parameters: Vec<(String, String)>,
    },
    /// Speak `message` and terminate
    SayAndHangup { message: String },
}

impl RoutingDirective {
    pub fn to_twiml(&self) -> String {
        match self {
            Self::ConnectStream { url, parameters } => {
                let params: Vec<(&str, &str)> = parameters
                    .iter()
                    .map(|(n, v)| (n.as_str(), v.as_str()))
                    .collect();
                twiml::connect_stream(url, &params)
            }
            Self::SayAndHangup { message } => twiml::say_and_hangup(message),
        }
    }
}

fn denial_message(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::GlobalKillSwitch | DenyReason::AccountInactive => {
            "Thank you for calling. We are currently unavailable. Please try again later."
        }
        DenyReason::ReceptionistDisabled => {
            "Thank you for calling. Our phone assistant is currently turned off. \
             Please reach out during business hours."
        }
    }
}

/// Route one inbound call through the admission gate.
pub fn route_call(
    call: &InboundCall,
    kill_switch_global: bool,
    business: &BusinessConfig,
    stream_url: &str,
) -> RoutingDirective {
    match admit(kill_switch_global, business) {
        AdmissionDecision::Allow => {
            tracing::info!(
                call_sid = %call.call_sid,
                business_id = %business.id,
                "Call admitted"
            );
            RoutingDirective::ConnectStream {
                url: stream_url.to_string(),
                parameters: vec![
                    ("call_sid".to_string(), call.call_sid.clone()),
                    ("from_number".to_string(), call.from_number.clone()),
                    ("to_number".to_string(), call.to_number.clone()),
                    (
                        "start_timestamp".to_string(),
                        call.received_at.to_rfc3339(),
                    ),
                ],
            }
        }
        AdmissionDecision::Deny(reason) => {
            tracing::warn!(
                call_sid = %call.call_sid,
                reason = reason.as_str(),
                "Call denied"
            );
            RoutingDirective::SayAndHangup {
                message: denial_message(reason).to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> InboundCall {
        InboundCall {
            call_sid: "CA1".to_string(),
            from_number: "+15550001111".to_string(),
            to_number: "+15550002222".to_string(),
            received_at: Utc::now(),
        }
    }

    fn enabled_business() -> BusinessConfig {
        BusinessConfig {
            receptionist_enabled: true,
            phone_number: Some("+15550002222".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_admitted_call_gets_stream_directive() {
        let directive = route_call(
            &call(),
            false,
            &enabled_business(),
            "wss://calls.example.com/twilio/stream",
        );

        match &directive {
            RoutingDirective::ConnectStream { url, parameters } => {
                assert_eq!(url, "wss://calls.example.com/twilio/stream");
                assert!(parameters
                    .iter()
                    .any(|(n, v)| n == "call_sid" && v == "CA1"));
                assert!(parameters.iter().any(|(n, _)| n == "start_timestamp"));
            }
            other => panic!("expected stream directive, got {other:?}"),
        }
        assert!(directive.to_twiml().contains("<Connect>"));
    }

    #[test]
    fn test_kill_switch_denies_even_enabled_business() {
        let directive = route_call(&call(), true, &enabled_business(), "wss://x/stream");
        assert!(matches!(directive, RoutingDirective::SayAndHangup { .. }));
        assert!(directive.to_twiml().contains("<Hangup/>"));
    }

    #[test]
    fn test_disabled_receptionist_gets_specific_message() {
        let business = BusinessConfig::default();
        let directive = route_call(&call(), false, &business, "wss://x/stream");
        match directive {
            RoutingDirective::SayAndHangup { message } => {
                assert!(message.contains("phone assistant"));
            }
            other => panic!("expected hangup, got {other:?}"),
        }
    }
}
