//! Realtime relay between the telephony carrier and the AI service
//!
//! One task per admitted call runs the relay loop, which forwards encoded
//! audio both ways and drives the turn-taking state machine. The state
//! machine itself is pure (events in, actions out), so the sequencing
//! invariants are unit-testable without a socket in sight:
//!
//! - no egress audio before the carrier's stream handle exists
//! - exactly one greeting per call, even on duplicate stream-start
//! - barge-in cancels the AI turn and suppresses its stale audio

pub mod carrier;
pub mod realtime;
pub mod recorder;
pub mod relay;
pub mod session;

pub use carrier::{CarrierEvent, CarrierMessage};
pub use realtime::{AiSession, ClientEvent, ServerEvent};
pub use recorder::{spawn_recorder, FinalizeOutcome, RecorderHandle};
pub use relay::{run_call, RelayContext};
pub use session::{CallSession, RelayAction, RelayPhase, TurnState};

use thiserror::Error;

/// Relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("AI service API key is not configured")]
    MissingApiKey,

    #[error("AI session error: {0}")]
    AiSession(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("carrier leg error: {0}")]
    Carrier(#[from] axum::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
}
