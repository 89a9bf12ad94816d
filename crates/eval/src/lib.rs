//! Shadow evaluation pipeline
//!
//! Replays persisted conversation frames through a temperature-zero chat
//! model configured identically to the live session, compares the shadow's
//! decisions against what the live AI actually did, and aggregates against
//! the versioned golden frame benchmark. Runs entirely out-of-band: the
//! relay only publishes call ids to a queue, and nothing here can touch a
//! live call.

pub mod golden;
pub mod replay;
pub mod shadow;
pub mod summary;
pub mod worker;

pub use golden::{run_benchmark, BenchmarkReport};
pub use replay::{
    OpenAiReplayClient, ReplayClient, ReplayDecision, ReplayMessage, Role, ScriptedReplayClient,
};
pub use shadow::ShadowEvaluator;
pub use summary::{summarize, EvalSummary};
pub use worker::{spawn_workers, WorkerPool};

use thiserror::Error;

/// Evaluation errors
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("replay client error: {0}")]
    Replay(String),

    #[error("replay API key is not configured")]
    MissingApiKey,

    #[error(
        "unauthorized write during replay of {call_sid}: shadow wanted to execute '{tool}' \
         with no recorded result to simulate"
    )]
    UnauthorizedWrite { call_sid: String, tool: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] receptionist_store::StoreError),
}
