//! Persistence layer for the AI receptionist
//!
//! Provides:
//! - The business config store (concurrent snapshot reads, transactional
//!   validated writes)
//! - Call records and conversation frames behind a store trait, with
//!   in-memory and JSON-file backends
//! - The versioned golden frame benchmark loader

pub mod business;
pub mod calls;
pub mod golden;

pub use business::BusinessStore;
pub use calls::{
    CallRecord, CallStatus, FrameStore, JsonFrameStore, MemoryFrameStore, SharedFrameStore,
};
pub use golden::{ExpectedOutcome, GoldenFrame, GoldenSet, load_golden_sets};

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid business config: {0}")]
    InvalidConfig(#[from] receptionist_core::BusinessConfigError),

    #[error("Golden set {version} is not additive: {message}")]
    GoldenNotAdditive { version: u32, message: String },
}
