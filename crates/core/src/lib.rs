//! Core types for the AI receptionist
//!
//! This crate provides foundational types used across all other crates:
//! - Business configuration and its write-time invariant
//! - The call admission gate
//! - Conversation frames (turns, tool calls)
//! - Evaluation results and lightweight intent inference

pub mod admission;
pub mod business;
pub mod evaluation;
pub mod frame;
pub mod intent;

pub use admission::{admit, AdmissionDecision, DenyReason};
pub use business::{BusinessConfig, BusinessConfigError};
pub use evaluation::EvaluationResult;
pub use frame::{ConversationFrame, Speaker, ToolCall, Turn};
pub use intent::infer_intent;
