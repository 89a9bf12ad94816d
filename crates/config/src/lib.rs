//! Configuration for the AI receptionist
//!
//! Layered settings: defaults, optional TOML file, then environment
//! overrides with the `RECEPTIONIST_` prefix.

mod settings;

pub use settings::{
    AdmissionSettings, EvaluationSettings, ObservabilitySettings, RealtimeSettings,
    ServerSettings, Settings, StorageSettings, TurnDetectionSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
