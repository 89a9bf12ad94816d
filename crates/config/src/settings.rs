//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP / WebSocket server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// AI realtime session configuration
    #[serde(default)]
    pub realtime: RealtimeSettings,

    /// Turn-detection tuning (latency vs premature interruption)
    #[serde(default)]
    pub turn_detection: TurnDetectionSettings,

    /// Admission overrides
    #[serde(default)]
    pub admission: AdmissionSettings,

    /// Persistence paths
    #[serde(default)]
    pub storage: StorageSettings,

    /// Shadow evaluation configuration
    #[serde(default)]
    pub evaluation: EvaluationSettings,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// Load settings from an optional TOML file plus environment overrides.
    ///
    /// Environment variables use the `RECEPTIONIST_` prefix with `__` as
    /// the section separator, e.g. `RECEPTIONIST_SERVER__PORT=8080`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("RECEPTIONIST").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.turn_detection.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "turn_detection.threshold".to_string(),
                message: "must be within 0.0..=1.0".to_string(),
            });
        }
        if self.turn_detection.silence_duration_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "turn_detection.silence_duration_ms".to_string(),
                message: "below 100ms the AI interrupts mid-sentence".to_string(),
            });
        }
        if self.evaluation.benchmark_every_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.benchmark_every_calls".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.server.public_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.public_host".to_string(),
                message: "required to build the carrier stream URL".to_string(),
            });
        }
        Ok(())
    }

    /// WebSocket URL the carrier is told to stream media to.
    pub fn stream_url(&self) -> String {
        format!("wss://{}/twilio/stream", self.server.public_host)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public hostname the carrier reaches us at (behind the proxy)
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// Maximum concurrent calls
    #[serde(default = "default_max_calls")]
    pub max_concurrent_calls: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_host: default_public_host(),
            max_concurrent_calls: default_max_calls(),
        }
    }
}

/// AI realtime session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// WebSocket endpoint of the realtime AI service
    #[serde(default = "default_realtime_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_realtime_model")]
    pub model: String,

    /// Voice identity
    #[serde(default = "default_voice")]
    pub voice: String,

    /// API key; typically injected via RECEPTIONIST_REALTIME__API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Audio codec on both legs. Must match the carrier codec so no
    /// transcoding happens in the relay.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Opening turn template; `{business}` is replaced with the name
    #[serde(default = "default_greeting")]
    pub greeting_template: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            endpoint: default_realtime_endpoint(),
            model: default_realtime_model(),
            voice: default_voice(),
            api_key: None,
            audio_format: default_audio_format(),
            temperature: default_temperature(),
            greeting_template: default_greeting(),
        }
    }
}

/// Turn-detection parameters forwarded to the AI session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetectionSettings {
    /// Voice-activity threshold, 0.0..=1.0
    #[serde(default = "default_vad_threshold")]
    pub threshold: f32,

    /// Audio kept before detected speech onset
    #[serde(default = "default_prefix_padding_ms")]
    pub prefix_padding_ms: u32,

    /// Trailing silence before the caller's turn is considered over
    #[serde(default = "default_silence_duration_ms")]
    pub silence_duration_ms: u32,
}

impl Default for TurnDetectionSettings {
    fn default() -> Self {
        Self {
            threshold: default_vad_threshold(),
            prefix_padding_ms: default_prefix_padding_ms(),
            silence_duration_ms: default_silence_duration_ms(),
        }
    }
}

/// Admission overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionSettings {
    /// Process-wide kill switch; denies every call when set
    #[serde(default)]
    pub kill_switch_global: bool,
}

/// Persistence paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory for call records, frames and evaluation results
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory holding versioned golden frame sets
    #[serde(default = "default_golden_dir")]
    pub golden_frames_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            golden_frames_dir: default_golden_dir(),
        }
    }
}

/// Shadow evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Master switch for the background evaluator
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chat model used by the replay client
    #[serde(default = "default_replay_model")]
    pub replay_model: String,

    /// Background worker count
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Run the golden benchmark after this many completed evaluations
    #[serde(default = "default_benchmark_cadence")]
    pub benchmark_every_calls: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            replay_model: default_replay_model(),
            workers: default_workers(),
            benchmark_every_calls: default_benchmark_cadence(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_host() -> String {
    "localhost:8080".to_string()
}

fn default_max_calls() -> usize {
    50
}

fn default_realtime_endpoint() -> String {
    "wss://api.openai.com/v1/realtime".to_string()
}

fn default_realtime_model() -> String {
    "gpt-4o-realtime-preview".to_string()
}

fn default_voice() -> String {
    "shimmer".to_string()
}

fn default_audio_format() -> String {
    "g711_ulaw".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_greeting() -> String {
    "Hi, thank you for calling {business}. This is Aria, how can I help you?".to_string()
}

fn default_vad_threshold() -> f32 {
    0.5
}

fn default_prefix_padding_ms() -> u32 {
    300
}

fn default_silence_duration_ms() -> u32 {
    800
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_golden_dir() -> String {
    "golden".to_string()
}

fn default_true() -> bool {
    true
}

fn default_replay_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_workers() -> usize {
    2
}

fn default_benchmark_cadence() -> u64 {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.realtime.audio_format, "g711_ulaw");
        assert_eq!(settings.turn_detection.silence_duration_ms, 800);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut settings = Settings::default();
        settings.turn_detection.threshold = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_too_short_silence_rejected() {
        let mut settings = Settings::default();
        settings.turn_detection.silence_duration_ms = 50;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_stream_url() {
        let mut settings = Settings::default();
        settings.server.public_host = "calls.example.com".to_string();
        assert_eq!(settings.stream_url(), "wss://calls.example.com/twilio/stream");
    }
}
