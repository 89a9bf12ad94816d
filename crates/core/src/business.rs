//! Business Configuration
//!
//! Per-account settings consumed by the admission gate and the relay.
//! Mutated only through the settings path; read-only from the call path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a business configuration write violates an invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessConfigError {
    #[error("receptionist_enabled requires a phone number")]
    ReceptionistRequiresPhone,

    #[error("business name must not be empty")]
    EmptyName,
}

/// Per-business configuration snapshot
///
/// The process-wide kill switch is deliberately NOT part of this struct;
/// it is injected into the admission gate separately so tests can exercise
/// both states without touching global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Stable business identifier
    pub id: String,
    /// Display name, used in greetings and prompts
    pub name: String,
    /// Industry label (optional context for the prompt)
    #[serde(default)]
    pub industry: Option<String>,
    /// Free-form description (optional context for the prompt)
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the account is active (billing-wise)
    pub account_active: bool,
    /// Whether the AI receptionist should answer calls
    pub receptionist_enabled: bool,
    /// The carrier phone number assigned to this business
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Names of enabled tools (must exist in the tool registry)
    #[serde(default)]
    pub tool_definitions: Vec<String>,
    /// IANA timezone name, treated as opaque (never converted locally)
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl BusinessConfig {
    /// Validate the write-time invariant.
    ///
    /// Enforced by the store before a write is committed, so no reader
    /// (the admission gate in particular) ever observes
    /// `receptionist_enabled=true` with an empty phone number.
    pub fn validate(&self) -> Result<(), BusinessConfigError> {
        if self.name.trim().is_empty() {
            return Err(BusinessConfigError::EmptyName);
        }
        if self.receptionist_enabled
            && self.phone_number.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(BusinessConfigError::ReceptionistRequiresPhone);
        }
        Ok(())
    }

    /// Assemble the system instructions used for the AI session.
    ///
    /// Centralized here so the live relay and the shadow evaluator build
    /// the exact same prompt from the same snapshot (1:1 parity).
    pub fn system_instructions(&self) -> String {
        let mut out = format!(
            "You are Aria, an AI Receptionist for {}. Be polite, professional, and efficient.\n\
             \n\
             LANGUAGE RULES:\n\
             - Always start speaking in English.\n\
             - Only switch languages if the caller speaks to you in another language first.\n\
             - When uncertain, default to English.\n\
             \n\
             CORE PROTOCOL:\n\
             1. Always CHECK availability using 'check_availability' before mentioning a time is free or attempting to book.\n\
             2. If the time is available, ASK for the caller's full name if not already provided.\n\
             3. If the caller states their name, immediately use 'identify_self' to record it.\n\
             4. Use 'book_appointment' ONLY after availability is confirmed AND you have the caller's name.\n\
             5. If a time is unavailable, suggest the next closest opening.\n\
             \n\
             CONVERSATION STYLE:\n\
             - Keep responses brief (1-3 sentences).\n\
             - Be helpful and proactive in finding alternative times.",
            self.name
        );

        if let Some(industry) = &self.industry {
            out.push_str(&format!("\n\nBUSINESS INDUSTRY: {}", industry));
        }
        if let Some(description) = &self.description {
            out.push_str(&format!("\nBUSINESS DESCRIPTION: {}", description));
        }
        out.push_str(&format!("\nBUSINESS TIMEZONE: {}", self.timezone));
        out
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Our Business".to_string(),
            industry: None,
            description: None,
            account_active: true,
            receptionist_enabled: false,
            phone_number: None,
            tool_definitions: vec![
                "check_availability".to_string(),
                "book_appointment".to_string(),
                "identify_self".to_string(),
            ],
            timezone: default_timezone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BusinessConfig::default().validate().is_ok());
    }

    #[test]
    fn test_enabled_without_phone_rejected() {
        let cfg = BusinessConfig {
            receptionist_enabled: true,
            phone_number: None,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(BusinessConfigError::ReceptionistRequiresPhone)
        );
    }

    #[test]
    fn test_enabled_with_blank_phone_rejected() {
        let cfg = BusinessConfig {
            receptionist_enabled: true,
            phone_number: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_enabled_with_phone_accepted() {
        let cfg = BusinessConfig {
            receptionist_enabled: true,
            phone_number: Some("+12298215986".to_string()),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_instructions_include_business_name() {
        let cfg = BusinessConfig {
            name: "Bayside Dental".to_string(),
            ..Default::default()
        };
        let instructions = cfg.system_instructions();
        assert!(instructions.contains("Bayside Dental"));
        assert!(instructions.contains("check_availability"));
    }
}
