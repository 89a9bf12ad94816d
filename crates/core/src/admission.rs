//! Call Admission Gate
//!
//! Pure decision function that runs before any AI session is created.
//! Checks run in a fixed order and short-circuit on the first failure,
//! so a DENY always reports the first failing check.

use serde::{Deserialize, Serialize};

use crate::business::BusinessConfig;

/// Reason a call was denied admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    GlobalKillSwitch,
    AccountInactive,
    ReceptionistDisabled,
}

impl DenyReason {
    /// Wire representation, matching the reason strings logged by the
    /// entry handler.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::GlobalKillSwitch => "global_kill_switch",
            DenyReason::AccountInactive => "account_inactive",
            DenyReason::ReceptionistDisabled => "receptionist_disabled",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission decision for an inbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow,
    Deny(DenyReason),
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allow)
    }
}

/// Decide whether the AI may engage with an inbound call.
///
/// `kill_switch_global` is the process-wide override, injected explicitly
/// rather than read from ambient state. Check order:
/// kill switch, then account active, then receptionist enabled.
pub fn admit(kill_switch_global: bool, config: &BusinessConfig) -> AdmissionDecision {
    if kill_switch_global {
        return AdmissionDecision::Deny(DenyReason::GlobalKillSwitch);
    }
    if !config.account_active {
        return AdmissionDecision::Deny(DenyReason::AccountInactive);
    }
    if !config.receptionist_enabled {
        return AdmissionDecision::Deny(DenyReason::ReceptionistDisabled);
    }
    AdmissionDecision::Allow
}
