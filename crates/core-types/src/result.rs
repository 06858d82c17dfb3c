//! Uniform result type for executed actions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phase in which an operation failed. Carried in messages so a terminal
/// result always names where things went wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    /// The instruction could not be interpreted.
    Parse,
    /// No strategy found the described target.
    Resolution,
    /// The page script ran but the action semantics failed.
    Action,
    /// Navigation error or a crashed surface.
    Surface,
    Timeout,
    /// Model service unreachable or returned garbage.
    Service,
}

impl FailurePhase {
    pub fn name(&self) -> &'static str {
        match self {
            FailurePhase::Parse => "parse",
            FailurePhase::Resolution => "resolution",
            FailurePhase::Action => "action",
            FailurePhase::Surface => "surface",
            FailurePhase::Timeout => "timeout",
            FailurePhase::Service => "service",
        }
    }
}

/// Outcome of one executed action (or a whole workflow).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    /// Human-readable summary, always present.
    pub message: String,
    /// Structured payload (extracted records, per-field results, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure detail including the failing phase, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(phase: FailurePhase, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error: Some(format!("[{}] {}", phase.name(), message)),
            message,
            data: None,
        }
    }

    pub fn failed_with_data(phase: FailurePhase, message: impl Into<String>, data: Value) -> Self {
        let mut result = Self::failed(phase, message);
        result.data = Some(data);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_names_the_phase() {
        let result = ActionResult::failed(FailurePhase::Resolution, "no search box found");
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("[resolution] no search box found")
        );
        assert_eq!(result.message, "no search box found");
    }
}
