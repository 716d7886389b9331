use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest HTTP status code classified as `up`.
pub const UP_STATUS_MIN: u16 = 200;
/// First HTTP status code past the `up` range.
pub const UP_STATUS_END: u16 = 400;

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

impl CheckStatus {
    /// Classify a received HTTP status code, `[200, 400)` is up
    pub fn from_status_code(code: u16) -> Self {
        if (UP_STATUS_MIN..UP_STATUS_END).contains(&code) {
            CheckStatus::Up
        } else {
            CheckStatus::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(CheckStatus::Up),
            "down" => Some(CheckStatus::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot status of a monitored target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Unknown => "unknown",
            TargetStatus::Up => "up",
            TargetStatus::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unknown" => Some(TargetStatus::Unknown),
            "up" => Some(TargetStatus::Up),
            "down" => Some(TargetStatus::Down),
            _ => None,
        }
    }
}

impl From<CheckStatus> for TargetStatus {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Up => TargetStatus::Up,
            CheckStatus::Down => TargetStatus::Down,
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a probe to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// Fixed-cadence sweep
    Scheduled,
    /// Synchronous first check while a target is being registered
    Registration,
    /// Explicit on-demand test
    Manual,
}

impl CheckTrigger {
    pub fn is_manual(&self) -> bool {
        matches!(self, CheckTrigger::Manual)
    }
}

/// Immutable result of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// When the probe was executed
    pub timestamp: DateTime<Utc>,

    pub status: CheckStatus,

    /// Wall-clock latency, present whenever a response was received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    /// HTTP status code of a completed exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Diagnostic for a probe that could not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// True when triggered by an on-demand test
    #[serde(default)]
    pub manual: bool,
}

impl CheckResult {
    /// Result for a probe that received an HTTP response
    pub fn responded(trigger: CheckTrigger, status_code: u16, response_time_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            status: CheckStatus::from_status_code(status_code),
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            error_message: None,
            manual: trigger.is_manual(),
        }
    }

    /// Result for a probe that failed before a response arrived
    pub fn failure(trigger: CheckTrigger, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Connection failed".to_string();
        }

        Self {
            timestamp: Utc::now(),
            status: CheckStatus::Down,
            response_time_ms: None,
            status_code: None,
            error_message: Some(error),
            manual: trigger.is_manual(),
        }
    }

    /// Override the execution timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == CheckStatus::Up
    }

    /// Whether the probe completed an HTTP exchange
    pub fn received_response(&self) -> bool {
        self.error_message.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_boundaries() {
        assert_eq!(CheckStatus::from_status_code(199), CheckStatus::Down);
        assert_eq!(CheckStatus::from_status_code(200), CheckStatus::Up);
        assert_eq!(CheckStatus::from_status_code(301), CheckStatus::Up);
        assert_eq!(CheckStatus::from_status_code(399), CheckStatus::Up);
        assert_eq!(CheckStatus::from_status_code(400), CheckStatus::Down);
        assert_eq!(CheckStatus::from_status_code(503), CheckStatus::Down);
    }

    #[test]
    fn test_responded_with_error_status_keeps_code_and_latency() {
        let result = CheckResult::responded(CheckTrigger::Scheduled, 500, 42);
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.status_code, Some(500));
        assert_eq!(result.response_time_ms, Some(42));
        assert!(result.error_message.is_none());
        assert!(!result.manual);
    }

    #[test]
    fn test_failure_never_has_empty_message() {
        let result = CheckResult::failure(CheckTrigger::Manual, "  ");
        assert_eq!(result.status, CheckStatus::Down);
        assert_eq!(result.error_message.as_deref(), Some("Connection failed"));
        assert!(result.status_code.is_none());
        assert!(result.response_time_ms.is_none());
        assert!(result.manual);
    }

    #[test]
    fn test_serialized_shape() {
        let result = CheckResult::responded(CheckTrigger::Manual, 204, 15);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "up");
        assert_eq!(json["responseTimeMs"], 15);
        assert_eq!(json["statusCode"], 204);
        assert_eq!(json["manual"], true);
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    fn test_target_status_from_check_status() {
        assert_eq!(TargetStatus::from(CheckStatus::Up), TargetStatus::Up);
        assert_eq!(TargetStatus::from(CheckStatus::Down), TargetStatus::Down);
        assert_eq!(TargetStatus::default(), TargetStatus::Unknown);
        assert_eq!(TargetStatus::parse("unknown"), Some(TargetStatus::Unknown));
        assert_eq!(CheckStatus::parse("degraded"), None);
    }
}
