//! Response shapes returned by the engine facade.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::Target;
use crate::monitoring::{CheckResult, CheckStatus, StatsPeriod, TargetStatus, UptimeStats};

/// The identifying part of a target, embedded in history and stats views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: Uuid,
    pub address: String,
    pub display_name: Option<String>,
    pub current_status: TargetStatus,
}

impl From<&Target> for TargetSummary {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id,
            address: target.address.clone(),
            display_name: target.display_name.clone(),
            current_status: target.current_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub target: TargetSummary,
    pub entries: Vec<CheckResult>,
    pub total_records: usize,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub target: TargetSummary,
    pub period: StatsPeriod,
    #[serde(flatten)]
    pub stats: UptimeStats,
}

/// Result of an on-demand test
///
/// `success` is false only when no HTTP response was received; a 500 is a
/// successful test of a target that is down.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTestOutcome {
    pub success: bool,
    pub status: CheckStatus,
    pub response_time_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub address: String,
    pub timestamp: DateTime<Utc>,
}

impl ManualTestOutcome {
    pub fn new(address: &str, result: &CheckResult) -> Self {
        Self {
            success: result.received_response(),
            status: result.status,
            response_time_ms: result.response_time_ms,
            status_code: result.status_code,
            error: result.error_message.clone(),
            address: address.to_string(),
            timestamp: result.timestamp,
        }
    }
}
