use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::{CheckResult, TargetStatus};

/// Interval assigned when the caller does not pass one
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 5;

/// Target model - a monitored endpoint owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: Uuid,
    pub owner: String,
    /// Immutable after creation
    pub address: String,
    pub display_name: Option<String>,
    /// Informational, the scheduler sweeps every target on one cadence
    pub check_interval_minutes: u32,
    pub current_status: TargetStatus,
    pub current_response_time_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// Create a never-probed target
    pub fn new(
        owner: impl Into<String>,
        address: impl Into<String>,
        display_name: Option<String>,
        check_interval_minutes: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            address: address.into(),
            display_name,
            check_interval_minutes,
            current_status: TargetStatus::Unknown,
            current_response_time_ms: None,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a freshly appended result into the status snapshot
    pub fn record(&mut self, result: &CheckResult) {
        self.current_status = result.status.into();
        self.current_response_time_ms = result.response_time_ms;
        self.last_checked_at = Some(result.timestamp);
    }

    /// Apply a user edit, the address is never touched
    pub fn apply_update(&mut self, update: &TargetUpdate) {
        if let Some(name) = &update.display_name {
            self.display_name = Some(name.clone());
        }
        if let Some(interval) = update.check_interval_minutes {
            self.check_interval_minutes = interval;
        }
        self.updated_at = Utc::now();
    }

    /// Convert a timestamp to Unix milliseconds
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    /// Convert Unix milliseconds back to a timestamp
    pub fn i64_to_timestamp(millis: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
    }
}

/// Registration input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTarget {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub check_interval_minutes: Option<u32>,
}

impl NewTarget {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Self::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_interval(mut self, minutes: u32) -> Self {
        self.check_interval_minutes = Some(minutes);
        self
    }
}

/// Editable fields of a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub check_interval_minutes: Option<u32>,
}

impl TargetUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.check_interval_minutes.is_none()
    }
}
