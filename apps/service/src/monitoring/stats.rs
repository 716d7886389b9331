//! Uptime and latency statistics over a trailing window of history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::CheckResult;

/// Trailing window a statistics request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatsPeriod {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl StatsPeriod {
    /// Parse a period name, anything unrecognized means `24h`
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim() {
            "7d" => StatsPeriod::Week,
            "30d" => StatsPeriod::Month,
            _ => StatsPeriod::Day,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Day => "24h",
            StatsPeriod::Week => "7d",
            StatsPeriod::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            StatsPeriod::Day => Duration::hours(24),
            StatsPeriod::Week => Duration::days(7),
            StatsPeriod::Month => Duration::days(30),
        }
    }

    /// Start of the window ending at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl std::fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated availability for one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeStats {
    pub uptime_percent: f64,
    pub avg_response_time_ms: f64,
    pub total_checks: usize,
    pub up_checks: usize,
    pub down_checks: usize,
}

/// Round to two decimals for display
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute statistics for the entries of `history` inside the window
///
/// Failed probes have no latency and contribute zero to the latency sum while
/// still counting towards the number of checks.
pub fn compute_stats<'a, I>(history: I, period: StatsPeriod, now: DateTime<Utc>) -> UptimeStats
where
    I: IntoIterator<Item = &'a CheckResult>,
{
    let start = period.window_start(now);

    let mut total_checks = 0usize;
    let mut up_checks = 0usize;
    let mut latency_sum = 0f64;

    for result in history.into_iter().filter(|r| r.timestamp >= start) {
        total_checks += 1;
        if result.is_up() {
            up_checks += 1;
        }
        latency_sum += result.response_time_ms.unwrap_or(0) as f64;
    }

    let (uptime_percent, avg_response_time_ms) = if total_checks == 0 {
        (0.0, 0.0)
    } else {
        let total = total_checks as f64;
        (up_checks as f64 / total * 100.0, latency_sum / total)
    };

    UptimeStats {
        uptime_percent: round2(uptime_percent),
        avg_response_time_ms: round2(avg_response_time_ms),
        total_checks,
        up_checks,
        down_checks: total_checks - up_checks,
    }
}
