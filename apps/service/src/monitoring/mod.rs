/// Monitoring engine module - probes targets and summarises their history
///
/// This module is responsible for:
/// - Executing a single HTTP reachability probe
/// - Keeping the bounded per-target history ledger
/// - Computing uptime statistics over trailing windows
/// - Sweeping every target on a fixed cadence
pub mod checker;
pub mod executor;
pub mod ledger;
pub mod scheduler;
pub mod stats;
pub mod types;

pub use executor::ProbeExecutor;
pub use ledger::{HistoryLedger, HistoryPage, PageRequest};
pub use scheduler::{MonitoringScheduler, TickSummary};
pub use stats::{StatsPeriod, UptimeStats, compute_stats};
pub use types::{CheckResult, CheckStatus, CheckTrigger, TargetStatus};
