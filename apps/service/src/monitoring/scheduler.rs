use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::executor::ProbeExecutor;
use super::types::{CheckResult, CheckStatus, CheckTrigger};
use crate::database::TargetStore;
use crate::database::models::Target;

/// Outcome counts of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub targets: usize,
    pub up: usize,
    pub down: usize,
    /// Results that could not be appended (store failure or target deleted mid-sweep)
    pub failed_appends: usize,
}

/// Per-target outcome inside a sweep
enum TargetOutcome {
    Recorded(CheckStatus),
    AppendFailed,
}

/// Monitoring scheduler - sweeps every target on one fixed cadence
///
/// Per-target `check_interval_minutes` does not influence the cadence. Ticks
/// are serialized: a sweep always finishes before the next one starts.
pub struct MonitoringScheduler {
    store: Arc<dyn TargetStore>,
    executor: Arc<ProbeExecutor>,
    tick: Duration,
    max_concurrent: usize,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        store: Arc<dyn TargetStore>,
        executor: Arc<ProbeExecutor>,
        tick: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self { store, executor, tick, max_concurrent: max_concurrent.max(1) }
    }

    /// Probe every target once and append the results
    pub async fn run_tick(&self) -> TickSummary {
        let targets = match self.store.list_all_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                error!("Failed to list targets for sweep: {}", e);
                return TickSummary::default();
            }
        };

        let mut summary = TickSummary { targets: targets.len(), ..TickSummary::default() };
        debug!(targets = summary.targets, "Starting sweep");

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut sweep = JoinSet::new();

        for target in targets {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let store = self.store.clone();
            let executor = self.executor.clone();

            sweep.spawn(async move {
                let outcome = check_target(store, executor, target).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = sweep.join_next().await {
            match joined {
                Ok(TargetOutcome::Recorded(CheckStatus::Up)) => summary.up += 1,
                Ok(TargetOutcome::Recorded(CheckStatus::Down)) => summary.down += 1,
                Ok(TargetOutcome::AppendFailed) => summary.failed_appends += 1,
                Err(e) => {
                    error!("Sweep task failed: {}", e);
                    summary.failed_appends += 1;
                }
            }
        }

        info!(
            targets = summary.targets,
            up = summary.up,
            down = summary.down,
            failed_appends = summary.failed_appends,
            "Sweep completed"
        );
        summary
    }

    /// Spawn the scheduling loop
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run_until(std::future::pending::<()>()).await })
    }

    /// Run sweeps until `shutdown` resolves, the current sweep always completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut timer = interval(self.tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(tick_seconds = self.tick.as_secs(), "Scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    self.run_tick().await;
                }
            }
        }
        info!("Scheduler stopped");
    }
}

/// Probe one target and append the result
///
/// The probe runs in its own task so a panic is recorded as a failed check
/// for this target only.
async fn check_target(
    store: Arc<dyn TargetStore>,
    executor: Arc<ProbeExecutor>,
    target: Target,
) -> TargetOutcome {
    let address = target.address.clone();

    let result = match tokio::spawn(async move {
        executor.probe(&address, CheckTrigger::Scheduled).await
    })
    .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(target_id = %target.id, address = %target.address, "Probe task failed: {}", e);
            CheckResult::failure(CheckTrigger::Scheduled, format!("internal probe error: {e}"))
        }
    };

    let status = result.status;
    match store.append_result(target.id, &result).await {
        Ok(_) => {
            debug!(target_id = %target.id, address = %target.address, status = %status, "Recorded check");
            TargetOutcome::Recorded(status)
        }
        Err(e) => {
            warn!(target_id = %target.id, "Failed to append check result: {}", e);
            TargetOutcome::AppendFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::monitoring::checker::{Checker, ProbeError, ProbeResponse};
    use crate::monitoring::types::TargetStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Up for addresses containing "up", refused for "down", panics for "panic"
    struct ScriptedChecker {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedChecker {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait::async_trait]
    impl Checker for ScriptedChecker {
        async fn check(&self, target: &str) -> Result<ProbeResponse, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if target.contains("panic") {
                panic!("checker blew up");
            }
            if target.contains("down") {
                return Err(ProbeError::Connect("Connection refused".into()));
            }
            Ok(ProbeResponse { status_code: 200, latency_ms: 5 })
        }
    }

    async fn seed(store: &MemoryStore, address: &str) -> Target {
        let target = Target::new("alice", address, None, 5);
        let initial = CheckResult::responded(CheckTrigger::Registration, 200, 1);
        store.insert_target(&target, &initial).await.unwrap();
        target
    }

    fn scheduler(store: Arc<MemoryStore>, checker: Arc<ScriptedChecker>, max: usize) -> MonitoringScheduler {
        let executor = Arc::new(ProbeExecutor::with_checker(checker));
        MonitoringScheduler::new(store, executor, Duration::from_secs(300), max)
    }

    #[tokio::test]
    async fn test_tick_probes_every_target() {
        let store = Arc::new(MemoryStore::new(100));
        let up = seed(&store, "http://up.example").await;
        let down = seed(&store, "http://down.example").await;
        let checker = Arc::new(ScriptedChecker::new(Duration::ZERO));

        let summary = scheduler(store.clone(), checker.clone(), 4).run_tick().await;
        assert_eq!(summary, TickSummary { targets: 2, up: 1, down: 1, failed_appends: 0 });
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);

        let up = store.get_target(up.id).await.unwrap().unwrap();
        assert_eq!(up.current_status, TargetStatus::Up);
        let down = store.get_target(down.id).await.unwrap().unwrap();
        assert_eq!(down.current_status, TargetStatus::Down);

        let history = store.history(down.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[1].manual);
        assert!(history[1].error_message.is_some());
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let store = Arc::new(MemoryStore::new(100));
        let bad = seed(&store, "http://panic.example").await;
        let good = seed(&store, "http://up.example").await;
        let checker = Arc::new(ScriptedChecker::new(Duration::ZERO));

        let summary = scheduler(store.clone(), checker, 4).run_tick().await;
        assert_eq!(summary.targets, 2);
        assert_eq!(summary.up, 1);
        assert_eq!(summary.down, 1);

        let bad_history = store.history(bad.id).await.unwrap();
        let recorded = bad_history.last().unwrap();
        assert_eq!(recorded.status, CheckStatus::Down);
        assert!(recorded.error_message.as_deref().unwrap().starts_with("internal probe error"));

        let good = store.get_target(good.id).await.unwrap().unwrap();
        assert_eq!(good.current_status, TargetStatus::Up);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let store = Arc::new(MemoryStore::new(100));
        for n in 0..10 {
            seed(&store, &format!("http://up{n}.example")).await;
        }
        let checker = Arc::new(ScriptedChecker::new(Duration::from_millis(20)));

        let summary = scheduler(store, checker.clone(), 3).run_tick().await;
        assert_eq!(summary.up, 10);
        assert!(checker.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_store_sweep() {
        let store = Arc::new(MemoryStore::new(100));
        let checker = Arc::new(ScriptedChecker::new(Duration::ZERO));
        let summary = scheduler(store, checker, 1).run_tick().await;
        assert_eq!(summary, TickSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_fires_on_cadence_and_stops() {
        let store = Arc::new(MemoryStore::new(100));
        let target = seed(&store, "http://up.example").await;
        let checker = Arc::new(ScriptedChecker::new(Duration::ZERO));
        let scheduler = scheduler(store.clone(), checker.clone(), 2);

        // Immediate first tick, then one more at 300s, stop before the third
        scheduler.run_until(tokio::time::sleep(Duration::from_secs(450))).await;

        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.history(target.id).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_loop_runs_in_background() {
        let store = Arc::new(MemoryStore::new(100));
        let target = seed(&store, "http://up.example").await;
        let checker = Arc::new(ScriptedChecker::new(Duration::ZERO));

        let handle = Arc::new(scheduler(store.clone(), checker.clone(), 2)).start();
        tokio::time::sleep(Duration::from_secs(350)).await;

        // Sweeps at 0s and 300s
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(store.history(target.id).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sweep_does_not_overlap_next_tick() {
        let store = Arc::new(MemoryStore::new(100));
        seed(&store, "http://up.example").await;
        // Each sweep outlasts the tick, so missed ticks are skipped
        let checker = Arc::new(ScriptedChecker::new(Duration::from_secs(400)));
        let scheduler = scheduler(store, checker.clone(), 2);

        scheduler.run_until(tokio::time::sleep(Duration::from_secs(700))).await;

        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
        assert_eq!(checker.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
