/// Engine facade - the operations external collaborators call
///
/// Every per-target operation is scoped by owner: a target that belongs to
/// someone else is reported exactly like a target that does not exist.
pub mod views;


pub use views::{HistoryView, ManualTestOutcome, StatsView, TargetSummary};

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{NewTarget, Target, TargetUpdate};
use crate::database::{StoreError, TargetStore};
use crate::monitoring::{CheckTrigger, PageRequest, ProbeExecutor, StatsPeriod, compute_stats};
use crate::validation::{validate_new_target, validate_update};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Target {0} not found")]
    NotFound(Uuid),

    #[error("Already monitoring {0}")]
    AlreadyMonitoring(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A store `NotFound` on a known id means the target vanished mid-call
fn scoped(id: Uuid) -> impl Fn(StoreError) -> EngineError {
    move |e| match e {
        StoreError::NotFound => EngineError::NotFound(id),
        other => EngineError::Store(other),
    }
}

#[derive(Clone)]
pub struct MonitorEngine {
    store: Arc<dyn TargetStore>,
    executor: Arc<ProbeExecutor>,
}

impl MonitorEngine {
    pub fn new(store: Arc<dyn TargetStore>, executor: Arc<ProbeExecutor>) -> Self {
        Self { store, executor }
    }

    pub fn store(&self) -> Arc<dyn TargetStore> {
        self.store.clone()
    }

    pub fn executor(&self) -> Arc<ProbeExecutor> {
        self.executor.clone()
    }

    /// Fetch a target only if `owner` owns it
    async fn owned_target(&self, owner: &str, id: Uuid) -> Result<Target, EngineError> {
        match self.store.get_target(id).await? {
            Some(target) if target.owner == owner => Ok(target),
            _ => Err(EngineError::NotFound(id)),
        }
    }

    /// Register a target and run its initial check
    ///
    /// Duplicates are rejected before any probe goes out. The first result is
    /// folded into the target and stored with it in one step, so a registered
    /// target is never observed without history.
    pub async fn register(&self, owner: &str, input: NewTarget) -> Result<Target, EngineError> {
        let valid =
            validate_new_target(&input).map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        if self.store.find_by_address(owner, &valid.address).await?.is_some() {
            return Err(EngineError::AlreadyMonitoring(valid.address));
        }

        let result = self.executor.probe(&valid.address, CheckTrigger::Registration).await;

        let mut target =
            Target::new(owner, valid.address, valid.display_name, valid.check_interval_minutes);
        target.record(&result);

        match self.store.insert_target(&target, &result).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration of the same address
            Err(StoreError::Conflict) => return Err(EngineError::AlreadyMonitoring(target.address)),
            Err(e) => return Err(e.into()),
        }

        info!(
            target_id = %target.id,
            address = %target.address,
            status = %target.current_status,
            "Registered target"
        );
        Ok(target)
    }

    pub async fn list_targets(&self, owner: &str) -> Result<Vec<Target>, EngineError> {
        Ok(self.store.list_targets(owner).await?)
    }

    pub async fn get_target(&self, owner: &str, id: Uuid) -> Result<Target, EngineError> {
        self.owned_target(owner, id).await
    }

    /// Change the display name and/or interval, nothing else is editable
    pub async fn update_target(
        &self,
        owner: &str,
        id: Uuid,
        update: TargetUpdate,
    ) -> Result<Target, EngineError> {
        let update = validate_update(&update).map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let target = self.owned_target(owner, id).await?;
        if update.is_empty() {
            return Ok(target);
        }

        let updated = self
            .store
            .update_target(id, &update)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        debug!(target_id = %id, "Updated target");
        Ok(updated)
    }

    /// Remove a target together with its whole history
    pub async fn delete_target(&self, owner: &str, id: Uuid) -> Result<(), EngineError> {
        self.owned_target(owner, id).await?;

        if !self.store.delete_target(id).await? {
            return Err(EngineError::NotFound(id));
        }

        info!(target_id = %id, "Deleted target");
        Ok(())
    }

    /// Probe a target right now and record the result as manual
    pub async fn manual_test(&self, owner: &str, id: Uuid) -> Result<ManualTestOutcome, EngineError> {
        let target = self.owned_target(owner, id).await?;

        let result = self.executor.probe(&target.address, CheckTrigger::Manual).await;
        self.store.append_result(id, &result).await.map_err(scoped(id))?;

        debug!(target_id = %id, status = %result.status, "Manual test recorded");
        Ok(ManualTestOutcome::new(&target.address, &result))
    }

    /// One page of a target's history, oldest first
    pub async fn history(
        &self,
        owner: &str,
        id: Uuid,
        request: PageRequest,
    ) -> Result<HistoryView, EngineError> {
        let target = self.owned_target(owner, id).await?;
        let page = self.store.history_page(id, request).await.map_err(scoped(id))?;

        Ok(HistoryView {
            target: TargetSummary::from(&target),
            entries: page.entries,
            total_records: page.total_records,
            page: request.page,
            limit: request.limit,
        })
    }

    /// Uptime statistics over the window ending now
    pub async fn stats(
        &self,
        owner: &str,
        id: Uuid,
        period: StatsPeriod,
    ) -> Result<StatsView, EngineError> {
        let target = self.owned_target(owner, id).await?;
        let history = self.store.history(id).await.map_err(scoped(id))?;

        Ok(StatsView {
            target: TargetSummary::from(&target),
            period,
            stats: compute_stats(&history, period, Utc::now()),
        })
    }
}
