use async_trait::async_trait;
use libsql::{Connection, Row, params};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::StoreError;
use super::models::{Target, TargetUpdate};
use crate::monitoring::ledger::{HistoryPage, PageRequest};
use crate::monitoring::types::{CheckResult, CheckStatus, TargetStatus};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Store trait for targets and their history ledgers
///
/// Appends are atomic per target: the result insert, the eviction of entries
/// beyond capacity and the status snapshot update happen together.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert a new target together with its first check result
    ///
    /// Fails with `StoreError::Conflict` when the owner already monitors the address.
    async fn insert_target(&self, target: &Target, initial: &CheckResult) -> Result<(), StoreError>;

    /// Look up a target by owner and address
    async fn find_by_address(&self, owner: &str, address: &str)
    -> Result<Option<Target>, StoreError>;

    /// Get a target by id
    async fn get_target(&self, id: Uuid) -> Result<Option<Target>, StoreError>;

    /// All targets of one owner, oldest first
    async fn list_targets(&self, owner: &str) -> Result<Vec<Target>, StoreError>;

    /// Every target of every owner, oldest first
    async fn list_all_targets(&self) -> Result<Vec<Target>, StoreError>;

    /// Apply a user edit, `None` when the target does not exist
    async fn update_target(
        &self,
        id: Uuid,
        update: &TargetUpdate,
    ) -> Result<Option<Target>, StoreError>;

    /// Delete a target and its whole ledger, `false` when it did not exist
    async fn delete_target(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Append a result and return the updated target snapshot
    async fn append_result(&self, id: Uuid, result: &CheckResult) -> Result<Target, StoreError>;

    /// One page of the ledger in append order
    async fn history_page(&self, id: Uuid, request: PageRequest)
    -> Result<HistoryPage, StoreError>;

    /// The whole ledger in append order
    async fn history(&self, id: Uuid) -> Result<Vec<CheckResult>, StoreError>;

    /// Maximum ledger length per target
    fn history_capacity(&self) -> usize;
}

const TARGET_COLUMNS: &str = "uuid, owner, address, display_name, check_interval_minutes, \
     current_status, current_response_time_ms, last_checked_at, created_at, updated_at";

const RESULT_COLUMNS: &str =
    "timestamp, status, response_time_ms, status_code, error_message, manual";

fn parse_timestamp(millis: i64) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    Target::i64_to_timestamp(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {millis}")))
}

fn target_from_row(row: &Row) -> Result<Target, StoreError> {
    let uuid_str: String = row.get(0)?;
    let status_str: String = row.get(5)?;
    let interval: i64 = row.get(4)?;

    Ok(Target {
        id: Uuid::parse_str(&uuid_str).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        owner: row.get(1)?,
        address: row.get(2)?,
        display_name: row.get(3)?,
        check_interval_minutes: u32::try_from(interval)
            .map_err(|_| StoreError::Corrupt(format!("invalid interval: {interval}")))?,
        current_status: TargetStatus::parse(&status_str)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid status: {status_str}")))?,
        current_response_time_ms: row.get::<Option<i64>>(6)?.map(|v| v as u64),
        last_checked_at: row.get::<Option<i64>>(7)?.map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(row.get(8)?)?,
        updated_at: parse_timestamp(row.get(9)?)?,
    })
}

fn result_from_row(row: &Row) -> Result<CheckResult, StoreError> {
    let status_str: String = row.get(1)?;

    Ok(CheckResult {
        timestamp: parse_timestamp(row.get(0)?)?,
        status: CheckStatus::parse(&status_str)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid status: {status_str}")))?,
        response_time_ms: row.get::<Option<i64>>(2)?.map(|v| v as u64),
        status_code: row.get::<Option<i64>>(3)?.map(|v| v as u16),
        error_message: row.get(4)?,
        manual: row.get::<i64>(5)? != 0,
    })
}

/// SQLite reports duplicate keys through the error text only
fn map_unique_violation(error: libsql::Error) -> StoreError {
    if error.to_string().contains("UNIQUE constraint failed") {
        StoreError::Conflict
    } else {
        StoreError::Query(error)
    }
}

async fn select_target(conn: &Connection, id: Uuid) -> Result<Option<Target>, StoreError> {
    let sql = format!("SELECT {TARGET_COLUMNS} FROM targets WHERE uuid = ?");
    let mut rows = conn.query(&sql, params![id.to_string()]).await?;

    match rows.next().await? {
        Some(row) => Ok(Some(target_from_row(&row)?)),
        None => Ok(None),
    }
}

async fn insert_result_row(
    conn: &Connection,
    id: Uuid,
    result: &CheckResult,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO check_results (target_uuid, timestamp, status, response_time_ms, status_code, error_message, manual) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id.to_string(),
            Target::timestamp_to_i64(result.timestamp),
            result.status.as_str(),
            result.response_time_ms.map(|v| v as i64),
            result.status_code.map(|v| v as i64),
            result.error_message.clone(),
            if result.manual { 1 } else { 0 }
        ],
    )
    .await?;
    Ok(())
}

async fn write_snapshot(conn: &Connection, target: &Target) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE targets SET display_name = ?, check_interval_minutes = ?, current_status = ?, current_response_time_ms = ?, last_checked_at = ?, updated_at = ? WHERE uuid = ?",
        params![
            target.display_name.clone(),
            target.check_interval_minutes as i64,
            target.current_status.as_str(),
            target.current_response_time_ms.map(|v| v as i64),
            target.last_checked_at.map(Target::timestamp_to_i64),
            Target::timestamp_to_i64(target.updated_at),
            target.id.to_string()
        ],
    )
    .await?;
    Ok(())
}

/// LibSQL implementation of the target store
///
/// SQLite admits a single writer, so writes are serialized through one lock;
/// that also gives per-target mutual exclusion for appends.
pub struct LibsqlStore {
    pool: LibsqlPool,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl LibsqlStore {
    /// Create a store from a pool whose database has been migrated
    pub fn new_from_pool(pool: LibsqlPool, capacity: usize) -> Self {
        Self { pool, capacity: capacity.max(1), write_lock: Mutex::new(()) }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }

    async fn query_targets(
        &self,
        filter: &str,
        args: Vec<String>,
    ) -> Result<Vec<Target>, StoreError> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {TARGET_COLUMNS} FROM targets {filter} ORDER BY id ASC");
        let mut rows = conn.query(&sql, args).await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(target_from_row(&row)?);
        }
        Ok(targets)
    }
}

#[async_trait]
impl TargetStore for LibsqlStore {
    async fn insert_target(&self, target: &Target, initial: &CheckResult) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let mut existing = tx
            .query(
                "SELECT 1 FROM targets WHERE owner = ? AND address = ?",
                params![target.owner.clone(), target.address.clone()],
            )
            .await?;
        if existing.next().await?.is_some() {
            return Err(StoreError::Conflict);
        }

        tx.execute(
            "INSERT INTO targets (uuid, owner, address, display_name, check_interval_minutes, current_status, current_response_time_ms, last_checked_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                target.id.to_string(),
                target.owner.clone(),
                target.address.clone(),
                target.display_name.clone(),
                target.check_interval_minutes as i64,
                target.current_status.as_str(),
                target.current_response_time_ms.map(|v| v as i64),
                target.last_checked_at.map(Target::timestamp_to_i64),
                Target::timestamp_to_i64(target.created_at),
                Target::timestamp_to_i64(target.updated_at)
            ],
        )
        .await
        .map_err(map_unique_violation)?;

        insert_result_row(&tx, target.id, initial).await?;
        tx.commit().await?;

        debug!(target_id = %target.id, address = %target.address, "Inserted target");
        Ok(())
    }

    async fn find_by_address(
        &self,
        owner: &str,
        address: &str,
    ) -> Result<Option<Target>, StoreError> {
        let targets = self
            .query_targets("WHERE owner = ? AND address = ?", vec![
                owner.to_string(),
                address.to_string(),
            ])
            .await?;
        Ok(targets.into_iter().next())
    }

    async fn get_target(&self, id: Uuid) -> Result<Option<Target>, StoreError> {
        let conn = self.get_conn().await?;
        select_target(&conn, id).await
    }

    async fn list_targets(&self, owner: &str) -> Result<Vec<Target>, StoreError> {
        self.query_targets("WHERE owner = ?", vec![owner.to_string()]).await
    }

    async fn list_all_targets(&self) -> Result<Vec<Target>, StoreError> {
        self.query_targets("", Vec::new()).await
    }

    async fn update_target(
        &self,
        id: Uuid,
        update: &TargetUpdate,
    ) -> Result<Option<Target>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let Some(mut target) = select_target(&tx, id).await? else {
            return Ok(None);
        };
        target.apply_update(update);
        write_snapshot(&tx, &target).await?;
        tx.commit().await?;

        Ok(Some(target))
    }

    async fn delete_target(&self, id: Uuid) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        // Foreign keys are off by default in SQLite, remove the ledger explicitly
        let removed_results =
            tx.execute("DELETE FROM check_results WHERE target_uuid = ?", params![id.to_string()])
                .await?;
        let removed = tx.execute("DELETE FROM targets WHERE uuid = ?", params![id.to_string()]).await?;
        tx.commit().await?;

        debug!(target_id = %id, removed_results, "Deleted target");
        Ok(removed > 0)
    }

    async fn append_result(&self, id: Uuid, result: &CheckResult) -> Result<Target, StoreError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let Some(mut target) = select_target(&tx, id).await? else {
            return Err(StoreError::NotFound);
        };

        insert_result_row(&tx, id, result).await?;
        tx.execute(
            "DELETE FROM check_results WHERE target_uuid = ?1 AND id NOT IN (SELECT id FROM check_results WHERE target_uuid = ?1 ORDER BY id DESC LIMIT ?2)",
            params![id.to_string(), self.capacity as i64],
        )
        .await?;

        target.record(result);
        tx.execute(
            "UPDATE targets SET current_status = ?, current_response_time_ms = ?, last_checked_at = ? WHERE uuid = ?",
            params![
                target.current_status.as_str(),
                target.current_response_time_ms.map(|v| v as i64),
                target.last_checked_at.map(Target::timestamp_to_i64),
                id.to_string()
            ],
        )
        .await?;
        tx.commit().await?;

        Ok(target)
    }

    async fn history_page(
        &self,
        id: Uuid,
        request: PageRequest,
    ) -> Result<HistoryPage, StoreError> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        if select_target(&tx, id).await?.is_none() {
            return Err(StoreError::NotFound);
        }

        let mut count_rows = tx
            .query("SELECT COUNT(*) FROM check_results WHERE target_uuid = ?", params![id.to_string()])
            .await?;
        let total_records = match count_rows.next().await? {
            Some(row) => row.get::<i64>(0)? as usize,
            None => 0,
        };

        let mut entries = Vec::new();
        if let Some((start, end)) = request.bounds() {
            if start < total_records {
                let sql = format!(
                    "SELECT {RESULT_COLUMNS} FROM check_results WHERE target_uuid = ? ORDER BY id ASC LIMIT ? OFFSET ?"
                );
                let mut rows = tx
                    .query(&sql, params![id.to_string(), (end - start) as i64, start as i64])
                    .await?;
                while let Some(row) = rows.next().await? {
                    entries.push(result_from_row(&row)?);
                }
            }
        }
        tx.commit().await?;

        Ok(HistoryPage { entries, total_records })
    }

    async fn history(&self, id: Uuid) -> Result<Vec<CheckResult>, StoreError> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        if select_target(&tx, id).await?.is_none() {
            return Err(StoreError::NotFound);
        }

        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM check_results WHERE target_uuid = ? ORDER BY id ASC"
        );
        let mut rows = tx.query(&sql, params![id.to_string()]).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(result_from_row(&row)?);
        }
        tx.commit().await?;

        Ok(results)
    }

    fn history_capacity(&self) -> usize {
        self.capacity
    }
}
