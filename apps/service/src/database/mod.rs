/// Storage layer for targets and their history ledgers
///
/// `TargetStore` is the seam the engine and the scheduler depend on. Two
/// implementations exist: an in-memory store and a LibSQL (SQLite) store.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::{LibsqlStore, TargetStore};

use anyhow::Result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Record not found")]
    NotFound,

    #[error("Unique constraint violation")]
    Conflict,

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
