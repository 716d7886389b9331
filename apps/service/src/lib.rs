//! Endpoint reachability monitoring engine.
//!
//! Targets are probed on a fixed cadence, every result lands in a bounded
//! per-target history, and uptime statistics are computed over trailing
//! windows on demand. [`engine::MonitorEngine`] is the entry point for
//! callers; [`monitoring::MonitoringScheduler`] drives the background sweep.

pub mod config;
pub mod database;
pub mod engine;
pub mod monitoring;
pub mod pool;
pub mod validation;
