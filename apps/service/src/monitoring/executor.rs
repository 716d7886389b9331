use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use super::checker::{Checker, HttpChecker};
use super::types::{CheckResult, CheckTrigger};

/// Probe executor - runs one reachability check and classifies it
///
/// Network failures are returned as `down` results, never as errors.
#[derive(Clone)]
pub struct ProbeExecutor {
    checker: Arc<dyn Checker>,
}

impl ProbeExecutor {
    /// Create an executor backed by the HTTP checker
    pub fn new(timeout_ms: u64, user_agent: &str) -> Result<Self> {
        Ok(Self::with_checker(Arc::new(HttpChecker::new(timeout_ms, user_agent)?)))
    }

    /// Create an executor over any checker implementation
    pub fn with_checker(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Execute a single probe against `address`
    pub async fn probe(&self, address: &str, trigger: CheckTrigger) -> CheckResult {
        match self.checker.check(address).await {
            Ok(response) => {
                let result =
                    CheckResult::responded(trigger, response.status_code, response.latency_ms);
                debug!(
                    address,
                    status = %result.status,
                    status_code = response.status_code,
                    latency_ms = response.latency_ms,
                    "Probe completed"
                );
                result
            }
            Err(e) => {
                debug!(address, error = %e, "Probe failed");
                CheckResult::failure(trigger, e.to_string())
            }
        }
    }
}
