use std::error::Error as _;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Redirect hops followed before the last response is classified.
const MAX_REDIRECTS: usize = 5;

/// A completed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub latency_ms: u64,
}

/// Transport-level failure: no response was received
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timeout of {0}ms exceeded")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Checker trait for the transport behind a probe
///
/// Implementations perform exactly one attempt and never retry.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, target: &str) -> Result<ProbeResponse, ProbeError>;
}

/// HTTP/HTTPS GET checker
pub struct HttpChecker {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpChecker {
    pub fn new(timeout_ms: u64, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout_ms })
    }

    fn classify_error(&self, error: reqwest::Error) -> ProbeError {
        if error.is_timeout() {
            return ProbeError::Timeout(self.timeout_ms);
        }
        if error.is_builder() {
            return ProbeError::InvalidAddress(root_cause(&error));
        }
        if error.is_connect() {
            return ProbeError::Connect(root_cause(&error));
        }
        ProbeError::Request(root_cause(&error))
    }
}

/// Innermost error message, reqwest wraps the useful part in sources
fn root_cause(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message = inner.to_string();
        source = inner.source();
    }
    message
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        let latency_ms = start.elapsed().as_millis() as u64;

        // Any received status is a completed probe, classification happens upstream
        Ok(ProbeResponse { status_code: response.status().as_u16(), latency_ms })
    }
}
