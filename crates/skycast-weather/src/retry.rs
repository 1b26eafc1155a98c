//! Retry utilities for provider requests with a fixed backoff schedule.
//!
//! Retried:
//! - 429 Too Many Requests
//! - 5xx server errors
//! - transport failures (timeouts, connection resets, DNS)
//!
//! Any other status is handed back as a normal response for the caller to
//! interpret. Once the schedule is exhausted the last failure is wrapped in
//! [`TransientRequestError`].

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::TransientRequestError;

/// Default backoff schedule, one entry per retry
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 2, 4];
/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Sleep before each retry; its length is the number of retries
    pub backoff: Vec<Duration>,
    /// Timeout applied to every single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(backoff: Vec<Duration>, timeout: Duration) -> Self {
        Self { backoff, timeout }
    }

    pub fn from_config(config: &skycast_core::RetryConfig) -> Self {
        Self {
            backoff: config
                .backoff_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Total attempts, first try included
    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Hand the response to the caller as-is
    NoRetry,
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error() {
        tracing::debug!("Server error ({}), will retry", status);
        return RetryDecision::Retry;
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::debug!("Rate limited (429), will retry");
        return RetryDecision::Retry;
    }

    RetryDecision::NoRetry
}

/// Anything that carries an HTTP status.
pub trait HasStatus {
    fn status(&self) -> StatusCode;
}

impl HasStatus for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

impl HasStatus for StatusCode {
    fn status(&self) -> StatusCode {
        *self
    }
}

/// Execute a request with the policy's backoff schedule.
///
/// `operation` performs one attempt. Every `Err` is treated as a transport
/// failure and retried.
///
/// # Errors
/// Returns [`TransientRequestError`] with the last status or the last
/// transport error once every attempt has failed.
///
/// # Example
/// ```ignore
/// let response = with_retry(&RetryPolicy::default(), || client.get(url).send()).await?;
/// ```
pub async fn with_retry<F, Fut, R, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<R, TransientRequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: HasStatus,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Display,
{
    let attempts = policy.max_attempts();
    let mut last_error = TransientRequestError::Status(0);

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.backoff[attempt - 1];
            tracing::info!(
                "Retry attempt {} of {}, waiting {:?}",
                attempt,
                attempts - 1,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) == RetryDecision::NoRetry {
                    if attempt > 0 {
                        tracing::info!("Request succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }

                tracing::warn!(
                    "Request returned retryable status {}, attempt {} of {}",
                    status,
                    attempt + 1,
                    attempts
                );
                last_error = TransientRequestError::Status(status.as_u16());
            }
            Err(e) => {
                tracing::warn!(
                    "Transport error on attempt {} of {}: {}",
                    attempt + 1,
                    attempts,
                    e
                );
                last_error = TransientRequestError::Network(e.into());
            }
        }
    }

    tracing::error!("All {} attempts exhausted: {}", attempts, last_error);
    Err(last_error)
}
