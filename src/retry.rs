//! Retrying failed requests
//!
//! A [`RetryPolicy`] sends a request again when the failure is transient,
//! waiting longer after each attempt. Rate-limited requests wait for the NVD
//! rolling window instead of the regular backoff.

use std::time::Duration;

use log::{info, trace, warn};

use crate::cancel::CancelFlag;
use crate::error::ConnectorError;

/// Retry configuration for exponential backoff
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per request, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry of a transient failure
    pub initial_delay: Duration,
    /// Upper bound of the backoff
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Delay before the first retry of a rate-limited request
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            // NVD rate limits are computed over a rolling 30 seconds window
            rate_limit_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// The delay to wait after the given failed attempt (starting at 1).
    pub fn delay_for(&self, attempt: u32, error: &ConnectorError) -> Duration {
        let base = if error.is_rate_limited() {
            self.rate_limit_delay
        } else {
            self.initial_delay
        };
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        let delay = Duration::from_millis((base.as_millis() as f64 * factor) as u64);
        delay.min(self.max_delay.max(base))
    }

    /// Runs the operation until it succeeds, fails with a non-retryable
    /// error or runs out of attempts. The last error is returned.
    ///
    /// Raising `cancel` interrupts the wait before a retry, the error of the
    /// last attempt is then returned.
    pub fn run<T, F>(&self, cancel: &CancelFlag, mut operation: F) -> Result<T, ConnectorError>
    where
        F: FnMut() -> Result<T, ConnectorError>,
    {
        trace!("Running RetryPolicy::run()");
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    if cancel.wait(delay) {
                        info!("Retry abandoned, the fetch was cancelled");
                        return Err(e);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
