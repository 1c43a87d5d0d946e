// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry with exponential backoff for source lookups.
//!
//! # Example
//!
//! ```
//! use tiered_cache::RetryConfig;
//! use std::time::Duration;
//!
//! // Quick retry, then let the cache report the failure
//! let query = RetryConfig::query();
//! assert_eq!(query.max_attempts, 3);
//!
//! // One attempt, bounded in time
//! let bounded = RetryConfig::once().with_attempt_timeout(Duration::from_millis(250));
//! assert_eq!(bounded.max_attempts, 1);
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{CacheError, SourceError};
use crate::source::DataSource;

/// Backoff schedule for [`RetryingSource`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first (at least 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_initial_delay", with = "millis")]
    pub initial_delay: Duration,
    #[serde(default = "default_max_delay", with = "millis")]
    pub max_delay: Duration,
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Per-attempt deadline; an attempt that overruns counts as timed out
    #[serde(default, with = "opt_millis")]
    pub attempt_timeout: Option<Duration>,
}

fn default_max_attempts() -> usize { 3 }
fn default_initial_delay() -> Duration { Duration::from_millis(100) }
fn default_max_delay() -> Duration { Duration::from_secs(2) }
fn default_factor() -> f64 { 2.0 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self::query()
    }
}

impl RetryConfig {
    /// 3 attempts with fast backoff. If it still fails, the waiters see it.
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            factor: default_factor(),
            attempt_timeout: None,
        }
    }

    /// A single attempt. Useful together with an attempt timeout.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::query()
        }
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
            attempt_timeout: None,
        }
    }

    /// Reject schedules that cannot produce a sane backoff.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_attempts == 0 {
            return Err(CacheError::InvalidConfig(
                "retry max_attempts must be at least 1".into(),
            ));
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(CacheError::InvalidConfig(format!(
                "retry factor must be a finite number >= 1.0, got {}",
                self.factor
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(CacheError::InvalidConfig(format!(
                "retry initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Never panics: an out-of-range product (negative, NaN, overflow) caps
    /// at `max_delay`.
    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor)
            .map_or(self.max_delay, |next| next.min(self.max_delay))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// Only [transient](SourceError::is_transient) errors are retried.
pub async fn retry_source<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, operation())
                .await
                .unwrap_or_else(|_| Err(SourceError::timed_out(limit))),
            None => operation().await,
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Source lookup succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() || attempt >= max_attempts => return Err(err),
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Source lookup failed, retrying"
                );
                crate::metrics::record_source_retry(attempt);
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}

/// [`DataSource`] wrapper that retries transient failures with backoff.
#[derive(Debug, Clone)]
pub struct RetryingSource<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S, V> DataSource<V> for RetryingSource<S>
where
    S: DataSource<V>,
    V: Send + 'static,
{
    async fn lookup(&self, key: &str) -> Result<V, SourceError> {
        retry_source(key, &self.config, || self.inner.lookup(key)).await
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
