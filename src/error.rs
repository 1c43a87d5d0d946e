// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the tiered cache.
//!
//! Tier operations are pure in-memory mutations and never fail. The only
//! runtime failure is the authoritative source, which is surfaced verbatim
//! to every caller waiting on that fetch. Both error types are `Clone` so a
//! single failure can be handed to every coalesced waiter.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why the authoritative source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The source answered with an error
    Failed,
    /// The source did not answer in time
    TimedOut,
    /// The fetch task died before producing a result
    Aborted,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Error returned by a [`DataSource`](crate::DataSource) lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source lookup {kind}: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: Arc<str>,
}

impl SourceError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Failed,
            message: message.into().into(),
        }
    }

    #[must_use]
    pub fn timed_out(after: Duration) -> Self {
        Self {
            kind: SourceErrorKind::TimedOut,
            message: format!("no answer after {:?}", after).into(),
        }
    }

    #[must_use]
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Aborted,
            message: message.into().into(),
        }
    }

    /// True for failures that may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, SourceErrorKind::TimedOut | SourceErrorKind::Failed)
    }
}

/// Errors surfaced by [`TieredCache`](crate::TieredCache).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Every tier missed and the source could not produce a value.
    /// No tier was written.
    #[error("source unavailable for '{key}': {source}")]
    SourceUnavailable {
        key: String,
        #[source]
        source: SourceError,
    },

    /// This caller stopped waiting; the fetch keeps running for others.
    #[error("gave up waiting for '{key}' after {after:?}")]
    Timeout { key: String, after: Duration },

    /// This caller's cancellation signal fired before a result arrived.
    #[error("lookup for '{key}' cancelled")]
    Cancelled { key: String },

    /// Rejected at construction time.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    #[must_use]
    pub fn source_unavailable(key: &str, source: SourceError) -> Self {
        Self::SourceUnavailable {
            key: key.to_string(),
            source,
        }
    }

    /// Key the failing lookup was for, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::SourceUnavailable { key, .. }
            | Self::Timeout { key, .. }
            | Self::Cancelled { key } => Some(key),
            Self::InvalidConfig(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = SourceError::failed("connection refused");
        assert_eq!(format!("{}", err), "source lookup failed: connection refused");

        let err = SourceError::timed_out(Duration::from_millis(250));
        assert_eq!(err.kind, SourceErrorKind::TimedOut);
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_source_error_transient() {
        assert!(SourceError::failed("x").is_transient());
        assert!(SourceError::timed_out(Duration::from_secs(1)).is_transient());
        assert!(!SourceError::aborted("panic").is_transient());
    }

    #[test]
    fn test_cache_error_key() {
        let err = CacheError::source_unavailable("user.1", SourceError::failed("down"));
        assert_eq!(err.key(), Some("user.1"));
        assert!(err.to_string().contains("user.1"));

        let err = CacheError::InvalidConfig("no tiers".into());
        assert_eq!(err.key(), None);
    }

    #[test]
    fn test_cache_error_clone_is_equal() {
        let err = CacheError::source_unavailable("k", SourceError::failed("boom"));
        assert_eq!(err.clone(), err);
    }
}
