// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optional resilience layered around a [`DataSource`](crate::DataSource).
//!
//! The cache core never retries; a failed fetch is reported to its waiters
//! as-is. Callers who want retries wrap their source in [`RetryingSource`]
//! before handing it to the cache, so the retries happen inside the single
//! coalesced fetch.

pub mod retry;

pub use retry::{retry_source, RetryConfig, RetryingSource};
