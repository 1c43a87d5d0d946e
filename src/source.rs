// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The authoritative data source behind the last tier.
//!
//! The cache treats the source as an opaque async lookup keyed by string.
//! It is called at most once per group of concurrent misses on a key.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;

/// System of record consulted when every tier misses.
#[async_trait]
pub trait DataSource<V>: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<V, SourceError>;
}

#[async_trait]
impl<V, S> DataSource<V> for Arc<S>
where
    S: DataSource<V> + ?Sized,
    V: Send,
{
    async fn lookup(&self, key: &str) -> Result<V, SourceError> {
        (**self).lookup(key).await
    }
}

/// Adapter turning an async closure into a [`DataSource`].
///
/// ```
/// use tiered_cache::{source_fn, DataSource, SourceError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let db = source_fn(|key: String| async move {
///     Ok::<_, SourceError>(format!("Data for {}", key))
/// });
/// assert_eq!(db.lookup("key1").await.unwrap(), "Data for key1");
/// # }
/// ```
pub struct FnSource<F, V> {
    f: F,
    _value: PhantomData<fn() -> V>,
}

/// Wrap an async closure as a [`DataSource`].
pub fn source_fn<F, Fut, V>(f: F) -> FnSource<F, V>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, SourceError>> + Send,
    V: Send,
{
    FnSource { f, _value: PhantomData }
}

#[async_trait]
impl<F, Fut, V> DataSource<V> for FnSource<F, V>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, SourceError>> + Send,
    V: Send,
{
    async fn lookup(&self, key: &str) -> Result<V, SourceError> {
        (self.f)(key.to_string()).await
    }
}
