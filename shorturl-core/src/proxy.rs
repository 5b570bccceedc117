// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Read-replica cache in front of a remote master store.
//!
//! The proxy is never authoritative. Writes always go to the master first,
//! and only a key the master confirmed is cached. Reads are answered from
//! the local cache when possible and fall through to the master on a miss.
//! The cache is only ever populated and never invalidated.
//!
//! Remote calls are bounded by a timeout. A failed, timed out or dropped
//! call leaves the cache untouched.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::facade::UrlStore;
use crate::store::KvStore;

/// Hit/miss counters for a proxy cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub remote_failures: u64,
}

/// Caching proxy for a remote [`UrlStore`].
#[derive(Debug)]
pub struct CacheProxy<R> {
    remote: R,
    cache: KvStore,
    timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    remote_failures: AtomicU64,
}

impl<R: UrlStore> CacheProxy<R> {
    /// Create a proxy with an empty cache. `timeout` bounds each remote call.
    pub fn new(remote: R, timeout: Duration) -> Self {
        Self {
            remote,
            cache: KvStore::in_memory(),
            timeout,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            remote_failures: AtomicU64::new(0),
        }
    }

    /// The remote master client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The local cache.
    pub fn cache(&self) -> &KvStore {
        &self.cache
    }

    /// Default per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
        }
    }

    /// Resolve `key` using the default timeout.
    pub async fn get(&self, key: &str) -> StoreResult<String> {
        self.get_within(key, self.timeout).await
    }

    /// Resolve `key`, waiting at most `timeout` for the master on a miss.
    pub async fn get_within(&self, key: &str, timeout: Duration) -> StoreResult<String> {
        if let Ok(url) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "Cache hit");
            return Ok(url);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let url = self.call(timeout, self.remote.get(key)).await?;
        self.populate(key, &url);
        Ok(url)
    }

    /// Shorten `url` on the master using the default timeout.
    pub async fn put(&self, url: &str) -> StoreResult<String> {
        self.put_within(url, self.timeout).await
    }

    /// Shorten `url` on the master, waiting at most `timeout`.
    ///
    /// There is no local fallback: two proxies minting keys on their own
    /// would hand out the same key for different urls.
    pub async fn put_within(&self, url: &str, timeout: Duration) -> StoreResult<String> {
        let key = self.call(timeout, self.remote.put(url)).await?;
        self.populate(&key, url);
        Ok(key)
    }

    async fn call<T>(
        &self,
        timeout: Duration,
        request: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let result = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_not_found() => return Err(e),
            Ok(Err(e @ StoreError::RemoteUnavailable { .. })) => e,
            Ok(Err(e)) => StoreError::remote(e.to_string()),
            Err(_) => StoreError::remote(format!("no reply within {:?}", timeout)),
        };

        self.remote_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(error = %result, "Remote store call failed");
        Err(result)
    }

    fn populate(&self, key: &str, url: &str) {
        if self.cache.insert(key, url).is_err() {
            // Another request cached it first; the master never reassigns keys.
            tracing::trace!(key = %key, "Already cached");
        }
    }
}

impl<R: UrlStore> UrlStore for CacheProxy<R> {
    async fn put(&self, url: &str) -> StoreResult<String> {
        CacheProxy::put(self, url).await
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        CacheProxy::get(self, key).await
    }
}
