// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The `{put, get}` capability request handlers depend on.
//!
//! A node either owns the authoritative [`KvStore`] or fronts a remote master
//! with a [`CacheProxy`]. The choice is made once, from configuration, and
//! never changes for the life of the process.

use std::future::Future;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::proxy::{CacheProxy, CacheStats};
use crate::store::KvStore;

/// Shortening capability shared by the direct store, the cache proxy and
/// remote clients.
pub trait UrlStore: Send + Sync {
    /// Store `url` and return the key assigned to it.
    fn put(&self, url: &str) -> impl Future<Output = StoreResult<String>> + Send;

    /// Resolve `key` to its url. Fails with `KeyNotFound` if it is unknown.
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<String>> + Send;
}

impl UrlStore for KvStore {
    async fn put(&self, url: &str) -> StoreResult<String> {
        KvStore::put(self, url).await
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        KvStore::get(self, key)
    }
}

/// Store selected at startup.
#[derive(Debug)]
pub enum StoreFacade<R> {
    /// This node is the authority.
    Direct(Arc<KvStore>),
    /// Reads are cached locally, misses and writes go to the master.
    Proxied(CacheProxy<R>),
}

impl<R: UrlStore> StoreFacade<R> {
    /// Build the store described by `config`.
    ///
    /// With a master address the node becomes a proxy and `connect` builds the
    /// remote client; the local record log is not opened. Otherwise the log is
    /// replayed and this node serves as the authority.
    pub async fn open<F>(config: &StoreConfig, connect: F) -> StoreResult<Self>
    where
        F: FnOnce(&str) -> StoreResult<R>,
    {
        match config.master.as_deref().filter(|addr| !addr.is_empty()) {
            Some(addr) => {
                let remote = connect(addr)?;
                tracing::info!(master = %addr, "Serving as cache proxy");
                Ok(Self::Proxied(CacheProxy::new(remote, config.remote_timeout)))
            }
            None => {
                let store = KvStore::open(&config.file, config.queue_capacity).await?;
                tracing::info!(file = %config.file.display(), "Serving as authority");
                Ok(Self::Direct(Arc::new(store)))
            }
        }
    }

    /// Check if requests are forwarded to a master.
    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Proxied(_))
    }

    /// The authoritative store, when this node is the master.
    pub fn authority(&self) -> Option<&Arc<KvStore>> {
        match self {
            Self::Direct(store) => Some(store),
            Self::Proxied(_) => None,
        }
    }

    /// Number of mappings visible locally (cached entries for a proxy).
    pub fn local_count(&self) -> usize {
        match self {
            Self::Direct(store) => store.count(),
            Self::Proxied(proxy) => proxy.cache().count(),
        }
    }

    /// Cache counters, when proxying.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        match self {
            Self::Direct(_) => None,
            Self::Proxied(proxy) => Some(proxy.stats()),
        }
    }

    /// Flush pending records. A no-op for proxies, which hold no log.
    pub async fn shutdown(&self) -> StoreResult<()> {
        match self {
            Self::Direct(store) => store.shutdown().await,
            Self::Proxied(_) => Ok(()),
        }
    }
}

impl<R: UrlStore> UrlStore for StoreFacade<R> {
    async fn put(&self, url: &str) -> StoreResult<String> {
        match self {
            Self::Direct(store) => KvStore::put(store, url).await,
            Self::Proxied(proxy) => proxy.put(url).await,
        }
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        match self {
            Self::Direct(store) => KvStore::get(store, key),
            Self::Proxied(proxy) => proxy.get(key).await,
        }
    }
}
