// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Authoritative short key to URL store.
//!
//! Backed by a `DashMap`, so readers proceed concurrently and writers lock a
//! single shard. Inserts are accept-if-absent: a key, once assigned, is never
//! overwritten.
//!
//! Keys come from a strictly monotonic sequence counter passed through a
//! [`KeyCodec`]. A collision (e.g. with a key replayed from an older log)
//! just advances the counter and tries again.
//!
//! Deleted keys keep a tombstone slot, so the retry loop can never hand out a
//! key that was issued before, not even after a restart. Words in
//! [`RESERVED_KEYS`] are held the same way and are never generated.
//!
//! A record is handed to the log queue while the key's shard is still
//! locked, so per key the log order always matches the order of changes.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::codec::{Base62Codec, KeyCodec};
use crate::error::{JournalError, StoreError, StoreResult};
use crate::journal::{LogWriter, RecordLog};
use crate::types::Record;

/// Keys that name fixed HTTP routes and would shadow a redirect.
pub const RESERVED_KEYS: &[&str] = &["get", "put", "metrics", "rpc"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Live(String),
    Tombstone,
    Reserved,
}

/// Concurrency-safe key to URL map with optional durability.
#[derive(Debug)]
pub struct KvStore {
    /// Key to slot. Tombstones keep deleted keys reserved.
    urls: DashMap<String, Slot>,
    /// Next sequence number handed to the codec.
    next_seq: AtomicU64,
    /// Number of live (non-tombstone) slots.
    live: AtomicUsize,
    codec: Box<dyn KeyCodec>,
    /// Bounded queue feeding the record log. `None` for pure caches.
    queue: Option<mpsc::Sender<Record>>,
    writer: Mutex<Option<LogWriter>>,
}

impl KvStore {
    fn build(queue: Option<mpsc::Sender<Record>>, writer: Option<LogWriter>) -> Self {
        let urls = DashMap::new();
        for key in RESERVED_KEYS {
            urls.insert(key.to_string(), Slot::Reserved);
        }

        Self {
            urls,
            next_seq: AtomicU64::new(0),
            live: AtomicUsize::new(0),
            codec: Box::new(Base62Codec),
            queue,
            writer: Mutex::new(writer),
        }
    }

    /// Create a store with no record log. Used as the proxy cache.
    pub fn in_memory() -> Self {
        Self::build(None, None)
    }

    /// Create a store that enqueues records onto `queue`.
    ///
    /// The caller owns the receiving end. When the queue is full, `put` and
    /// `delete` wait for capacity.
    pub fn with_queue(queue: mpsc::Sender<Record>) -> Self {
        Self::build(Some(queue), None)
    }

    /// Replace the key codec.
    pub fn with_codec(mut self, codec: impl KeyCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replay the record log at `path`, then start appending to it.
    ///
    /// Replay completes before the store is returned, so no request can
    /// observe a partially rebuilt map. A corrupt log aborts with
    /// `JournalError::LoadFailed`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(path: impl AsRef<Path>, queue_capacity: usize) -> StoreResult<Self> {
        let path = path.as_ref();
        let (records, file) = RecordLog::open(path)?;

        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let writer = LogWriter::spawn(rx, file);

        let store = Self::build(Some(tx), Some(writer));
        let applied = store.restore(records);

        tracing::info!(
            path = %path.display(),
            records = applied,
            live = store.count(),
            next_seq = store.next_seq.load(Ordering::SeqCst),
            "Store opened"
        );

        Ok(store)
    }

    /// Apply replayed records. Returns how many were applied.
    pub(crate) fn restore(&self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut applied = 0;

        for record in records {
            applied += 1;
            match self.urls.entry(record.key) {
                Entry::Vacant(slot) => {
                    if record.deleted {
                        slot.insert(Slot::Tombstone);
                    } else {
                        slot.insert(Slot::Live(record.url));
                        self.live.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Entry::Occupied(mut slot) => {
                    let was_live = matches!(slot.get(), Slot::Live(_));
                    if record.deleted {
                        if was_live {
                            self.live.fetch_sub(1, Ordering::SeqCst);
                        }
                        slot.insert(Slot::Tombstone);
                    } else if *slot.get() == Slot::Reserved {
                        // Logs written before keys were reserved may use them.
                        slot.insert(Slot::Live(record.url));
                        self.live.fetch_add(1, Ordering::SeqCst);
                    } else if was_live {
                        tracing::warn!(
                            key = %slot.key(),
                            "Duplicate key in record log, keeping first value"
                        );
                    } else {
                        // Older logs could record a delete ahead of its put.
                        tracing::debug!(key = %slot.key(), "Put after tombstone, key stays deleted");
                    }
                }
            }
        }

        // Every issued slot, live or not, consumed at least one sequence number.
        let issued = self
            .urls
            .iter()
            .filter(|slot| *slot.value() != Slot::Reserved)
            .count();
        self.next_seq.fetch_max(issued as u64, Ordering::SeqCst);

        applied
    }

    /// Look up the URL for `key`.
    pub fn get(&self, key: &str) -> StoreResult<String> {
        match self.urls.get(key).as_deref() {
            Some(Slot::Live(url)) => Ok(url.clone()),
            _ => Err(StoreError::not_found(key)),
        }
    }

    /// Insert `key -> url` only if `key` has never been assigned.
    ///
    /// Fails with `KeyCollision` when the key is live, tombstoned or
    /// reserved. Does not
    /// write a record; the proxy uses this to populate its cache.
    pub fn insert(&self, key: &str, url: &str) -> StoreResult<()> {
        match self.urls.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::KeyCollision {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Slot::Live(url.to_string()));
                self.live.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Store `url` under a freshly generated key and return the key.
    ///
    /// The record is queued for the log before returning but is written
    /// asynchronously. If the queue is full this waits for capacity before
    /// the key is assigned.
    pub async fn put(&self, url: &str) -> StoreResult<String> {
        let mut permit = self.reserve_record().await;

        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            match self.urls.entry(self.codec.encode(seq)) {
                Entry::Occupied(slot) => {
                    tracing::debug!(key = %slot.key(), seq, "Key collision, retrying");
                }
                Entry::Vacant(slot) => {
                    let key = slot.key().clone();
                    let guard = slot.insert(Slot::Live(url.to_string()));
                    self.live.fetch_add(1, Ordering::SeqCst);
                    if let Some(permit) = permit.take() {
                        permit.send(Record::put(&key, url));
                    }
                    drop(guard);
                    return Ok(key);
                }
            }
        }
    }

    /// Remove the mapping for `key`.
    ///
    /// The key stays reserved as a tombstone and is never generated again.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let permit = self.reserve_record().await;
        {
            let mut slot = self
                .urls
                .get_mut(key)
                .ok_or_else(|| StoreError::not_found(key))?;
            if !matches!(*slot, Slot::Live(_)) {
                return Err(StoreError::not_found(key));
            }
            *slot = Slot::Tombstone;
            self.live.fetch_sub(1, Ordering::SeqCst);
            if let Some(permit) = permit {
                permit.send(Record::tombstone(key));
            }
        }

        tracing::info!(key = %key, "Key deleted");
        Ok(())
    }

    /// Number of live mappings.
    pub fn count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the store holds no live mappings.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether writes are fed to a record log.
    pub fn is_durable(&self) -> bool {
        self.queue.is_some()
    }

    /// Flush queued records and stop the log writer.
    ///
    /// Idempotent. Writes made afterwards stay in memory only and are
    /// reported as not persisted.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let writer = match self.writer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(writer) = writer {
            let written = writer.shutdown().await?;
            tracing::info!(written, "Record log flushed");
        }
        Ok(())
    }

    /// Wait for room on the log queue. `None` when there is no log or the
    /// writer has stopped.
    async fn reserve_record(&self) -> Option<mpsc::Permit<'_, Record>> {
        let queue = self.queue.as_ref()?;
        match queue.reserve().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::error!(error = %JournalError::Closed, "Record not persisted");
                None
            }
        }
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
