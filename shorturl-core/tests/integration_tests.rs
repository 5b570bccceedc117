// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for the store, its record log and the cache proxy.
//!
//! These tests exercise the public API only, against real log files.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shorturl_core::{
    CacheProxy, ConfigLoader, KvStore, Record, RecordLog, StoreError, StoreFacade, StoreResult,
    UrlStore,
};
use tempfile::TempDir;

/// Remote that counts calls and serves from a shared authority.
#[derive(Debug)]
struct CountingRemote {
    authority: Arc<KvStore>,
    calls: AtomicUsize,
}

impl UrlStore for CountingRemote {
    async fn put(&self, url: &str) -> StoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        KvStore::put(&self.authority, url).await
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        KvStore::get(&self.authority, key)
    }
}

/// Remote whose transport is always down.
#[derive(Debug)]
struct DeadRemote;

impl UrlStore for DeadRemote {
    async fn put(&self, _url: &str) -> StoreResult<String> {
        Err(StoreError::remote("connection refused"))
    }

    async fn get(&self, _key: &str) -> StoreResult<String> {
        Err(StoreError::remote("connection refused"))
    }
}

/// Empty store: put, get back, and a miss.
#[tokio::test]
async fn test_put_get_roundtrip_on_empty_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = KvStore::open(dir.path().join("store.json"), 16)
        .await
        .expect("Failed to open store");

    let k1 = store.put("https://example.com/a").await.unwrap();
    assert_eq!(store.get(&k1).unwrap(), "https://example.com/a");

    let err = store.get("nonexistent").unwrap_err();
    assert!(matches!(err, StoreError::KeyNotFound { .. }));

    store.shutdown().await.unwrap();
}

/// Two concurrent puts on an empty store.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_puts_distinct_keys() {
    let store = Arc::new(KvStore::in_memory());

    let a = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.put("http://a").await })
    };
    let b = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.put("http://b").await })
    };

    let ka = a.await.unwrap().unwrap();
    let kb = b.await.unwrap().unwrap();

    assert_ne!(ka, kb);
    assert_eq!(store.count(), 2);
    assert_eq!(store.get(&ka).unwrap(), "http://a");
    assert_eq!(store.get(&kb).unwrap(), "http://b");
}

/// Store bootstrapped from an existing log.
#[tokio::test]
async fn test_store_restored_from_log() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");
    std::fs::write(
        &path,
        "{\"key\":\"1\",\"url\":\"http://a\"}\n{\"key\":\"2\",\"url\":\"http://b\"}\n",
    )
    .unwrap();

    let store = KvStore::open(&path, 16).await.unwrap();
    assert_eq!(store.get("1").unwrap(), "http://a");
    assert_eq!(store.get("2").unwrap(), "http://b");
    assert_eq!(store.count(), 2);

    // New keys never clash with replayed ones.
    let key = store.put("http://c").await.unwrap();
    assert!(key != "1" && key != "2");
    store.shutdown().await.unwrap();
}

/// Every acknowledged put shows up on replay.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_acknowledged_puts_are_replayed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");
    let store = Arc::new(KvStore::open(&path, 4).await.unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut acked = Vec::new();
                for i in 0..25 {
                    let url = format!("http://host/{}/{}", t, i);
                    let key = store.put(&url).await.unwrap();
                    acked.push(Record::put(key, url));
                }
                acked
            })
        })
        .collect();

    let mut acked = Vec::new();
    for task in tasks {
        acked.extend(task.await.unwrap());
    }
    store.shutdown().await.unwrap();

    let replayed: HashSet<Record> = RecordLog::load(&path)
        .unwrap()
        .records
        .into_iter()
        .collect();
    assert_eq!(replayed.len(), acked.len());
    for record in &acked {
        assert!(replayed.contains(record), "missing {:?}", record);
    }

    let keys: HashSet<&str> = acked.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys.len(), 200);
}

/// Reopening a store sees the previous session's writes and deletes.
#[tokio::test]
async fn test_restart_preserves_state_and_tombstones() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");

    let (kept, deleted) = {
        let store = KvStore::open(&path, 16).await.unwrap();
        let kept = store.put("http://kept").await.unwrap();
        let deleted = store.put("http://deleted").await.unwrap();
        store.delete(&deleted).await.unwrap();
        store.shutdown().await.unwrap();
        (kept, deleted)
    };

    let store = KvStore::open(&path, 16).await.unwrap();
    assert_eq!(store.get(&kept).unwrap(), "http://kept");
    assert!(store.get(&deleted).unwrap_err().is_not_found());
    assert_eq!(store.count(), 1);

    for i in 0..10 {
        let key = store.put(&format!("http://new/{}", i)).await.unwrap();
        assert_ne!(key, deleted, "deleted key was reissued");
        assert_ne!(key, kept);
    }
    store.shutdown().await.unwrap();
}

/// A log cut mid-record loads like the same log without the torn bytes.
#[tokio::test]
async fn test_truncated_log_matches_clean_prefix() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");

    {
        let store = KvStore::open(&path, 16).await.unwrap();
        for i in 0..5 {
            store.put(&format!("http://{}", i)).await.unwrap();
        }
        store.shutdown().await.unwrap();
    }

    let full = std::fs::read(&path).unwrap();
    let last_line_start = full[..full.len() - 1]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap();
    let clean_prefix = &full[..last_line_start];
    let torn = &full[..last_line_start + 7];

    let torn_path = dir.path().join("torn.json");
    let clean_path = dir.path().join("clean.json");
    std::fs::write(&torn_path, torn).unwrap();
    std::fs::write(&clean_path, clean_prefix).unwrap();

    let torn_records = RecordLog::load(&torn_path).unwrap().records;
    let clean_records = RecordLog::load(&clean_path).unwrap().records;
    assert_eq!(torn_records, clean_records);
    assert_eq!(torn_records.len(), 4);

    // Appending after a torn tail must leave a fully readable log.
    let store = KvStore::open(&torn_path, 16).await.unwrap();
    let key = store.put("http://after-crash").await.unwrap();
    store.shutdown().await.unwrap();

    let replayed = RecordLog::load(&torn_path).unwrap().records;
    assert_eq!(replayed.len(), 5);
    assert_eq!(replayed[4], Record::put(key, "http://after-crash"));
}

/// A final record missing its newline survives appends and restarts.
#[tokio::test]
async fn test_unterminated_last_record_survives_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{\"key\":\"1\",\"url\":\"http://a\"}").unwrap();

    let key = {
        let store = KvStore::open(&path, 16).await.unwrap();
        let key = store.put("http://b").await.unwrap();
        store.shutdown().await.unwrap();
        key
    };

    let store = KvStore::open(&path, 16).await.unwrap();
    assert_eq!(store.count(), 2);
    assert_eq!(store.get("1").unwrap(), "http://a");
    assert_eq!(store.get(&key).unwrap(), "http://b");
    store.shutdown().await.unwrap();

    let replayed = RecordLog::load(&path).unwrap();
    assert_eq!(
        replayed.records,
        vec![Record::put("1", "http://a"), Record::put(key, "http://b")]
    );
    assert!(!replayed.unterminated);
}

/// Corruption before the tail is fatal at startup.
#[tokio::test]
async fn test_corrupt_log_aborts_open() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");
    std::fs::write(
        &path,
        "{\"key\":\"1\",\"url\":\"http://a\"}\n#corrupt#\n{\"key\":\"2\",\"url\":\"http://b\"}\n",
    )
    .unwrap();

    let result = KvStore::open(&path, 16).await;
    assert!(matches!(result, Err(StoreError::Journal(_))));
}

/// Legacy log files with capitalised field names still load.
#[tokio::test]
async fn test_legacy_log_format() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{\"Key\":\"a\",\"URL\":\"http://legacy\"}\n").unwrap();

    let store = KvStore::open(&path, 16).await.unwrap();
    assert_eq!(store.get("a").unwrap(), "http://legacy");
    assert_ne!(store.put("http://new").await.unwrap(), "a");
    store.shutdown().await.unwrap();
}

/// Cold cache miss hits the remote once, then the cache serves.
#[tokio::test]
async fn test_proxy_cold_miss_then_cache_hit() {
    let authority = Arc::new(KvStore::in_memory());
    authority.insert("k", "http://x").unwrap();

    let proxy = CacheProxy::new(
        CountingRemote {
            authority: Arc::clone(&authority),
            calls: AtomicUsize::new(0),
        },
        Duration::from_secs(1),
    );

    assert_eq!(proxy.get("k").await.unwrap(), "http://x");
    assert_eq!(proxy.get("k").await.unwrap(), "http://x");
    assert_eq!(proxy.remote().calls.load(Ordering::SeqCst), 1);
}

/// Remote failure on put surfaces and leaves the cache empty.
#[tokio::test]
async fn test_proxy_put_remote_failure() {
    let proxy = CacheProxy::new(DeadRemote, Duration::from_secs(1));

    let err = proxy.put("http://a").await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteUnavailable { .. }));
    assert_eq!(proxy.cache().count(), 0);
}

/// Proxies only ever serve values the authority confirmed.
#[tokio::test]
async fn test_proxies_share_one_authority() {
    let authority = Arc::new(KvStore::in_memory());
    let make_proxy = || {
        CacheProxy::new(
            CountingRemote {
                authority: Arc::clone(&authority),
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(1),
        )
    };
    let west = make_proxy();
    let east = make_proxy();

    let k1 = west.put("http://one").await.unwrap();
    let k2 = east.put("http://two").await.unwrap();
    assert_ne!(k1, k2);

    assert_eq!(east.get(&k1).await.unwrap(), "http://one");
    assert_eq!(west.get(&k2).await.unwrap(), "http://two");
    assert_eq!(authority.count(), 2);
    assert!(east.get("never-issued").await.unwrap_err().is_not_found());
}

/// Config file drives the store mode end to end.
#[tokio::test]
async fn test_config_selects_direct_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("shorturl.yaml");
    let log_path = dir.path().join("urls.json");

    std::fs::write(
        &config_path,
        format!(
            "server:\n  port: 9999\nstore:\n  file: {}\n  queue_capacity: 8\n",
            log_path.display()
        ),
    )
    .expect("Failed to write config");

    let config = ConfigLoader::load_file(&config_path).expect("Failed to load config");
    let facade = StoreFacade::<DeadRemote>::open(&config.store, |_| Ok(DeadRemote))
        .await
        .unwrap();

    assert!(!facade.is_proxied());
    let key = facade.put("http://configured").await.unwrap();
    assert_eq!(facade.get(&key).await.unwrap(), "http://configured");
    facade.shutdown().await.unwrap();

    assert_eq!(RecordLog::load(&log_path).unwrap().records.len(), 1);
}
