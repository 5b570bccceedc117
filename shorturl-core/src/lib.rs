//! shorturl Core Library
//!
//! Key-value store behind the shorturl service. Provides the concurrent
//! key to URL map, the append-only record log that makes it durable, the
//! caching proxy read replicas use, and configuration parsing.

pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod journal;
pub mod proxy;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use codec::{Base62Codec, KeyCodec};
pub use config::{Config, ConfigLoader, ServerConfig, StoreConfig};
pub use error::{ConfigError, JournalError, StoreError, StoreResult};
pub use facade::{StoreFacade, UrlStore};
pub use journal::{LogWriter, RecordLog, RecordReader};
pub use proxy::{CacheProxy, CacheStats};
pub use store::{KvStore, RESERVED_KEYS};
pub use types::Record;
