//! Key-value state store backing the ledger.
//!
//! The ledger only needs byte values under string keys plus two atomic
//! primitives: insert-if-absent for creation and compare-and-put for updates.
//! Two backends are provided:
//! - **InMemoryStore**: process-local, `DashMap`-based
//! - **RedisStore**: shared, one Redis key per ledger key

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;

/// Trait for state store backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the value under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Unconditionally write `value` under `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Write only if `key` is absent. Returns whether the write happened.
    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// Write only if the current value equals `expected`. Returns whether the
    /// write happened.
    async fn compare_and_put(&self, key: &str, expected: &[u8], value: Vec<u8>) -> Result<bool>;

    /// Release the store. Later operations fail with a persistence error.
    async fn close(&self) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Build the configured store.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn StateStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
    }
}
