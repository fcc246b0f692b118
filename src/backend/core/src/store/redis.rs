//! Redis-backed state store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::StateStore;
use crate::error::{ErrorCode, ProvenanceError, Result};

/// Atomically replace KEYS[1] with ARGV[2] when it currently equals ARGV[1].
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

/// A state store over a single Redis connection manager.
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
    cas: redis::Script,
    closed: AtomicBool,
}

impl RedisStore {
    /// Connect and verify the server answers PING.
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ProvenanceError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        let mut conn = ConnectionManager::new(client).await.map_err(|e| {
            ProvenanceError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Failed to connect to Redis",
                e.to_string(),
            )
        })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            ProvenanceError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Redis ping failed",
                e.to_string(),
            )
        })?;

        info!(url = %url, key_prefix = %key_prefix, "Redis state store connected");

        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
            cas: redis::Script::new(COMPARE_AND_SET),
            closed: AtomicBool::new(false),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn conn(&self) -> Result<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProvenanceError::persistence("redis store is closed"));
        }
        Ok(self.conn.clone())
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = conn
            .get(self.full_key(key))
            .await
            .map_err(ProvenanceError::from)?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn()?;
        conn.set::<_, _, ()>(self.full_key(key), value)
            .await
            .map_err(ProvenanceError::from)
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn()?;
        let applied: bool = conn
            .set_nx(self.full_key(key), value)
            .await
            .map_err(ProvenanceError::from)?;
        if !applied {
            debug!(key = %key, "put_if_absent rejected, key exists");
        }
        Ok(applied)
    }

    async fn compare_and_put(&self, key: &str, expected: &[u8], value: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn()?;
        let applied: i32 = self
            .cas
            .key(self.full_key(key))
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(ProvenanceError::from)?;
        Ok(applied == 1)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        info!("Redis state store closed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("AMPROV_TEST_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_atomic_primitives_against_redis() {
        let prefix = format!("amprov-test:{}:", uuid::Uuid::new_v4());
        let store = RedisStore::connect(&redis_url(), &prefix).await.unwrap();

        assert!(store.put_if_absent("k", b"v1".to_vec()).await.unwrap());
        assert!(!store.put_if_absent("k", b"other".to_vec()).await.unwrap());

        assert!(!store.compare_and_put("k", b"stale", b"v2".to_vec()).await.unwrap());
        assert!(store.compare_and_put("k", b"v1", b"v2".to_vec()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));

        store.close().await.unwrap();
        assert!(store.get("k").await.is_err());
    }
}
