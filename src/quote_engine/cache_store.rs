// Durable Cache Store
//
// Key/value store with per-entry TTL, shared across requests on one node.
// Entries are write-once within their TTL: reads never extend expiry, and an
// expired-but-present entry is indistinguishable from a miss. Concurrent
// writers to the same key are last-write-wins.

use axum::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::quote_engine::error::QEResult;

/// TTL-based key/value store used for scenario and precomputed-table caches
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a value. Expired entries report a miss.
    async fn get(&self, key: &str) -> QEResult<Option<String>>;

    /// Store a value under a fixed TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> QEResult<()>;

    /// Remove a single entry
    async fn delete(&self, key: &str) -> QEResult<()>;

    /// Remove every entry whose key starts with the prefix
    ///
    /// Bulk form of the invalidation hook; used when a product's price or
    /// capacity configuration changes.
    async fn delete_prefix(&self, prefix: &str) -> QEResult<()>;
}

/// Redis-backed cache store for production use
///
/// Relies on Redis for expiry and atomicity; the engine performs no
/// in-process locking around it.
pub struct RedisCacheStore {
    connection: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    /// Connect to Redis and wrap the connection in a reconnecting manager
    pub async fn connect(redis_url: &str) -> QEResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = redis::aio::ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache store");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> QEResult<Option<String>> {
        let mut con = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> QEResult<()> {
        let mut con = self.connection.clone();
        // EX requires at least 1 second
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> QEResult<()> {
        let mut con = self.connection.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> QEResult<()> {
        let mut con = self.connection.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut con)
                .await?;

            if !keys.is_empty() {
                let mut del = redis::cmd("DEL");
                for key in &keys {
                    del.arg(key);
                }
                del.query_async::<_, ()>(&mut con).await?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}

/// In-memory cache store
///
/// Same contract as the Redis backend, including strict expiry on read.
/// Used as the test double and as a single-process fallback.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

struct StoredEntry {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub async fn live_entries(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> QEResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired entry: drop it so the map does not grow unbounded
        let mut entries = self.entries.write().await;
        if entries.get(key).map(|e| e.is_expired()).unwrap_or(false) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> QEResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                stored_at: Instant::now(),
                ttl: ttl.max(Duration::from_secs(1)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> QEResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> QEResult<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
