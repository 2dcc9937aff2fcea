//! Suggestion cache: Redis first, bounded in-process LRU as the degraded path.
//!
//! The cache is a best-effort accelerator. Every failure of the external store
//! is logged and downgraded to a miss (on read) or to a local write (on write);
//! callers never see an error.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::suggest::field::FieldKind;
use crate::suggest::models::{CacheEntry, SuggestionContext};

const KEY_PREFIX: &str = "resume:autocomplete";
/// Only this many characters of the serialized context take part in the key.
const CONTEXT_FINGERPRINT_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote cache skipped after a recent failure")]
    Unavailable,

    #[error("Cache entry decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Derives the fingerprint for `(field, query, context)`.
///
/// The query is trimmed and lowercased; the context contributes the first
/// 50 characters of its JSON serialization (object keys are sorted, so equal
/// maps give equal keys).
pub fn cache_key(field: FieldKind, query: &str, context: &SuggestionContext) -> String {
    let serialized = serde_json::to_string(context).unwrap_or_default();
    let fingerprint: String = serialized.chars().take(CONTEXT_FINGERPRINT_CHARS).collect();
    format!(
        "{KEY_PREFIX}:{field}:{}:{fingerprint}",
        query.trim().to_lowercase()
    )
}

// ────────────────────────────────────────────────────────────────────────────
// External key-value store
// ────────────────────────────────────────────────────────────────────────────

/// Minimal contract of an external key-value cache client.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;
}

/// How long a failed Redis is skipped before the next connection attempt.
pub const DEFAULT_REDIS_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Redis-backed store. The multiplexed connection is opened lazily with the
/// client's own connect and response timeouts. After any failure the
/// connection is dropped and Redis is skipped for `retry_after`, so an
/// unreachable server costs at most one timeout per window.
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
    retry_after: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
    down_until: Mutex<Option<Instant>>,
}

impl RedisStore {
    pub fn new(client: redis::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            retry_after: DEFAULT_REDIS_RETRY_AFTER,
            connection: Mutex::new(None),
            down_until: Mutex::new(None),
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let existing = self.connection.lock().await.clone();
        if let Some(conn) = existing {
            return Ok(conn);
        }

        let down_until = *self.down_until.lock().await;
        if let Some(until) = down_until {
            if Instant::now() < until {
                return Err(CacheError::Unavailable);
            }
        }

        // No lock is held here: concurrent callers connect side by side and
        // the last one to finish is kept.
        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(self.timeout, self.timeout)
            .await;
        let conn = match conn {
            Ok(conn) => conn,
            Err(e) => return Err(self.fail(self.classify(e)).await),
        };

        *self.down_until.lock().await = None;
        *self.connection.lock().await = Some(conn.clone());
        Ok(conn)
    }

    fn classify(&self, e: redis::RedisError) -> CacheError {
        if e.is_timeout() {
            CacheError::Timeout(self.timeout)
        } else {
            CacheError::Redis(e)
        }
    }

    /// Drops the connection and starts the retry window.
    async fn fail(&self, error: CacheError) -> CacheError {
        *self.connection.lock().await = None;
        *self.down_until.lock().await = Some(Instant::now() + self.retry_after);
        error
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        match tokio::time::timeout(self.timeout, conn.get::<_, Option<String>>(key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.fail(self.classify(e)).await),
            Err(_) => Err(self.fail(CacheError::Timeout(self.timeout)).await),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let write = conn.set_ex::<_, _, ()>(key, value, ttl_secs);
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.fail(self.classify(e)).await),
            Err(_) => Err(self.fail(CacheError::Timeout(self.timeout)).await),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process store
// ────────────────────────────────────────────────────────────────────────────

/// Bounded in-process store with least-recently-used eviction.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns a clone of the entry and marks it as most recently used.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn put(&self, entry: CacheEntry) {
        self.entries.lock().await.put(entry.key.clone(), entry);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tiered cache
// ────────────────────────────────────────────────────────────────────────────

pub struct SuggestionCache {
    remote: Option<Arc<dyn KeyValueStore>>,
    local: MemoryStore,
    ttl: Duration,
}

impl SuggestionCache {
    pub fn new(remote: Option<Arc<dyn KeyValueStore>>, local: MemoryStore, ttl: Duration) -> Self {
        Self { remote, local, ttl }
    }

    /// In-process only; used when no Redis URL is configured.
    pub fn local_only(local: MemoryStore, ttl: Duration) -> Self {
        Self::new(None, local, ttl)
    }

    pub async fn get(&self, key: &str) -> Option<Vec<String>> {
        if let Some(remote) = &self.remote {
            match self.get_remote(remote.as_ref(), key).await {
                Ok(Some(entry)) => return Some(entry.suggestions),
                Ok(None) => {}
                Err(e) => debug!("Remote cache read failed for {key}, treating as miss: {e}"),
            }
        }

        self.local
            .get(key)
            .await
            .filter(|entry| entry.is_fresh(self.ttl, Utc::now()))
            .map(|entry| entry.suggestions)
    }

    pub async fn set(&self, key: &str, suggestions: Vec<String>) {
        let entry = CacheEntry::new(key, suggestions);

        if let Some(remote) = &self.remote {
            match self.set_remote(remote.as_ref(), &entry).await {
                Ok(()) => return,
                Err(e) => debug!("Remote cache write failed for {key}, using memory cache: {e}"),
            }
        }

        self.local.put(entry).await;
    }

    async fn get_remote(
        &self,
        remote: &dyn KeyValueStore,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let Some(raw) = remote.get(key).await? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        Ok(entry.is_fresh(self.ttl, Utc::now()).then_some(entry))
    }

    async fn set_remote(
        &self,
        remote: &dyn KeyValueStore,
        entry: &CacheEntry,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(entry)?;
        // Redis rejects SET EX 0; the freshness check on read still applies.
        let ttl_secs = self.ttl.as_secs().max(1);
        remote.set_ex(&entry.key, &raw, ttl_secs).await
    }
}
