//! Pluggable response cache.
//!
//! Caching is a best-effort accelerator, never a correctness dependency:
//! backend failures are logged and degrade to a miss, and a disabled cache
//! behaves as permanently empty so call sites keep a single code path.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

/// Storage contract shared by every backend.
///
/// All operations are atomic per key; there is no cross-key transaction.
/// A `ttl` of `None` means the entry never expires. Implementations must
/// swallow their own infrastructure failures (reporting a miss) rather
/// than surface them to the caller.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value, or `None` when absent or expired
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value, overwriting any previous entry for the key
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str);

    /// Whether a live (non-expired) entry exists for the key
    async fn exists(&self, key: &str) -> bool;
}

/// In-memory backend: a mutex-guarded map with lazy expiry.
///
/// Expired entries are dropped when observed, not swept proactively.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemoryCache {
    /// Create an empty in-memory cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(key) {
            Some((_, Some(expiry))) if Instant::now() > *expiry => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expiry = ttl.map(|t| Instant::now() + t);
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), (value, expiry));
    }

    async fn delete(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }
}

/// Backend that stores nothing and finds nothing
#[derive(Debug, Default)]
pub struct NoCache;

#[async_trait]
impl CacheBackend for NoCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) {}

    async fn delete(&self, _key: &str) {}

    async fn exists(&self, _key: &str) -> bool {
        false
    }
}

/// Redis-backed cache for sharing entries across processes.
///
/// Connection handling is this backend's concern; the client core only
/// sees the four-method contract. Every Redis failure degrades to a miss.
#[cfg(feature = "redis-cache")]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis-cache")]
impl RedisCache {
    /// Connect to a Redis instance by URL, e.g. `redis://127.0.0.1/`
    ///
    /// # Errors
    ///
    /// Returns the underlying connection error; an unreachable store at
    /// construction time is a configuration problem, unlike failures on
    /// the hot path which degrade silently.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[cfg(feature = "redis-cache")]
#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        let raw: redis::RedisResult<Option<String>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match raw {
            Ok(Some(s)) => serde_json::from_str(&s).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "redis get failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut conn = self.conn.clone();
        let payload = value.to_string();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        if let Err(e) = cmd.query_async::<()>(&mut conn).await {
            tracing::warn!(key, error = %e, "redis set failed, entry dropped");
        }
    }

    async fn delete(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
        {
            tracing::warn!(key, error = %e, "redis delete failed");
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map(|n| n > 0)
            .unwrap_or(false)
    }
}

/// Cache front-end applying the enabled flag, namespace prefix and
/// default TTL on top of whichever backend was configured
pub struct Cache {
    backend: Box<dyn CacheBackend>,
    enabled: bool,
    prefix: String,
    default_ttl: Duration,
}

impl Cache {
    /// Wrap a backend
    #[must_use]
    pub fn new(
        backend: Box<dyn CacheBackend>,
        enabled: bool,
        prefix: impl Into<String>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            enabled,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Fetch a value; always a miss when the cache is disabled
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let hit = self.backend.get(&self.namespaced(key)).await;
        debug!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Store a value under the configured default TTL when `ttl` is `None`;
    /// a no-op when the cache is disabled
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }
        self.backend
            .set(
                &self.namespaced(key),
                value,
                Some(ttl.unwrap_or(self.default_ttl)),
            )
            .await;
    }

    /// Remove a key; a no-op when the cache is disabled
    pub async fn delete(&self, key: &str) {
        if !self.enabled {
            return;
        }
        self.backend.delete(&self.namespaced(key)).await;
    }

    /// Whether a live entry exists; always false when the cache is disabled
    pub async fn exists(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.backend.exists(&self.namespaced(key)).await
    }
}

/// Deterministic key for one logical request: operation identifier joined
/// with its ordered argument values, so identical requests collide
#[must_use]
pub fn cache_key(operation: &str, args: &[&str]) -> String {
    if args.is_empty() {
        operation.to_string()
    } else {
        format!("{operation}:{}", args.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enabled_cache() -> Cache {
        Cache::new(
            Box::new(MemoryCache::new()),
            true,
            "test:",
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = enabled_cache();
        cache.set("k", json!({"a": 1}), None).await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));
        assert!(cache.exists("k").await);
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let cache = enabled_cache();
        cache.set("k", json!(1), None).await;
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_is_lazy() {
        let backend = MemoryCache::new();
        backend
            .set("k", json!("v"), Some(Duration::from_secs(5)))
            .await;
        assert_eq!(backend.get("k").await, Some(json!("v")));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(backend.get("k").await, None);
        assert!(!backend.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ttl_never_expires() {
        let backend = MemoryCache::new();
        backend.set("k", json!("v"), None).await;
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(backend.get("k").await, Some(json!("v")));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let backend = MemoryCache::new();
        backend.set("k", json!(1), None).await;
        backend.set("k", json!(2), None).await;
        assert_eq!(backend.get("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_disabled_cache_is_empty() {
        let cache = Cache::new(
            Box::new(MemoryCache::new()),
            false,
            "test:",
            Duration::from_secs(300),
        );
        cache.set("k", json!(1), None).await;
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test]
    async fn test_no_cache_backend() {
        let backend = NoCache;
        backend.set("k", json!(1), None).await;
        assert_eq!(backend.get("k").await, None);
        assert!(!backend.exists("k").await);
    }

    #[tokio::test]
    async fn test_prefix_namespacing() {
        let backend = std::sync::Arc::new(MemoryCache::new());

        struct Shared(std::sync::Arc<MemoryCache>);

        #[async_trait]
        impl CacheBackend for Shared {
            async fn get(&self, key: &str) -> Option<Value> {
                self.0.get(key).await
            }
            async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
                self.0.set(key, value, ttl).await;
            }
            async fn delete(&self, key: &str) {
                self.0.delete(key).await;
            }
            async fn exists(&self, key: &str) -> bool {
                self.0.exists(key).await
            }
        }

        let cache = Cache::new(
            Box::new(Shared(std::sync::Arc::clone(&backend))),
            true,
            "ns:",
            Duration::from_secs(60),
        );
        cache.set("k", json!(1), None).await;
        assert_eq!(backend.get("ns:k").await, Some(json!(1)));
        assert_eq!(backend.get("k").await, None);
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        assert_eq!(cache_key("environment", &[]), "environment");
        assert_eq!(
            cache_key("get_analysis", &["abc-123"]),
            "get_analysis:abc-123"
        );
        assert_eq!(
            cache_key("list", &["0", "25", "false"]),
            "list:0:25:false"
        );
    }
}
