//! Client configuration types.

use std::collections::HashMap;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cache TTL
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default cache key prefix
pub const DEFAULT_CACHE_PREFIX: &str = "sandpit:";

/// Default sustained request rate (tokens per second)
pub const DEFAULT_RATE_LIMIT: f64 = 10.0;

/// Default rate-limit window; burst capacity is `rate * window`
pub const DEFAULT_RATE_LIMIT_WINDOW: f64 = 1.0;

/// Top-level client configuration.
///
/// Immutable once the client is built; the cache, rate limiter and retry
/// policy are constructed from it and never observe later changes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key sent as `Authorization: API-Key <key>`
    pub api_key: String,

    /// Base URL of the service
    pub base_url: String,

    /// Per-request timeout. Applies to each transport attempt individually,
    /// not to a whole retry sequence.
    pub timeout: Duration,

    /// Whether to verify TLS certificates
    pub verify_tls: bool,

    /// Optional HTTP/HTTPS proxy URL
    pub proxy: Option<String>,

    /// Extra headers attached to every request
    pub headers: HashMap<String, String>,

    /// User-Agent header value
    pub user_agent: String,

    /// Response cache settings
    pub cache: CacheConfig,

    /// Client-side rate limiting settings
    pub rate_limit: RateLimitConfig,

    /// Retry policy settings
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.sandpit.io".to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
            proxy: None,
            headers: HashMap::new(),
            user_agent: concat!("sandpit-rust/", env!("CARGO_PKG_VERSION")).to_string(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Which cache backend the client should construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    /// Process-local in-memory map
    #[default]
    Memory,
    /// Networked key-value store (requires the `redis-cache` feature)
    Redis,
    /// No caching at all
    None,
}

/// Response cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled. A disabled cache behaves as permanently
    /// empty: reads miss, writes are dropped.
    pub enabled: bool,

    /// Backend selection
    pub backend: CacheBackendKind,

    /// Connection URL for the networked backend
    pub backend_url: Option<String>,

    /// Default TTL for entries written without an explicit TTL
    pub ttl: Duration,

    /// Namespace prefix prepended to every key
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            backend_url: None,
            ttl: DEFAULT_CACHE_TTL,
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }
}

/// Client-side rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,

    /// Sustained rate in tokens per second. Zero or negative disables
    /// limiting entirely.
    pub rate: f64,

    /// Accumulation window in seconds; burst capacity is `rate * window`
    pub window: f64,
}

impl RateLimitConfig {
    /// Maximum bucket capacity
    #[must_use]
    pub fn burst(&self) -> f64 {
        self.rate * self.window
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: DEFAULT_RATE_LIMIT,
            window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

/// Backoff growth strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Delay grows as `initial * factor^(attempt-1)`
    #[default]
    Exponential,
    /// Delay grows as `initial * attempt`
    Linear,
}

/// Retry policy configuration for transient failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Whether retries are enabled
    pub enabled: bool,

    /// Backoff growth strategy
    pub strategy: RetryStrategy,

    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Ceiling on any computed delay. A server-supplied `Retry-After` hint
    /// is honored as-is and is not clamped.
    pub max_delay: Duration,

    /// Multiplier for the exponential strategy
    pub backoff_factor: f64,

    /// Randomize each delay by a uniform factor in [0.5, 1.5] to avoid
    /// synchronized retry storms
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RetryStrategy::Exponential,
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set maximum attempts
    #[must_use]
    pub const fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the initial delay
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay ceiling
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy
    #[must_use]
    pub const fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}
