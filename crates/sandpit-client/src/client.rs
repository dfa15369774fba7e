//! Main sandbox API client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as HttpClient, Method};
use sandpit_core::{
    CacheBackendKind, ClientConfig, Result, SandpitError,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{AnalysisApi, EnvironmentApi, UserApi};
use crate::cache::{Cache, CacheBackend, MemoryCache, NoCache};
use crate::limit::{RateLimiter, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::stream::SseStream;

/// API version prefix for every endpoint path
const API_VERSION: &str = "/v1";

/// Request body for an outbound operation
pub(crate) enum Body {
    /// No body
    None,
    /// URL-encoded form fields
    Form(Vec<(&'static str, String)>),
    /// Multipart form with one file part plus plain fields
    Multipart {
        /// Plain form fields
        fields: Vec<(&'static str, String)>,
        /// Filename reported for the file part
        filename: String,
        /// File content
        content: Vec<u8>,
    },
}

/// Everything the executor needs to know about one outbound call
pub(crate) struct Operation {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Body,
    /// Rate-limit bucket this call draws from
    pub bucket: &'static str,
    /// Cache identity for read operations; `None` means never cached
    pub cache_id: Option<(&'static str, Vec<String>)>,
}

impl Operation {
    pub(crate) fn get(path: impl Into<String>, bucket: &'static str) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: Body::None,
            bucket,
            cache_id: None,
        }
    }

    pub(crate) fn post(path: impl Into<String>, bucket: &'static str, body: Body) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body,
            bucket,
            cache_id: None,
        }
    }

    pub(crate) fn delete(path: impl Into<String>, bucket: &'static str) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            query: Vec::new(),
            body: Body::None,
            bucket,
            cache_id: None,
        }
    }

    pub(crate) fn query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    /// Mark the operation cacheable under `(name, args)`. Only meaningful
    /// for reads; mutations must never set this.
    pub(crate) fn cached(mut self, name: &'static str, args: Vec<String>) -> Self {
        self.cache_id = Some((name, args));
        self
    }
}

/// Async client for the sandbox analysis service.
///
/// Cheap to clone; all clones share the HTTP connection pool, the response
/// cache and the rate-limit buckets. The pool is released once the last
/// clone is dropped, and in-flight calls keep the shared state alive, so
/// there is no close-while-in-use race to manage.
#[derive(Clone)]
pub struct SandpitClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    config: ClientConfig,
    cache: Cache,
    retry: RetryPolicy,
    registry: RateLimiterRegistry,
}

impl SandpitClient {
    /// Create a client with default settings for the given API key
    ///
    /// # Errors
    ///
    /// Returns [`SandpitError::Config`] if the HTTP transport cannot be
    /// constructed from the configuration.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        SandpitClientBuilder::new(api_key).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> SandpitClientBuilder {
        SandpitClientBuilder::new(api_key)
    }

    /// Access analysis submission and lifecycle endpoints
    #[must_use]
    pub fn analysis(&self) -> AnalysisApi<'_> {
        AnalysisApi::new(self)
    }

    /// Access the guest environment catalog
    #[must_use]
    pub fn environment(&self) -> EnvironmentApi<'_> {
        EnvironmentApi::new(self)
    }

    /// Access account endpoints
    #[must_use]
    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Drop a cached response by its operation identity.
    pub(crate) async fn invalidate(&self, name: &str, args: &[&str]) {
        self.inner
            .cache
            .delete(&crate::cache::cache_key(name, args))
            .await;
    }

    fn limiter(&self, bucket: &'static str) -> RateLimiter {
        let rl = &self.inner.config.rate_limit;
        self.inner.registry.limiter(bucket, rl.rate, rl.burst())
    }

    /// Run one logical operation through the full pipeline:
    /// cache lookup, rate-limit gate, transport call under the retry
    /// policy, classification, cache store.
    ///
    /// Cache lookup deliberately precedes rate-limit acquisition so a hit
    /// consumes no token; under heavy cache-hit load the limiter only sees
    /// traffic that actually goes out.
    pub(crate) async fn execute<T: DeserializeOwned>(&self, op: Operation) -> Result<T> {
        let cache_key = op
            .cache_id
            .as_ref()
            .map(|(name, args)| {
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                crate::cache::cache_key(name, &refs)
            });

        if let Some(key) = &cache_key {
            if let Some(hit) = self.inner.cache.get(key).await {
                return serde_json::from_value(hit)
                    .map_err(|e| SandpitError::MalformedResponse(e.to_string()));
            }
        }

        if self.inner.config.rate_limit.enabled {
            self.limiter(op.bucket).acquire().await;
        }

        let raw = self.inner.retry.run(|| self.send_once(&op)).await?;

        // Store before handing the payload to the caller; a cancelled call
        // never reaches this point, so no partial response is ever cached.
        if let Some(key) = &cache_key {
            self.inner.cache.set(key, raw.clone(), None).await;
        }

        serde_json::from_value(raw).map_err(|e| SandpitError::MalformedResponse(e.to_string()))
    }

    /// Open a server-sent-events stream for the given path.
    ///
    /// Streams are never cached; the retry policy applies to establishing
    /// the connection only, not to individual events.
    pub(crate) async fn execute_stream<T: DeserializeOwned>(
        &self,
        path: String,
        bucket: &'static str,
    ) -> Result<SseStream<T>> {
        if self.inner.config.rate_limit.enabled {
            self.limiter(bucket).acquire().await;
        }

        let response = self
            .inner
            .retry
            .run(|| async {
                let url = self.endpoint(&path);
                debug!(url = %url, "open SSE stream");
                let response = self
                    .inner
                    .http
                    .get(&url)
                    .header("Accept", "text/event-stream")
                    // the feed is long-lived; override the per-request timeout
                    .timeout(Duration::from_secs(24 * 60 * 60))
                    .send()
                    .await
                    .map_err(|e| transport_error(&e, self.inner.config.timeout))?;

                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    let retry_after = response_retry_after(&response);
                    let body = response.text().await.unwrap_or_default();
                    Err(classify_failure(status.as_u16(), &retry_after, body))
                }
            })
            .await?;

        Ok(SseStream::new(response.bytes_stream()))
    }

    /// One transport attempt: send, classify, parse the envelope
    async fn send_once(&self, op: &Operation) -> Result<Value> {
        let url = self.endpoint(&op.path);
        debug!(method = %op.method, url = %url, bucket = op.bucket, "dispatch");

        let mut request = self.inner.http.request(op.method.clone(), &url);
        if !op.query.is_empty() {
            request = request.query(&op.query);
        }
        request = match &op.body {
            Body::None => request,
            Body::Form(fields) => request.form(fields),
            Body::Multipart {
                fields,
                filename,
                content,
            } => {
                let mut form = reqwest::multipart::Form::new();
                for (k, v) in fields {
                    form = form.text(*k, v.clone());
                }
                form = form.part(
                    "file",
                    reqwest::multipart::Part::bytes(content.clone())
                        .file_name(filename.clone()),
                );
                request.multipart(form)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, self.inner.config.timeout))?;

        let status = response.status();
        let retry_after = response_retry_after(&response);
        let body = response
            .text()
            .await
            .map_err(|e| SandpitError::Http(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                SandpitError::MalformedResponse(format!("invalid JSON response: {e}"))
            })
        } else {
            Err(classify_failure(status.as_u16(), &retry_after, body))
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{API_VERSION}{path}",
            self.inner.config.base_url.trim_end_matches('/')
        )
    }
}

/// Map a reqwest failure onto the transport part of the taxonomy
fn transport_error(err: &reqwest::Error, timeout: Duration) -> SandpitError {
    if err.is_timeout() {
        SandpitError::Timeout(timeout.as_secs())
    } else {
        SandpitError::Http(err.to_string())
    }
}

/// Pull the `Retry-After` header value in seconds, if present and numeric
fn response_retry_after(response: &reqwest::Response) -> Option<f64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
}

/// Classify a non-success response. The service reports a `message` field
/// in its error envelope; fall back to the raw body when it is absent.
fn classify_failure(status: u16, retry_after: &Option<f64>, body: String) -> SandpitError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body);

    if status == 429 {
        warn!(retry_after = ?retry_after, "rate limited by the service");
    }
    SandpitError::from_status(status, message, *retry_after)
}

/// Builder for configuring a [`SandpitClient`]
pub struct SandpitClientBuilder {
    config: ClientConfig,
    cache_backend: Option<Box<dyn CacheBackend>>,
    registry: Option<RateLimiterRegistry>,
}

impl SandpitClientBuilder {
    /// Create a new builder with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(api_key),
            cache_backend: None,
            registry: None,
        }
    }

    /// Set the base URL (useful for testing)
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the per-attempt request timeout.
    ///
    /// Note that retries compound: `max_attempts` attempts at this timeout
    /// may block the caller for `attempts * timeout` plus backoff delays.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Disable TLS certificate verification (for test rigs only)
    #[must_use]
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.config.verify_tls = false;
        self
    }

    /// Route requests through an HTTP/HTTPS proxy
    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.config.proxy = Some(url.into());
        self
    }

    /// Attach an extra header to every request
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Replace the cache configuration
    #[must_use]
    pub fn cache(mut self, cache: sandpit_core::CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Inject a custom cache backend, overriding the configured kind.
    ///
    /// This is how a pre-connected [`crate::cache::RedisCache`] is wired in.
    #[must_use]
    pub fn cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Replace the rate-limit configuration
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: sandpit_core::RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Share a rate-limiter registry with other clients, or inject a fresh
    /// one for test isolation. Defaults to a registry private to this
    /// client and its clones.
    #[must_use]
    pub fn rate_limiter_registry(mut self, registry: RateLimiterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the retry configuration
    #[must_use]
    pub fn retry(mut self, retry: sandpit_core::RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`SandpitError::Config`] for an invalid proxy URL, an HTTP
    /// transport that cannot be constructed, or a Redis cache backend
    /// selected without injecting a connected [`crate::cache::RedisCache`]
    /// via [`Self::cache_backend`].
    pub fn build(self) -> Result<SandpitClient> {
        let config = self.config;

        let mut default_headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!(
            "API-Key {}",
            config.api_key
        ))
        .map_err(|e| SandpitError::Config(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        default_headers.insert(reqwest::header::AUTHORIZATION, auth);
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SandpitError::Config(format!("invalid header name {name}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| SandpitError::Config(format!("invalid header value: {e}")))?;
            default_headers.insert(name, value);
        }

        let mut http = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(default_headers)
            .gzip(true);
        if !config.verify_tls {
            http = http.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &config.proxy {
            http = http.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| SandpitError::Config(format!("invalid proxy URL: {e}")))?,
            );
        }
        let http = http
            .build()
            .map_err(|e| SandpitError::Config(format!("failed to build HTTP client: {e}")))?;

        let backend: Box<dyn CacheBackend> = match (self.cache_backend, config.cache.backend) {
            (Some(backend), _) => backend,
            (None, CacheBackendKind::Memory) => Box::new(MemoryCache::new()),
            (None, CacheBackendKind::None) => Box::new(NoCache),
            (None, CacheBackendKind::Redis) => {
                return Err(SandpitError::Config(
                    "redis cache backend requires a connected RedisCache via cache_backend()"
                        .into(),
                ))
            }
        };
        let cache = Cache::new(
            backend,
            config.cache.enabled,
            config.cache.prefix.clone(),
            config.cache.ttl,
        );

        Ok(SandpitClient {
            inner: Arc::new(ClientInner {
                http,
                cache,
                retry: RetryPolicy::new(config.retry.clone()),
                registry: self.registry.unwrap_or_default(),
                config,
            }),
        })
    }
}
