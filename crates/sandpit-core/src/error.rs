use thiserror::Error;

/// Result type alias for sandpit operations
pub type Result<T> = std::result::Result<T, SandpitError>;

/// Default wait applied when the service rate-limits us without a
/// `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: f64 = 60.0;

/// Errors that can occur when talking to the sandbox API
#[derive(Error, Debug)]
pub enum SandpitError {
    /// Authentication failed - invalid or missing API key
    #[error("authentication failed: invalid API key")]
    Auth,

    /// Resource not found
    #[error("resource not found: {resource}")]
    NotFound {
        /// Description of the resource that wasn't found
        resource: String,
    },

    /// Rate limit exceeded, either locally or by the service
    #[error("rate limit exceeded, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, from the `Retry-After` header
        /// when the service supplied one
        retry_after: Option<f64>,
    },

    /// Server-side failure (5xx)
    #[error("server error ({code}): {message}")]
    Server {
        /// HTTP status code
        code: u16,
        /// Error message from the API
        message: String,
    },

    /// Local pre-flight validation failure; the request never left the process
    #[error("validation failed: {0}")]
    Validation(String),

    /// Response body was not the structured format the API promises
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// All retry attempts were exhausted on a transient error
    #[error("gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Total attempts made, including the first
        attempts: u32,
        /// The last error observed before giving up
        source: Box<SandpitError>,
    },

    /// API returned an error status outside the mapped set
    #[error("API error ({code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from the API
        message: String,
    },

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Request timed out
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// JSON serialization error on the request side
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid base URL or endpoint path
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl SandpitError {
    /// Returns true if the error is transient and worth retrying.
    ///
    /// Auth, not-found, validation and malformed-response failures are
    /// structural: repeating the identical request cannot succeed, so the
    /// retry engine surfaces them on first occurrence.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Server { .. }
                | Self::Api { .. }
                | Self::Http(_)
                | Self::Timeout(_)
        )
    }

    /// Returns true if the error is due to authentication
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth)
    }

    /// Returns the HTTP status code if the error originated from a response
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Server { code, .. } | Self::Api { code, .. } => Some(*code),
            Self::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Returns the server-supplied retry hint in seconds, if any
    #[must_use]
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::RetryExhausted { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Classify an HTTP error response into the taxonomy.
    ///
    /// `retry_after` is the parsed `Retry-After` header value, when present;
    /// a 429 without one falls back to [`DEFAULT_RETRY_AFTER_SECS`].
    #[must_use]
    pub fn from_status(status: u16, message: String, retry_after: Option<f64>) -> Self {
        match status {
            401 => Self::Auth,
            404 => Self::NotFound { resource: message },
            429 => Self::RateLimited {
                retry_after: Some(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
            },
            500..=599 => Self::Server {
                code: status,
                message,
            },
            _ => Self::Api {
                code: status,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            SandpitError::from_status(401, String::new(), None),
            SandpitError::Auth
        ));
        assert!(matches!(
            SandpitError::from_status(404, "task".into(), None),
            SandpitError::NotFound { .. }
        ));
        assert!(matches!(
            SandpitError::from_status(503, "oops".into(), None),
            SandpitError::Server { code: 503, .. }
        ));
        assert!(matches!(
            SandpitError::from_status(418, "teapot".into(), None),
            SandpitError::Api { code: 418, .. }
        ));
    }

    #[test]
    fn test_rate_limit_retry_after_default() {
        let err = SandpitError::from_status(429, String::new(), None);
        assert_eq!(err.retry_after(), Some(DEFAULT_RETRY_AFTER_SECS));

        let err = SandpitError::from_status(429, String::new(), Some(2.5));
        assert_eq!(err.retry_after(), Some(2.5));
    }

    #[test]
    fn test_retryable_classes() {
        assert!(SandpitError::from_status(500, String::new(), None).is_retryable());
        assert!(SandpitError::from_status(429, String::new(), None).is_retryable());
        assert!(SandpitError::Http("reset".into()).is_retryable());
        assert!(!SandpitError::Auth.is_retryable());
        assert!(!SandpitError::Validation("bad".into()).is_retryable());
        assert!(!SandpitError::MalformedResponse("not json".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_preserves_source() {
        let err = SandpitError::RetryExhausted {
            attempts: 3,
            source: Box::new(SandpitError::Server {
                code: 502,
                message: "bad gateway".into(),
            }),
        };
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("3 attempts"));
    }
}
