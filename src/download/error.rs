//! Error types and failure classification for page fetches.
//!
//! Every network attempt resolves to either bytes or a [`FetchError`]; the
//! retry engine only ever sees the classified [`FailureKind`], which decides
//! whether another attempt can help.

use thiserror::Error;

/// Errors that can occur fetching a single resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The provided locator is not a usable URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error carrying a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the Retry-After header carried by a 429 response, if any.
    #[must_use]
    pub fn retry_after_header(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

/// Classification of a fetch failure for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 410 Gone, invalid URL, TLS misconfiguration.
    Permanent,

    /// Server rate limiting (HTTP 429); retryable with a mandatory delay.
    RateLimited,
}

/// Classifies a fetch error into a failure kind.
///
/// # HTTP Status Code Classification
///
/// | Status | Kind | Rationale |
/// |--------|------|-----------|
/// | 400 | Permanent | Bad request - won't succeed on retry |
/// | 401/403 | Permanent | No auth flow to satisfy the server |
/// | 404 | Permanent | Not found - resource doesn't exist |
/// | 408 | Transient | Request timeout - may succeed |
/// | 410 | Permanent | Gone - permanently removed |
/// | 429 | RateLimited | Too many requests - retry with delay |
/// | 5xx | Transient | Server-side, may be temporary |
///
/// Timeouts and most network errors are transient; TLS/certificate errors
/// and malformed URLs are permanent.
#[must_use]
pub fn classify_fetch_error(error: &FetchError) -> FailureKind {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),

        FetchError::Timeout { .. } => FailureKind::Transient,

        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureKind::Permanent
            } else {
                FailureKind::Transient
            }
        }

        FetchError::InvalidUrl { .. } => FailureKind::Permanent,
    }
}

/// Classifies an HTTP status code into a failure kind.
fn classify_http_status(status: u16) -> FailureKind {
    match status {
        408 => FailureKind::Transient,   // Request Timeout
        429 => FailureKind::RateLimited, // Too Many Requests

        // Other 4xx are permanent (no auth flow here, so 401/403 included)
        status if (400..500).contains(&status) => FailureKind::Permanent,

        // 5xx are transient
        status if (500..600).contains(&status) => FailureKind::Transient,

        // Anything else is unexpected, treat as permanent
        _ => FailureKind::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}
