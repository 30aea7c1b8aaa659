//! HTTP transport for page and listing fetches.
//!
//! The transport owns connection reuse, timeouts, optional proxy routing and
//! User-Agent selection; everything above it only sees the
//! [`PageFetcher`] contract: a locator in, bytes or a classified error out.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;

/// Connect timeout for all requests (seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-attempt read timeout (seconds). Feeds the retry engine's transient
/// classification when exceeded.
const READ_TIMEOUT_SECS: u64 = 120;

/// Browser User-Agents rotated per client instance.
///
/// Content CDNs tend to reject clients that do not look like a browser.
const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.1; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Bytes plus server-reported content type for one fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// The response body.
    pub bytes: Vec<u8>,
    /// Content-Type header value, if the server sent one.
    pub content_type: Option<String>,
}

/// One network fetch: locator in, bytes or classified error out.
///
/// The orchestrator and retry engine depend on this trait rather than on a
/// concrete HTTP client, which keeps the scheduling logic testable with stub
/// transports.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs a single fetch attempt for `locator`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] carrying enough context for classification
    /// (status code, Retry-After header, timeout vs network failure).
    async fn fetch(&self, locator: &str) -> Result<FetchedPage, FetchError>;
}

/// Reqwest-backed transport with connection pooling.
///
/// Created once per run and shared by every page task.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts and no proxy.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_proxy(None).expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client routing through `proxy` when supplied.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when the proxy endpoint is not a
    /// valid URL.
    pub fn with_proxy(proxy: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = builder_with_defaults();

        if let Some(endpoint) = proxy {
            let proxy =
                Proxy::all(endpoint).map_err(|_| FetchError::invalid_url(endpoint))?;
            builder = builder.proxy(proxy);
            debug!(proxy = endpoint, "routing requests through proxy");
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::network("client construction", e))?;

        Ok(Self { client })
    }

    /// Validates `locator` and performs one GET, streaming the body into
    /// memory.
    #[instrument(skip(self), fields(url = %locator))]
    async fn get_bytes(&self, locator: &str) -> Result<FetchedPage, FetchError> {
        let url = Url::parse(locator).map_err(|_| FetchError::invalid_url(locator))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(locator)
            } else {
                FetchError::network(locator, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::http_status_with_retry_after(
                locator,
                status.as_u16(),
                retry_after,
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Stream the body so a slow chunk still trips the read timeout
        // instead of hanging a whole-body read.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    FetchError::timeout(locator)
                } else {
                    FetchError::network(locator, e)
                }
            })?;
            bytes.extend_from_slice(&chunk);
        }

        debug!(bytes = bytes.len(), content_type, "fetched resource");

        Ok(FetchedPage {
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, locator: &str) -> Result<FetchedPage, FetchError> {
        self.get_bytes(locator).await
    }
}

/// Builder with the timeouts and headers every client variant shares.
fn builder_with_defaults() -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .gzip(true)
        .user_agent(pick_user_agent())
}

/// Picks a browser User-Agent at random for this client instance.
fn pick_user_agent() -> &'static str {
    use rand::seq::SliceRandom;
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}
