//! HTTP client abstraction for testability.

use std::future::Future;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default User-Agent string for HTTP requests.
/// The tile server rejects requests that don't look like a browser.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Errors from a single HTTP request.
///
/// The two variants matter to retry policy in different ways only at the
/// logging level: both are retried once at the batch level, but a
/// `Status` failure carries the upstream code.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpError {
    /// Upstream answered with a non-2xx status
    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },

    /// Connect, timeout or read failure before a full response arrived
    #[error("request failed: {0}")]
    Transport(String),
}

/// Trait for asynchronous HTTP GET operations.
///
/// Allows mock clients in tests; the real implementation is
/// [`ReqwestClient`].
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request, returning the full response body.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Real HTTP client backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default timeout.
    ///
    /// Tuned for many small tile requests: large idle pool, TCP
    /// keepalive and nodelay.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(64)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| HttpError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        trace!(url = url, "HTTP GET starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(HttpError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(HttpError::Status {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(HttpError::Transport(e.to_string()))
            }
        }
    }
}
