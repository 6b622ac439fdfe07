//! HTTP transport with an address guard and a streaming byte budget.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string, strip tracking parameters for result identity
//!
//! ### Safety Gates
//! - Resolve DNS and refuse private, loopback, link-local and CGNAT answers
//! - Redirects are never followed here. A 3xx comes back as a response with
//!   its `Location`, and the caller decides whether to take the next hop
//!   (see [`RawResponse::redirect_target`])
//! - Body budget enforced while streaming; the transfer is dropped as soon
//!   as the budget is exceeded
//!
//! The transport never consults robots.txt. Policy checks belong to
//! [`crate::policy::PolicyGate`], which sits in front of every fetch.

pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use ssrf::{SsrfError, check_host, validate_ip};
pub use url::{UrlError, canonicalize, result_url, strip_tracking};

use ::url::Url;
use sift_core::FetchError;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sift/0.1")
    pub user_agent: String,

    /// Transport-level request timeout (default: 10s)
    pub timeout: Duration,

    /// Refuse private and internal addresses (default: true)
    pub block_private_addresses: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sift/0.1".to_string(),
            timeout: Duration::from_millis(10_000),
            block_private_addresses: true,
        }
    }
}

/// Redirect hops a caller follows before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Raw response from a transport, for any HTTP status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The URL requested
    pub url: Url,
    pub status: u16,
    /// Location header of a redirect response
    pub location: Option<String>,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Body bytes; empty for non-2xx responses
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Absolute target of a redirect response, resolved against `url`.
    pub fn redirect_target(&self) -> Option<Url> {
        if !matches!(self.status, 301 | 302 | 303 | 307 | 308) {
            return None;
        }
        self.url.join(self.location.as_deref()?.trim()).ok()
    }
}

/// Fetch capability used by the content retriever and the policy gate.
///
/// Implementations return every HTTP status as a response and reserve
/// errors for transport failures, refused addresses and the byte budget.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<RawResponse, FetchError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::ConnectionFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn map_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::ConnectionFailed(err.to_string())
        }
    }
}

#[async_trait]
impl FetchTransport for HttpTransport {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<RawResponse, FetchError> {
        let start = Instant::now();

        if self.config.block_private_addresses {
            check_host(url).await.map_err(|e| match e {
                SsrfError::BlockedIp(_) => FetchError::Forbidden(e.to_string()),
                SsrfError::DnsError(msg) => FetchError::ConnectionFailed(msg),
            })?;
        }

        let mut response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,text/plain;q=0.8,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| self.map_error(&e))?;

        let status = response.status();
        let header_value =
            |name: header::HeaderName| response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        let content_type = header_value(header::CONTENT_TYPE);
        let location = header_value(header::LOCATION);

        let mut body = BytesMut::new();
        if status.is_success() {
            if let Some(len) = response.content_length()
                && len > max_bytes as u64
            {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }

            while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(&e))? {
                if body.len() + chunk.len() > max_bytes {
                    tracing::debug!(url = %url, limit = max_bytes, "byte budget exceeded, aborting transfer");
                    return Err(FetchError::TooLarge { limit: max_bytes });
                }
                body.extend_from_slice(&chunk);
            }
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms,
            "fetched"
        );

        Ok(RawResponse {
            url: url.clone(),
            status: status.as_u16(),
            location,
            content_type,
            body: body.freeze(),
            fetch_ms,
        })
    }
}
