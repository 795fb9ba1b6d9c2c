//! Resolve one time source into a canonical timestamp
//!
//! The resolver is a leaf: it knows the per-scheme protocol and nothing
//! about fallback. Each call yields exactly one `Ok` or `Err`; a request that
//! outlives the timeout is turned into [`ResolveError::Timeout`].

use crate::date::{self, DateParseError};
use crate::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::source::{TimeSource, TimingScheme};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default per-request bound
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// A successfully resolved canonical time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    /// Canonical time at about the moment of measurement
    pub time: DateTime<Utc>,
}

/// Why a single source could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Scheme URI this crate cannot resolve
    #[error("unsupported time source scheme '{0}'")]
    UnsupportedScheme(String),

    /// The request never produced a response
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Transport failure
        #[source]
        source: HttpError,
    },

    /// Response status outside 2xx
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// No response within the request timeout
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Requested URL
        url: String,
        /// Bound that elapsed
        timeout_ms: u64,
    },

    /// HEAD response without a `Date` header
    #[error("response from {url} has no Date header")]
    MissingDateHeader {
        /// Requested URL
        url: String,
    },

    /// Body or header is not a timestamp
    #[error(transparent)]
    Parse(#[from] DateParseError),
}

impl ResolveError {
    /// Whether the failure was decided without any network I/O
    pub fn is_local(&self) -> bool {
        matches!(self, ResolveError::UnsupportedScheme(_))
    }
}

/// Resolves time sources over an injected [`HttpClient`]
#[derive(Clone)]
pub struct SourceResolver {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl SourceResolver {
    /// Create a resolver with the default request timeout
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Per-request timeout in whole milliseconds, saturating
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Resolve a single source
    pub async fn resolve(&self, source: &TimeSource) -> Result<ResolvedTime, ResolveError> {
        let time = match source.scheme() {
            TimingScheme::HttpXsDate => {
                let response = self.fetch(HttpRequest::get(&source.value)).await?;
                date::parse_xs_date(&response.body)?
            }
            TimingScheme::HttpIso => {
                let response = self.fetch(HttpRequest::get(&source.value)).await?;
                date::parse_iso8601(&response.body)?
            }
            TimingScheme::HttpHead => {
                let response = self.fetch(HttpRequest::head(&source.value)).await?;
                let header = response
                    .header("date")
                    .ok_or_else(|| ResolveError::MissingDateHeader {
                        url: source.value.clone(),
                    })?;
                date::parse_http_date(header)?
            }
            TimingScheme::Direct => date::parse_xs_date(&source.value)?,
            TimingScheme::Unsupported(uri) => return Err(ResolveError::UnsupportedScheme(uri)),
        };

        Ok(ResolvedTime { time })
    }

    /// Issue the request under the timeout and require a 2xx status
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, ResolveError> {
        let url = request.url.clone();
        debug!(method = %request.method, url = %url, "Requesting time source");

        let response = match tokio::time::timeout(self.timeout, self.http.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => return Err(ResolveError::Transport { url, source }),
            Err(_) => {
                return Err(ResolveError::Timeout {
                    url,
                    timeout_ms: self.timeout_ms(),
                })
            }
        };

        if !response.is_success() {
            return Err(ResolveError::Status {
                url,
                status: response.status,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
