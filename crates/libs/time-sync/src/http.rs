//! HTTP capability used by the resolver
//!
//! Time source resolution only needs a plain request/response exchange:
//! GET or HEAD, then status, headers and body text. [`HttpClient`] is that
//! boundary, so the player can plug in its own transport (and tests a
//! scripted one). [`ReqwestHttpClient`] is the default implementation.

use async_trait::async_trait;

/// Request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET, body is read
    Get,
    /// HEAD, only status and headers
    Head,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Head => write!(f, "HEAD"),
        }
    }
}

/// A single outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request verb
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
}

impl HttpRequest {
    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
        }
    }

    /// HEAD request
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Head,
            url: url.into(),
        }
    }
}

/// A completed response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Header name/value pairs, in received order
    pub headers: Vec<(String, String)>,
    /// Body decoded as text (empty for HEAD)
    pub body: String,
}

impl HttpResponse {
    /// Response with a status code and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// URL unparsable or not http(s)
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connection, TLS or protocol failure
    #[error("request failed: {0}")]
    Transport(String),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Request/response capability
///
/// Implementations must be Send + Sync; one request is issued per resolver
/// attempt and no connection state is assumed between them.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform the request and return the response, whatever its status
    ///
    /// Only transport-level problems are errors; a 404 is a response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client with default settings
    ///
    /// Redirects are followed; no overall timeout is set here because the
    /// resolver bounds every attempt itself.
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = url::Url::parse(&request.url).map_err(|e| HttpError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl {
                url: request.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url.as_str()),
            HttpMethod::Head => self.client.head(url.as_str()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = match request.method {
            HttpMethod::Head => String::new(),
            HttpMethod::Get => response
                .text()
                .await
                .map_err(|e| HttpError::Body(e.to_string()))?,
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
