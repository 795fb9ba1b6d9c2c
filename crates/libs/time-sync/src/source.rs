//! Time source descriptors
//!
//! A [`TimeSource`] is one `UTCTiming` entry from the manifest. Its scheme URI
//! decides how it is resolved; [`TimingScheme`] is the closed set of protocols
//! this crate knows, with [`TimingScheme::Unsupported`] for everything else so
//! an unknown scheme fails immediately instead of stalling the chain.

use serde::{Deserialize, Serialize};

/// Scheme URIs understood by the resolver
pub mod schemes {
    /// GET, body is an xs:dateTime
    pub const HTTP_XSDATE_2014: &str = "urn:mpeg:dash:utc:http-xsdate:2014";
    /// 2012 revision of [`HTTP_XSDATE_2014`]
    pub const HTTP_XSDATE_2012: &str = "urn:mpeg:dash:utc:http-xsdate:2012";
    /// GET, body is an ISO-8601 timestamp
    pub const HTTP_ISO_2014: &str = "urn:mpeg:dash:utc:http-iso:2014";
    /// 2012 revision of [`HTTP_ISO_2014`]
    pub const HTTP_ISO_2012: &str = "urn:mpeg:dash:utc:http-iso:2012";
    /// HEAD, time is the `Date` response header
    pub const HTTP_HEAD_2014: &str = "urn:mpeg:dash:utc:http-head:2014";
    /// 2012 revision of [`HTTP_HEAD_2014`]
    pub const HTTP_HEAD_2012: &str = "urn:mpeg:dash:utc:http-head:2012";
    /// The source value is the timestamp itself
    pub const DIRECT_2014: &str = "urn:mpeg:dash:utc:direct:2014";
    /// 2012 revision of [`DIRECT_2014`]
    pub const DIRECT_2012: &str = "urn:mpeg:dash:utc:direct:2012";
}

/// One candidate time source, as advertised by the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSource {
    /// Protocol identifier, e.g. `urn:mpeg:dash:utc:http-xsdate:2014`
    #[serde(rename = "schemeIdUri")]
    pub scheme_id_uri: String,
    /// URL to query, or the timestamp itself for the direct scheme
    pub value: String,
}

impl TimeSource {
    /// Create a time source
    pub fn new(scheme_id_uri: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme_id_uri: scheme_id_uri.into(),
            value: value.into(),
        }
    }

    /// Protocol this source is resolved with
    pub fn scheme(&self) -> TimingScheme {
        TimingScheme::from_uri(&self.scheme_id_uri)
    }
}

impl std::fmt::Display for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.scheme_id_uri, self.value)
    }
}

/// Resolution protocol for a time source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingScheme {
    /// GET, body holds an xs:dateTime (parsed leniently)
    HttpXsDate,
    /// GET, body holds an ISO-8601 timestamp
    HttpIso,
    /// HEAD, the `Date` response header holds the time
    HttpHead,
    /// The source value is the timestamp, no request needed
    Direct,
    /// Anything else, including the NTP family
    Unsupported(String),
}

impl TimingScheme {
    /// Classify a scheme URI
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn from_uri(uri: &str) -> Self {
        let normalized = uri.trim().to_ascii_lowercase();
        match normalized.as_str() {
            schemes::HTTP_XSDATE_2014 | schemes::HTTP_XSDATE_2012 => TimingScheme::HttpXsDate,
            schemes::HTTP_ISO_2014 | schemes::HTTP_ISO_2012 => TimingScheme::HttpIso,
            schemes::HTTP_HEAD_2014 | schemes::HTTP_HEAD_2012 => TimingScheme::HttpHead,
            schemes::DIRECT_2014 | schemes::DIRECT_2012 => TimingScheme::Direct,
            _ => TimingScheme::Unsupported(uri.to_string()),
        }
    }

    /// Whether resolving this scheme goes over the network
    pub fn requires_network(&self) -> bool {
        matches!(
            self,
            TimingScheme::HttpXsDate | TimingScheme::HttpIso | TimingScheme::HttpHead
        )
    }
}

impl std::fmt::Display for TimingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingScheme::HttpXsDate => write!(f, "http-xsdate"),
            TimingScheme::HttpIso => write!(f, "http-iso"),
            TimingScheme::HttpHead => write!(f, "http-head"),
            TimingScheme::Direct => write!(f, "direct"),
            TimingScheme::Unsupported(uri) => write!(f, "unsupported({})", uri),
        }
    }
}
