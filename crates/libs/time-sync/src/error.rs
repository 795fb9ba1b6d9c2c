//! Error types for RemoteMedia time sync

use thiserror::Error;

use crate::config::ConfigError;
use crate::events::EventSinkError;
use crate::http::HttpError;

/// Result type alias for time sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in RemoteMedia time sync
///
/// Synchronization cycles never fail through this type; their outcome is
/// always reported on the event sink. These errors come from setting the
/// machinery up (configuration, HTTP client, logging).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client construction or request error
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Event delivery error
    #[error("Event sink error: {0}")]
    EventSink(#[from] EventSinkError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
