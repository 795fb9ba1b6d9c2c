//! RemoteMedia Time Sync - client/server clock offset for live streams
//!
//! A live DASH presentation is anchored to wall-clock time, so the player
//! needs to know how far its own clock is from the packager's before it can
//! compute the live edge. This crate estimates that offset from the
//! `UTCTiming` sources a manifest advertises.
//!
//! # Architecture
//!
//! ```text
//!  attempt_sync([s0, s1, s2])
//!          │
//!          ▼
//!  ┌──────────────────┐  resolve(s_i)   ┌────────────────┐   GET / HEAD   ┌────────────┐
//!  │ SyncCoordinator  │ ──────────────> │ SourceResolver │ ─────────────> │ HttpClient │
//!  │ (fallback chain) │ <────────────── │ (per scheme)   │ <───────────── │            │
//!  └────────┬─────────┘  time | error   └────────────────┘                └────────────┘
//!           │ exactly once per cycle
//!           ▼
//!  ┌──────────────────┐
//!  │ EventSink        │ UPDATE_TIME_SYNC_OFFSET, TIME_SYNCHRONIZATION_COMPLETED
//!  └──────────────────┘
//! ```
//!
//! Sources are tried strictly in order, one at a time; the first one that
//! resolves wins. Individual failures only advance the chain. When every
//! source has failed the offset notification carries
//! [`TIME_SYNC_FAILED_ERROR_CODE`] and the configured fallback offset.
//!
//! # Example
//!
//! ```ignore
//! use remotemedia_time_sync::{ChannelSink, ReqwestHttpClient, SyncCoordinator, TimeSource, TimeSyncSettings};
//! use std::sync::Arc;
//!
//! let (sink, mut events) = ChannelSink::with_default_capacity();
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(ReqwestHttpClient::new()?),
//!     Arc::new(sink),
//!     TimeSyncSettings::default(),
//! );
//! coordinator.attempt_sync(vec![TimeSource::new(
//!     "urn:mpeg:dash:utc:http-xsdate:2014",
//!     "https://time.akamai.com/?iso",
//! )]);
//! while let Ok(event) = events.recv().await {
//!     println!("{}: offset={}ms", event.event_type(), event.offset_ms());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod date;
pub mod date_header;
pub mod events;
pub mod http;
pub mod resolver;
pub mod source;

mod error;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, FallbackOffset, StreamingSettings, TimeSyncSettings, UtcSynchronizationSettings};
pub use coordinator::{SyncCoordinator, SyncState};
pub use date_header::{DateHeaderSource, ManifestDateHeader};
pub use error::{Error, Result};
pub use events::{
    ChannelSink, EventSink, EventSinkError, MultiSink, SyncError, SyncOutcome, TerminalSink, TimeSyncEvent,
    TIME_SYNC_FAILED_ERROR_CODE, TIME_SYNC_FAILED_ERROR_MESSAGE,
};
pub use http::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use resolver::{ResolveError, ResolvedTime, SourceResolver};
pub use source::{TimeSource, TimingScheme};

/// Install a `tracing` subscriber for the process
///
/// Honors `RUST_LOG`, defaulting to `info`. Returns an error if a global
/// subscriber is already installed.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to install tracing subscriber: {}", e)))?;

    tracing::info!("RemoteMedia time sync initialized");
    Ok(())
}
