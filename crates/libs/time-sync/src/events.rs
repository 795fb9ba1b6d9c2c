//! Time sync notifications and the sinks that deliver them
//!
//! Every synchronization cycle ends with exactly two events, in order:
//! [`TimeSyncEvent::UpdateTimeSyncOffset`] then
//! [`TimeSyncEvent::TimeSynchronizationCompleted`]. The coordinator publishes
//! them through an injected [`EventSink`]; [`ChannelSink`] is the
//! publish/subscribe bus most callers want.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::sync::broadcast;

/// Error code reported when no time source could be resolved
pub const TIME_SYNC_FAILED_ERROR_CODE: u32 = 16;

/// Message reported alongside [`TIME_SYNC_FAILED_ERROR_CODE`]
pub const TIME_SYNC_FAILED_ERROR_MESSAGE: &str = "Failed to synchronize client and server time";

/// Error payload carried by the notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    /// Player error code
    pub code: u32,
    /// Human readable message
    pub message: String,
}

impl SyncError {
    /// The time-sync-failed error
    pub fn time_sync_failed() -> Self {
        Self {
            code: TIME_SYNC_FAILED_ERROR_CODE,
            message: TIME_SYNC_FAILED_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Result of one synchronization cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// `canonical - local`, in milliseconds
    pub offset_ms: i64,
    /// Canonical time the offset was derived from, if any
    pub time: Option<DateTime<Utc>>,
    /// Set when the cycle failed
    pub error: Option<SyncError>,
}

impl SyncOutcome {
    /// Successful outcome from a canonical time measured at `local`
    pub fn measured(canonical: DateTime<Utc>, local: DateTime<Utc>) -> Self {
        Self {
            offset_ms: (canonical - local).num_milliseconds(),
            time: Some(canonical),
            error: None,
        }
    }

    /// Failed outcome carrying the fallback offset
    pub fn failed(fallback_offset_ms: i64) -> Self {
        Self {
            offset_ms: fallback_offset_ms,
            time: None,
            error: Some(SyncError::time_sync_failed()),
        }
    }

    /// Whether the cycle produced a measured offset
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The notification pair for this outcome, in emission order
    pub fn into_events(self) -> [TimeSyncEvent; 2] {
        [
            TimeSyncEvent::UpdateTimeSyncOffset {
                offset: self.offset_ms,
                error: self.error.clone(),
            },
            TimeSyncEvent::TimeSynchronizationCompleted {
                time: self.time,
                offset: self.offset_ms,
                error: self.error,
            },
        ]
    }
}

/// Notifications published by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeSyncEvent {
    /// New clock offset (or the fallback, with an error)
    UpdateTimeSyncOffset {
        /// `canonical - local`, in milliseconds
        offset: i64,
        /// `None` on success
        error: Option<SyncError>,
    },
    /// The cycle is over; dependents may proceed
    TimeSynchronizationCompleted {
        /// Canonical time the offset was measured from
        time: Option<DateTime<Utc>>,
        /// Same offset as the preceding update
        offset: i64,
        /// `None` on success
        error: Option<SyncError>,
    },
}

impl TimeSyncEvent {
    /// Notification name
    pub fn event_type(&self) -> &'static str {
        match self {
            TimeSyncEvent::UpdateTimeSyncOffset { .. } => "UPDATE_TIME_SYNC_OFFSET",
            TimeSyncEvent::TimeSynchronizationCompleted { .. } => "TIME_SYNCHRONIZATION_COMPLETED",
        }
    }

    /// Offset carried by the event
    pub fn offset_ms(&self) -> i64 {
        match self {
            TimeSyncEvent::UpdateTimeSyncOffset { offset, .. }
            | TimeSyncEvent::TimeSynchronizationCompleted { offset, .. } => *offset,
        }
    }

    /// Error carried by the event
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            TimeSyncEvent::UpdateTimeSyncOffset { error, .. }
            | TimeSyncEvent::TimeSynchronizationCompleted { error, .. } => error.as_ref(),
        }
    }

    /// Whether this is `UPDATE_TIME_SYNC_OFFSET`
    pub fn is_offset_update(&self) -> bool {
        matches!(self, TimeSyncEvent::UpdateTimeSyncOffset { .. })
    }

    /// Whether this is `TIME_SYNCHRONIZATION_COMPLETED`
    pub fn is_completed(&self) -> bool {
        matches!(self, TimeSyncEvent::TimeSynchronizationCompleted { .. })
    }
}

/// Trait for event delivery targets
///
/// Implementations include:
/// - `ChannelSink` - Broadcast channel, any number of subscribers
/// - `TerminalSink` - JSONL output to terminal/file
/// - `MultiSink` - Fan-out to several sinks
pub trait EventSink: Send + Sync {
    /// Emit an event to this sink
    fn emit(&self, event: TimeSyncEvent) -> Result<(), EventSinkError>;

    /// Close the sink and perform any cleanup
    fn close(&self) -> Result<(), EventSinkError> {
        Ok(())
    }
}

/// Error type for event sink operations
#[derive(Debug, thiserror::Error)]
pub enum EventSinkError {
    /// Writing to the output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No live receiver, or the writer lock was poisoned
    #[error("Channel send error: {0}")]
    Channel(String),
}

/// Broadcast channel sink
///
/// Subscribers register with [`ChannelSink::subscribe`] and unregister by
/// dropping their receiver.
pub struct ChannelSink {
    sender: broadcast::Sender<TimeSyncEvent>,
}

impl ChannelSink {
    /// Create a new channel sink with the specified capacity
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<TimeSyncEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a new channel sink with default capacity (64)
    pub fn with_default_capacity() -> (Self, broadcast::Receiver<TimeSyncEvent>) {
        Self::new(64)
    }

    /// Subscribe to receive events from this sink
    pub fn subscribe(&self) -> broadcast::Receiver<TimeSyncEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TimeSyncEvent) -> Result<(), EventSinkError> {
        self.sender
            .send(event)
            .map_err(|e| EventSinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Terminal/file JSONL sink
pub struct TerminalSink<W: Write + Send> {
    writer: std::sync::Mutex<W>,
}

impl<W: Write + Send> TerminalSink<W> {
    /// Create a new terminal sink writing to the specified output
    pub fn new(writer: W) -> Self {
        Self {
            writer: std::sync::Mutex::new(writer),
        }
    }
}

impl TerminalSink<std::io::Stdout> {
    /// Create a terminal sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventSink for TerminalSink<W> {
    fn emit(&self, event: TimeSyncEvent) -> Result<(), EventSinkError> {
        let line = serde_json::to_string(&event)
            .map_err(|e| EventSinkError::Serialization(e.to_string()))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| EventSinkError::Channel(format!("writer lock poisoned: {}", e)))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Multi-sink that broadcasts events to multiple sinks
pub struct MultiSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiSink {
    /// Create a new multi-sink
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink to the multi-sink
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl Default for MultiSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MultiSink {
    /// Delivers to every sink, returning the first error after trying all
    fn emit(&self, event: TimeSyncEvent) -> Result<(), EventSinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn close(&self) -> Result<(), EventSinkError> {
        for sink in &self.sinks {
            sink.close()?;
        }
        Ok(())
    }
}
