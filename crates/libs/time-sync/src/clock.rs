//! Local wall-clock access
//!
//! The offset is measured against whatever [`Clock`] the coordinator was
//! built with, so tests can pin "now" to a known instant.

use chrono::{DateTime, Utc};

/// Source of the local device time
pub trait Clock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system's realtime clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
