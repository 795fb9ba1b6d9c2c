//! Manifest `Date` header as a stand-in time source
//!
//! When a manifest advertises no `UTCTiming` element the server's `Date`
//! header on the manifest response is the only canonical time available. The
//! manifest loader records it; the coordinator asks for it.

use crate::date::parse_http_date;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Supplier of the time carried by the latest manifest response
pub trait DateHeaderSource: Send + Sync {
    /// Canonical time from the last manifest `Date` header, if one was seen
    fn latest_date_header_time(&self) -> Option<DateTime<Utc>>;
}

/// Slot the manifest fetcher writes the raw `Date` header into
#[derive(Debug, Default)]
pub struct ManifestDateHeader {
    value: RwLock<Option<String>>,
}

impl ManifestDateHeader {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the `Date` header of the latest manifest response
    pub fn record(&self, value: impl Into<String>) {
        *self.value.write() = Some(value.into());
    }

    /// Forget the recorded header
    pub fn clear(&self) {
        *self.value.write() = None;
    }

    /// Raw recorded value
    pub fn raw(&self) -> Option<String> {
        self.value.read().clone()
    }
}

impl DateHeaderSource for ManifestDateHeader {
    fn latest_date_header_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.value.read();
        let raw = raw.as_deref()?;
        match parse_http_date(raw) {
            Ok(time) => Some(time),
            Err(e) => {
                tracing::warn!("Ignoring manifest Date header: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_and_parse() {
        let header = ManifestDateHeader::new();
        assert_eq!(header.latest_date_header_time(), None);

        header.record("Mon, 19 Oct 2026 10:00:00 GMT");
        assert_eq!(
            header.latest_date_header_time(),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap())
        );

        header.clear();
        assert_eq!(header.raw(), None);
        assert_eq!(header.latest_date_header_time(), None);
    }

    #[test]
    fn test_malformed_header_yields_nothing() {
        let header = ManifestDateHeader::new();
        header.record("soon");
        assert_eq!(header.raw().as_deref(), Some("soon"));
        assert_eq!(header.latest_date_header_time(), None);
    }
}
