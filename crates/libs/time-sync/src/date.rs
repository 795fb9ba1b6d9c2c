//! Timestamp parsing for the different time source formats
//!
//! Time servers in the wild are loose about formats: `?iso` endpoints may
//! omit the zone, xsdate endpoints sometimes answer with whatever the
//! server's date formatter prints. Every parser trims its input and reads a
//! missing zone designator as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Input that did not yield a timestamp
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable timestamp: {input:?}")]
pub struct DateParseError {
    /// The offending input, trimmed
    pub input: String,
}

impl DateParseError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

const NAIVE_ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const ZONED_ISO_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse an ISO-8601 / RFC 3339 timestamp
pub fn parse_iso8601(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DateParseError::new(s));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ZONED_ISO_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in NAIVE_ISO_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(DateParseError::new(s))
}

/// Parse an HTTP `Date` header value
///
/// Accepts IMF-fixdate / RFC 2822 and the asctime form.
pub fn parse_http_date(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%a %b %e %H:%M:%S %Y") {
        return Ok(dt.and_utc());
    }
    Err(DateParseError::new(s))
}

/// Parse an xs:dateTime body, leniently
///
/// Tried in order: ISO-8601, HTTP-date, the `Date.prototype.toString` shape
/// (`Mon Oct 19 2026 10:00:00 GMT+0000 (Coordinated Universal Time)`), and a
/// bare integer of milliseconds since the Unix epoch.
pub fn parse_xs_date(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DateParseError::new(s));
    }

    if let Ok(dt) = parse_iso8601(s) {
        return Ok(dt);
    }
    if let Ok(dt) = parse_http_date(s) {
        return Ok(dt);
    }
    if let Some(dt) = parse_js_date_string(s) {
        return Ok(dt);
    }
    if let Ok(millis) = s.parse::<i64>() {
        if let Some(dt) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(dt);
        }
    }

    Err(DateParseError::new(s))
}

fn parse_js_date_string(s: &str) -> Option<DateTime<Utc>> {
    // Drop the localized zone name in parentheses
    let s = s.split(" (").next().unwrap_or(s).trim();
    DateTime::<FixedOffset>::parse_from_str(s, "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_iso_variants() {
        let expected = utc(2026, 10, 19, 10, 0, 0);
        assert_eq!(parse_iso8601("2026-10-19T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_iso8601("2026-10-19T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2026-10-19T12:00:00+0200").unwrap(), expected);
        assert_eq!(parse_iso8601(" 2026-10-19T10:00:00\n").unwrap(), expected);
        assert_eq!(parse_iso8601("2026-10-19T10:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2026-10-19").unwrap(), utc(2026, 10, 19, 0, 0, 0));
    }

    #[test]
    fn test_iso_fractional_seconds() {
        let parsed = parse_iso8601("2026-10-19T10:00:00.250Z").unwrap();
        assert_eq!(parsed.timestamp_millis(), utc(2026, 10, 19, 10, 0, 0).timestamp_millis() + 250);

        let naive = parse_iso8601("2026-10-19T10:00:00.5").unwrap();
        assert_eq!(naive.timestamp_millis() % 1000, 500);
    }

    #[test]
    fn test_iso_rejects_garbage() {
        assert!(parse_iso8601("").is_err());
        assert!(parse_iso8601("not a date").is_err());
        assert!(parse_iso8601("2026-13-40T99:00:00Z").is_err());
    }

    #[test]
    fn test_http_date() {
        let expected = utc(1994, 11, 6, 8, 49, 37);
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap(), expected);
        assert_eq!(
            parse_http_date("Thu Nov 10 08:49:37 1994").unwrap(),
            utc(1994, 11, 10, 8, 49, 37)
        );
        assert!(parse_http_date("yesterday").is_err());
    }

    #[test]
    fn test_xs_date_accepts_many_shapes() {
        let expected = utc(2026, 10, 19, 10, 0, 0);
        assert_eq!(parse_xs_date("2026-10-19T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_xs_date("Mon, 19 Oct 2026 10:00:00 GMT").unwrap(), expected);
        assert_eq!(
            parse_xs_date("Mon Oct 19 2026 12:00:00 GMT+0200 (Central European Summer Time)").unwrap(),
            expected
        );
        assert_eq!(parse_xs_date("Mon Oct 19 2026 10:00:00 GMT+0000").unwrap(), expected);
        assert_eq!(parse_xs_date(&expected.timestamp_millis().to_string()).unwrap(), expected);
    }

    #[test]
    fn test_xs_date_error_keeps_input() {
        let err = parse_xs_date("  <html>busy</html> ").unwrap_err();
        assert_eq!(err.input, "<html>busy</html>");
    }
}
