//! Configuration for time synchronization
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! The coordinator takes a [`TimeSyncSettings`] value explicitly; nothing is
//! read from process-wide state once a coordinator exists.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings object handed to the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSyncSettings {
    /// Streaming settings
    #[serde(default)]
    pub streaming: StreamingSettings,
}

/// Streaming-related settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// When no explicit time source is given, take the time from the
    /// manifest response's `Date` header instead of failing
    #[serde(default = "default_use_manifest_date_header")]
    pub use_manifest_date_header_time_source: bool,

    /// UTC synchronization tuning
    #[serde(default)]
    pub utc_synchronization: UtcSynchronizationSettings,
}

fn default_use_manifest_date_header() -> bool {
    true
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            use_manifest_date_header_time_source: default_use_manifest_date_header(),
            utc_synchronization: UtcSynchronizationSettings::default(),
        }
    }
}

/// Tuning for the time source fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcSynchronizationSettings {
    /// Upper bound on a single HTTP time source request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Offset reported when every source failed
    #[serde(default)]
    pub fallback_offset: FallbackOffset,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for UtcSynchronizationSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            fallback_offset: FallbackOffset::default(),
        }
    }
}

/// Offset reported alongside `TIME_SYNC_FAILED`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackOffset {
    /// Report an offset of zero (trust the local clock)
    #[default]
    Zero,
    /// Report the offset of the last successful cycle, or zero if there was none
    LastKnown,
}

impl std::str::FromStr for FallbackOffset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(FallbackOffset::Zero),
            "last_known" | "last-known" => Ok(FallbackOffset::LastKnown),
            other => Err(ConfigError::Parse(format!(
                "unknown fallback offset '{}', expected 'zero' or 'last_known'",
                other
            ))),
        }
    }
}

impl TimeSyncSettings {
    /// Per-attempt request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.streaming.utc_synchronization.request_timeout_ms)
    }

    /// Whether the manifest `Date` header may stand in for explicit sources
    pub fn use_manifest_date_header(&self) -> bool {
        self.streaming.use_manifest_date_header_time_source
    }

    /// Fallback offset policy on total failure
    pub fn fallback_offset(&self) -> FallbackOffset {
        self.streaming.utc_synchronization.fallback_offset
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut settings = TimeSyncSettings::default();

        if let Ok(flag) = std::env::var("TIME_SYNC_USE_DATE_HEADER") {
            if let Ok(b) = flag.parse() {
                settings.streaming.use_manifest_date_header_time_source = b;
            }
        }
        if let Ok(timeout) = std::env::var("TIME_SYNC_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                settings.streaming.utc_synchronization.request_timeout_ms = t;
            }
        }
        if let Ok(fallback) = std::env::var("TIME_SYNC_FALLBACK") {
            match fallback.parse() {
                Ok(f) => settings.streaming.utc_synchronization.fallback_offset = f,
                Err(e) => tracing::warn!("Ignoring TIME_SYNC_FALLBACK: {}", e),
            }
        }

        settings
    }

    /// Load settings from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Ok(Self::from_env())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// Settings are not valid TOML for this schema
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = TimeSyncSettings::default();
        assert!(settings.use_manifest_date_header());
        assert_eq!(settings.request_timeout(), Duration::from_millis(5000));
        assert_eq!(settings.fallback_offset(), FallbackOffset::Zero);
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
[streaming]
use_manifest_date_header_time_source = false

[streaming.utc_synchronization]
request_timeout_ms = 1500
fallback_offset = "last_known"
"#;

        let settings = TimeSyncSettings::from_toml(toml).unwrap();
        assert!(!settings.use_manifest_date_header());
        assert_eq!(settings.request_timeout(), Duration::from_millis(1500));
        assert_eq!(settings.fallback_offset(), FallbackOffset::LastKnown);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = TimeSyncSettings::from_toml("[streaming.utc_synchronization]\nrequest_timeout_ms = 200\n").unwrap();
        assert!(settings.use_manifest_date_header());
        assert_eq!(settings.request_timeout(), Duration::from_millis(200));
        assert_eq!(settings.fallback_offset(), FallbackOffset::Zero);
    }

    #[test]
    fn test_invalid_fallback_rejected() {
        let result = TimeSyncSettings::from_toml("[streaming.utc_synchronization]\nfallback_offset = \"cached\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        assert!("cached".parse::<FallbackOffset>().is_err());
        assert_eq!("last-known".parse::<FallbackOffset>().unwrap(), FallbackOffset::LastKnown);
    }

    #[test]
    fn test_from_file_and_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[streaming]\nuse_manifest_date_header_time_source = false").unwrap();

        let settings = TimeSyncSettings::from_file(file.path()).unwrap();
        assert!(!settings.use_manifest_date_header());

        let loaded = TimeSyncSettings::load(Some(file.path())).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_from_file_missing() {
        let result = TimeSyncSettings::from_file("/nonexistent/time-sync.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
