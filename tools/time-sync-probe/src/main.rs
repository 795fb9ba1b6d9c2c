//! RemoteMedia Time Sync Probe
//!
//! Runs one synchronization cycle against the given time sources and prints
//! the resulting notifications as JSON lines on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Query an xs:dateTime endpoint, falling back to a HEAD request
//! remotemedia-time-sync-probe \
//!     --source xsdate=https://time.akamai.com/?iso \
//!     --source head=https://cdn.example.com/manifest.mpd
//!
//! # Full scheme URIs work too
//! remotemedia-time-sync-probe --source urn:mpeg:dash:utc:http-iso:2014=https://time.example.com/
//!
//! # No sources: use a manifest Date header instead
//! remotemedia-time-sync-probe --date-header "Mon, 19 Oct 2026 10:00:00 GMT"
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use remotemedia_time_sync::source::schemes;
use remotemedia_time_sync::{
    ChannelSink, ManifestDateHeader, MultiSink, ReqwestHttpClient, SyncCoordinator, TerminalSink, TimeSource,
    TimeSyncSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// RemoteMedia Time Sync Probe - measure the local clock offset
#[derive(Parser)]
#[command(name = "remotemedia-time-sync-probe")]
#[command(author, version)]
#[command(about = "Estimate the local clock offset against DASH UTCTiming sources")]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Time source as SCHEME=VALUE, tried in the order given
    ///
    /// SCHEME is a full scheme URI or one of: xsdate, iso, head, direct
    #[arg(short, long = "source", value_parser = parse_source)]
    sources: Vec<TimeSource>,

    /// Settings file (TOML); environment variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Manifest Date header to use when no source is given
    #[arg(long)]
    date_header: Option<String>,

    /// Never fall back to the manifest Date header
    #[arg(long)]
    no_date_header: bool,
}

/// Parse `SCHEME=VALUE`, expanding the short scheme names
fn parse_source(arg: &str) -> Result<TimeSource, String> {
    let (scheme, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected SCHEME=VALUE, got '{}'", arg))?;

    let scheme_id_uri = match scheme {
        "xsdate" => schemes::HTTP_XSDATE_2014,
        "iso" => schemes::HTTP_ISO_2014,
        "head" => schemes::HTTP_HEAD_2014,
        "direct" => schemes::DIRECT_2014,
        uri if uri.starts_with("urn:") => uri,
        other => return Err(format!("unknown scheme '{}'", other)),
    };
    if value.is_empty() {
        return Err(format!("missing value for scheme '{}'", scheme));
    }

    Ok(TimeSource::new(scheme_id_uri, value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let mut settings = TimeSyncSettings::load(args.config.as_ref()).context("Failed to load settings")?;
    if let Some(timeout_ms) = args.timeout_ms {
        settings.streaming.utc_synchronization.request_timeout_ms = timeout_ms;
    }
    if args.no_date_header {
        settings.streaming.use_manifest_date_header_time_source = false;
    }
    tracing::debug!(?settings, "Using settings");

    let (channel, mut events) = ChannelSink::with_default_capacity();
    let mut sink = MultiSink::new();
    sink.add_sink(Box::new(TerminalSink::stdout()));
    sink.add_sink(Box::new(channel));

    let http = ReqwestHttpClient::new().context("Failed to create HTTP client")?;
    let mut coordinator = SyncCoordinator::new(Arc::new(http), Arc::new(sink), settings);
    if let Some(value) = args.date_header {
        let header = ManifestDateHeader::new();
        header.record(value);
        coordinator = coordinator.with_date_header_source(Arc::new(header));
    }

    coordinator.attempt_sync(args.sources);

    loop {
        let event = events.recv().await.context("Event channel closed before completion")?;
        if event.is_completed() {
            if let Some(error) = event.error() {
                bail!("{} (code {})", error.message, error.code);
            }
            tracing::info!(offset_ms = event.offset_ms(), "Clock offset measured");
            return Ok(());
        }
    }
}
