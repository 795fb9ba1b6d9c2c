//! Shared fixtures for the time sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use remotemedia_time_sync::{
    ChannelSink, Clock, HttpClient, HttpError, HttpRequest, HttpResponse, SyncCoordinator, TimeSyncEvent,
    TimeSyncSettings,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scripted behaviour for one URL
#[derive(Clone)]
pub enum Reply {
    /// Answer immediately
    Respond(HttpResponse),
    /// Fail at the transport level
    Fail(String),
    /// Never answer
    Hang,
    /// Answer after a delay
    After(Duration, Box<Reply>),
}

/// HTTP client answering from a per-URL script and recording every request
#[derive(Default)]
pub struct ScriptedHttp {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(self: &Arc<Self>, url: &str, reply: Reply) -> Arc<Self> {
        self.replies.lock().insert(url.to_string(), reply);
        self.clone()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let reply = self.replies.lock().get(&request.url).cloned();
        self.requests.lock().push(request);

        let mut reply = reply.unwrap_or_else(|| Reply::Respond(HttpResponse::new(404, "not found")));
        loop {
            match reply {
                Reply::Respond(response) => return Ok(response),
                Reply::Fail(reason) => return Err(HttpError::Transport(reason)),
                Reply::Hang => std::future::pending::<()>().await,
                Reply::After(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
            }
        }
    }
}

/// Local clock pinned to one instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The instant every test's local clock reads
pub fn local_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

pub fn settings(use_date_header: bool) -> TimeSyncSettings {
    let mut settings = TimeSyncSettings::default();
    settings.streaming.use_manifest_date_header_time_source = use_date_header;
    settings
}

/// Coordinator over `http` with a fixed local clock and a subscribed receiver
pub fn coordinator_with(
    http: Arc<ScriptedHttp>,
    settings: TimeSyncSettings,
) -> (SyncCoordinator, broadcast::Receiver<TimeSyncEvent>) {
    let (sink, rx) = ChannelSink::with_default_capacity();
    let coordinator = SyncCoordinator::new(http, Arc::new(sink), settings)
        .with_clock(Arc::new(FixedClock(local_now())));
    (coordinator, rx)
}

/// Next event, failing the test if none arrives within a minute of (virtual) time
pub async fn next_event(rx: &mut broadcast::Receiver<TimeSyncEvent>) -> TimeSyncEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for a time sync event")
        .expect("event channel closed")
}

/// Offset update and completion of one cycle, asserting their order
pub async fn next_cycle(rx: &mut broadcast::Receiver<TimeSyncEvent>) -> (TimeSyncEvent, TimeSyncEvent) {
    let update = next_event(rx).await;
    assert!(update.is_offset_update(), "expected offset update, got {:?}", update);
    let completed = next_event(rx).await;
    assert!(completed.is_completed(), "expected completion, got {:?}", completed);
    (update, completed)
}

/// Assert nothing else is published, letting (virtual) time run well past any timeout
pub async fn assert_quiet(rx: &mut broadcast::Receiver<TimeSyncEvent>) {
    let extra = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;
    assert!(extra.is_err(), "unexpected event: {:?}", extra);
}
