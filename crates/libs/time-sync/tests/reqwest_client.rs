//! ReqwestHttpClient against a local mock server

use remotemedia_time_sync::source::schemes;
use remotemedia_time_sync::{
    ChannelSink, HttpClient, HttpRequest, ReqwestHttpClient, ResolveError, SourceResolver, SyncCoordinator,
    TimeSource, TimeSyncSettings,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time"))
        .respond_with(ResponseTemplate::new(200).set_body_string("2026-10-19T10:00:00Z"))
        .mount(&server)
        .await;

    let client = ReqwestHttpClient::new().unwrap();
    let response = client
        .send(HttpRequest::get(format!("{}/time", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "2026-10-19T10:00:00Z");
}

#[tokio::test]
async fn test_head_exposes_date_header() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).insert_header("Date", "Mon, 19 Oct 2026 10:00:00 GMT"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ReqwestHttpClient::new().unwrap();
    let response = client
        .send(HttpRequest::head(format!("{}/manifest.mpd", server.uri())))
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.header("date"), Some("Mon, 19 Oct 2026 10:00:00 GMT"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = Arc::new(ReqwestHttpClient::new().unwrap());
    let url = format!("{}/time", server.uri());

    let response = client.send(HttpRequest::get(url.clone())).await.unwrap();
    assert_eq!(response.status, 500);

    let resolver = SourceResolver::new(client);
    let err = resolver
        .resolve(&TimeSource::new(schemes::HTTP_XSDATE_2014, url.clone()))
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::Status { url, status: 500 });
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("2026-10-19T10:00:00Z")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let resolver = SourceResolver::new(Arc::new(ReqwestHttpClient::new().unwrap()))
        .with_timeout(Duration::from_millis(100));
    let err = resolver
        .resolve(&TimeSource::new(schemes::HTTP_ISO_2014, format!("{}/slow", server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Timeout { timeout_ms: 100, .. }));
}

#[tokio::test]
async fn test_coordinator_syncs_against_xsdate_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chrono::Utc::now().to_rfc3339()))
        .mount(&server)
        .await;

    let (sink, mut events) = ChannelSink::with_default_capacity();
    let coordinator = SyncCoordinator::new(
        Arc::new(ReqwestHttpClient::new().unwrap()),
        Arc::new(sink),
        TimeSyncSettings::default(),
    );
    coordinator.initialize();

    coordinator.attempt_sync(vec![TimeSource::new(
        schemes::HTTP_XSDATE_2014,
        format!("{}/?iso", server.uri()),
    )]);

    let update = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(update.is_offset_update());
    assert!(update.error().is_none());
    // Same machine: only the request latency separates the two clocks
    assert!(update.offset_ms().abs() < 10_000);

    let completed = events.recv().await.unwrap();
    assert!(completed.is_completed());
    assert!(completed.error().is_none());
}
