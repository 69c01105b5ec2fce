// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WAQI client against a mock HTTP server.

use aqi_tracker::db::ReadingStore;
use aqi_tracker::models::{City, CycleStatus, FailureCause, FetchStatus};
use aqi_tracker::services::{CycleMonitor, FetchScheduler, ProviderError, WaqiClient};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{feed_body, test_config, ts};

const TOKEN: &str = "test_token";

fn client(server: &ServerGuard) -> WaqiClient {
    WaqiClient::new(server.url(), TOKEN, Duration::from_secs(2)).unwrap()
}

fn token_query() -> Matcher {
    Matcher::UrlEncoded("token".into(), TOKEN.into())
}

#[tokio::test]
async fn test_get_feed_ok() {
    let mut server = Server::new_async().await;
    let body = feed_body(json!(145), "2026-01-01T10:00:00+05:30");
    let mock = server
        .mock("GET", "/feed/Delhi/")
        .match_query(token_query())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let payload = client(&server)
        .get_feed(&City::from("Delhi"))
        .await
        .expect("feed should succeed");

    mock.assert_async().await;
    assert_eq!(payload.body, body);
}

#[tokio::test]
async fn test_http_429_is_rate_limited_with_retry_after() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/feed/Delhi/")
        .match_query(token_query())
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;

    let err = client(&server)
        .get_feed(&City::from("Delhi"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
}

#[tokio::test]
async fn test_server_errors_are_bad_response() {
    for status in [500, 503] {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/feed/Delhi/")
            .match_query(token_query())
            .with_status(status)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let err = client(&server)
            .get_feed(&City::from("Delhi"))
            .await
            .unwrap_err();

        assert_eq!(err.cause(), FailureCause::BadResponse);
        assert!(err.to_string().contains(&status.to_string()));
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/feed/Delhi/")
        .match_query(token_query())
        .with_status(200)
        .with_body("{\"status\": \"ok\", \"data\": ")
        .create_async()
        .await;

    let err = client(&server)
        .get_feed(&City::from("Delhi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::BadResponse(ref msg) if msg.contains("JSON")));
}

#[tokio::test]
async fn test_in_band_errors() {
    let mut server = Server::new_async().await;
    let _unknown = server
        .mock("GET", "/feed/Atlantis/")
        .match_query(token_query())
        .with_status(200)
        .with_body(json!({"status": "error", "data": "Unknown station"}).to_string())
        .create_async()
        .await;
    let _quota = server
        .mock("GET", "/feed/Delhi/")
        .match_query(token_query())
        .with_status(200)
        .with_body(json!({"status": "error", "data": "Over quota"}).to_string())
        .create_async()
        .await;

    let client = client(&server);

    let err = client.get_feed(&City::from("Atlantis")).await.unwrap_err();
    assert_eq!(err.cause(), FailureCause::BadResponse);

    let err = client.get_feed(&City::from("Delhi")).await.unwrap_err();
    assert_eq!(err.cause(), FailureCause::RateLimited);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = WaqiClient::new("http://127.0.0.1:1", TOKEN, Duration::from_secs(2)).unwrap();

    let err = client.get_feed(&City::from("Delhi")).await.unwrap_err();

    assert_eq!(err.cause(), FailureCause::NetworkError);
    // The request URL carries the token and must not leak into details
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn test_cycle_against_mock_provider() {
    let mut server = Server::new_async().await;
    let delhi_mock = server
        .mock("GET", "/feed/Delhi/")
        .match_query(token_query())
        .with_status(200)
        .with_body(feed_body(json!(145), "2026-01-01T10:00:00Z").to_string())
        .expect(1)
        .create_async()
        .await;
    let mumbai_mock = server
        .mock("GET", "/feed/Mumbai/")
        .match_query(token_query())
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let config = test_config(&["Delhi", "Mumbai"]);
    let store = Arc::new(ReadingStore::in_memory(config.cities.clone()).unwrap());
    let scheduler = FetchScheduler::new(
        client(&server),
        store.clone(),
        CycleMonitor::new(),
        &config,
    );

    let report = scheduler.try_run_cycle().await.unwrap();

    let delhi = store.latest(&City::from("Delhi")).await.unwrap().unwrap();
    assert_eq!(delhi.aqi_value, 145.0);
    assert_eq!(delhi.timestamp, ts(1, 10));
    assert_eq!(delhi.station.as_deref(), Some("Test Station"));
    assert!(store.latest(&City::from("Mumbai")).await.unwrap().is_none());

    assert_eq!(report.status, CycleStatus::PartiallyFailed);
    let mumbai = report.outcome_for(&City::from("Mumbai")).unwrap();
    assert_eq!(mumbai.status, FetchStatus::ProviderError);
    assert_eq!(mumbai.cause, Some(FailureCause::BadResponse));

    // A 503 is permanent for this cycle: exactly one request each
    delhi_mock.assert_async().await;
    mumbai_mock.assert_async().await;
}
