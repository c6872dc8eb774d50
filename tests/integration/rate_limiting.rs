//! Integration tests for quota handling inside a download run

use super::support::{fixed_now, harness_with, ok_response, ScriptedTransport};
use news_ingest::downloader::rate_limit::{REMAINING_HEADER, RESET_HEADER};
use news_ingest::downloader::FailureStage;
use news_ingest::downloader::DownloadRequest;
use news_ingest::fetcher::{HttpResponse, TransportError};
use std::time::Duration;
use tokio::time::Instant;

const BASE_URL: &str = "http://news.test/v2/top-headlines";

fn too_many_requests() -> HttpResponse {
    HttpResponse::new(
        429,
        r#"{"status":"error","code":"rateLimited","message":"slow down"}"#,
    )
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_page_is_retried_after_reset() {
    let reset_at = fixed_now() + chrono::Duration::seconds(2);
    let transport = ScriptedTransport::new(vec![
        Ok(too_many_requests().with_header(RESET_HEADER, reset_at.timestamp().to_string())),
        ok_response(5, &["story"]),
    ]);
    let harness = harness_with(transport.clone(), BASE_URL);

    let start = Instant::now();
    let result = harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();
    let waited = start.elapsed();

    // Same page twice: the 429 never advanced the counter
    assert_eq!(transport.pages(), vec![1, 1]);
    assert_eq!(result.pages_downloaded, 1);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    // Reset is 2s away, plus one second of grace
    assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
    assert!(waited < Duration::from_secs(4), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_without_reset_uses_configured_delay() {
    let transport = ScriptedTransport::new(vec![Ok(too_many_requests()), ok_response(1, &["story"])]);
    let harness = harness_with(transport.clone(), BASE_URL);

    let start = Instant::now();
    let result = harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();

    assert_eq!(result.pages_downloaded, 1);
    assert_eq!(transport.pages(), vec![1, 1]);
    assert!(start.elapsed() >= Duration::from_secs(7));
    assert!(start.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_low_remaining_quota_pauses_before_next_request() {
    let reset_at = fixed_now() + chrono::Duration::seconds(10);
    let transport = ScriptedTransport::new(vec![
        Ok(HttpResponse::new(200, super::support::page_body(40, &["a"]).to_string())
            .with_header(REMAINING_HEADER, "3")
            .with_header(RESET_HEADER, reset_at.timestamp().to_string())),
        ok_response(40, &["b"]),
    ]);
    let harness = harness_with(transport.clone(), BASE_URL);

    let start = Instant::now();
    let result = harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();

    assert_eq!(result.pages_downloaded, 2);
    assert_eq!(transport.pages(), vec![1, 2]);
    // Three calls left: wait out the window (10s + 1s grace) before page 2
    assert!(start.elapsed() >= Duration::from_secs(11), "{:?}", start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_state_reflects_last_response() {
    let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
        200,
        super::support::page_body(1, &["a"]).to_string(),
    )
    .with_header(REMAINING_HEADER, "42"))]);
    let harness = harness_with(transport, BASE_URL);

    harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();

    assert_eq!(harness.executor.client().rate_limit_status().remaining, 42);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_quota_is_not_waited_twice_once_window_resets() {
    let reset_at = fixed_now() + chrono::Duration::seconds(2);
    let transport = ScriptedTransport::new(vec![
        Ok(too_many_requests()
            .with_header(REMAINING_HEADER, "0")
            .with_header(RESET_HEADER, reset_at.timestamp().to_string())),
        ok_response(5, &["story"]),
    ]);
    let harness = harness_with(transport.clone(), BASE_URL);

    // Wall clock passes the reset while the executor sleeps out the 429
    let clock = harness.clock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        clock.advance(chrono::Duration::milliseconds(2500));
    });

    let start = Instant::now();
    let result = harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();
    let waited = start.elapsed();

    assert_eq!(transport.pages(), vec![1, 1]);
    assert_eq!(result.pages_downloaded, 1);
    // One 3s wait for the 429; the limiter sees the window has reset
    assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
    assert!(waited < Duration::from_secs(4), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_headers_of_unreadable_body_still_update_quota() {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-ratelimit-remaining", "17".parse().unwrap());
    let transport = ScriptedTransport::new(vec![Err(TransportError::Body {
        message: "connection reset".to_string(),
        headers: Box::new(headers),
    })]);
    let harness = harness_with(transport, BASE_URL);

    let result = harness
        .executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap();

    assert_eq!(result.pages_downloaded, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].stage, FailureStage::Fetch);
    assert_eq!(harness.executor.client().rate_limit_status().remaining, 17);
}
