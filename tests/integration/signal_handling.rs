//! Cancellation behaviour of a running download

use super::support::{fixed_now, harness_with, ok_response, ScriptedTransport};
use news_ingest::downloader::rate_limit::RESET_HEADER;
use news_ingest::downloader::{DownloadError, DownloadRequest};
use news_ingest::fetcher::HttpResponse;
use news_ingest::shutdown::ShutdownCoordinator;
use std::time::Duration;

const BASE_URL: &str = "http://news.test/v2/top-headlines";

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_publishes_nothing() {
    let transport = ScriptedTransport::new(vec![ok_response(45, &["a"])]);
    let harness = harness_with(transport.clone(), BASE_URL);
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let executor = harness.executor.with_shutdown(shutdown);

    let aborted = executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap_err();

    assert!(aborted.is_cancelled());
    assert!(aborted.partial.file_paths.is_empty());
    assert!(transport.urls().is_empty());
    assert!(harness.broker.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_keeps_completed_pages() {
    let transport = ScriptedTransport::new(vec![
        ok_response(60, &["a"]),
        ok_response(60, &["b"]),
        ok_response(60, &["c"]),
    ]);
    let harness = harness_with(transport.clone(), BASE_URL);
    let shutdown = ShutdownCoordinator::shared();
    let executor = harness
        .executor
        .with_shutdown(shutdown.clone())
        .with_page_delay(Duration::from_millis(500));

    // Fires while the executor pauses between page 1 and page 2
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.request_shutdown();
        }
    });

    let aborted = executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap_err();

    assert!(matches!(aborted.error, DownloadError::Cancelled { page: 2 }));
    assert_eq!(aborted.partial.pages_downloaded, 1);
    assert_eq!(aborted.partial.file_paths.len(), 1);
    assert!(aborted.partial.file_paths[0].exists());
    assert_eq!(transport.pages(), vec![1]);
    assert_eq!(harness.broker.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_rate_limit_wait() {
    let reset_at = fixed_now() + chrono::Duration::seconds(600);
    let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(429, "{}")
        .with_header(RESET_HEADER, reset_at.timestamp().to_string()))]);
    let harness = harness_with(transport.clone(), BASE_URL);
    let shutdown = ShutdownCoordinator::shared();
    let executor = harness.executor.with_shutdown(shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            shutdown.request_shutdown();
        }
    });

    let start = tokio::time::Instant::now();
    let aborted = executor
        .execute(DownloadRequest::new("key", "us"))
        .await
        .unwrap_err();

    assert!(matches!(aborted.error, DownloadError::Cancelled { page: 1 }));
    assert!(start.elapsed() < Duration::from_secs(600));
    assert!(aborted.partial.file_paths.is_empty());
    assert_eq!(transport.pages(), vec![1]);
}
