//! End-to-end pipeline tests against a mock provider over HTTP

use super::support::{http_harness, page_body};
use news_ingest::downloader::{DownloadError, DownloadRequest, FailureStage};
use news_ingest::publisher::memory::AckMode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/v2/top-headlines";

async fn mount_page(server: &MockServer, page: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

fn request() -> DownloadRequest {
    DownloadRequest::new("test-key", "us").with_page_size(20)
}

#[tokio::test]
async fn test_downloads_every_page_and_publishes_each_path() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_body(45, &["first story", "second story"])).await;
    mount_page(&server, "2", page_body(45, &["third story"])).await;
    mount_page(&server, "3", page_body(45, &["last story"])).await;

    let harness = http_harness(&server.uri());
    let result = harness.executor.execute(request()).await.unwrap();

    assert_eq!(result.total_articles, 45);
    assert_eq!(result.pages_downloaded, 3);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.file_paths.len(), 3);

    let expected_dir = harness.output.path().join("2025").join("08");
    for (i, file) in result.file_paths.iter().enumerate() {
        assert!(file.is_absolute());
        assert!(file.exists(), "missing artifact {}", file.display());
        assert_eq!(
            file.file_name().unwrap().to_string_lossy(),
            format!("2025-08-15_12-00-00_us_page{}.json", i + 1)
        );
        assert_eq!(
            file.parent().unwrap().canonicalize().unwrap(),
            expected_dir.canonicalize().unwrap()
        );
    }

    let messages = harness.broker.messages();
    let published: Vec<_> = messages.iter().map(|m| m.payload.clone()).collect();
    let written: Vec<_> = result
        .file_paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    assert_eq!(published, written);
    assert!(messages.iter().all(|m| m.topic == harness.config.kafka_topic));

    harness.executor.close().await.unwrap();
}

#[tokio::test]
async fn test_artifact_holds_the_provider_payload() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_body(1, &["only story"])).await;

    let harness = http_harness(&server.uri());
    let result = harness.executor.execute(request()).await.unwrap();

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&result.file_paths[0]).unwrap()).unwrap();
    assert_eq!(saved["status"], "ok");
    assert_eq!(saved["totalResults"], 1);
    assert_eq!(saved["articles"][0]["title"], "only story");
}

#[tokio::test]
async fn test_api_error_on_second_page_aborts_run() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_body(45, &["first story"])).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid or incorrect."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(45, &[])))
        .expect(0)
        .mount(&server)
        .await;

    let harness = http_harness(&server.uri());
    let aborted = harness.executor.execute(request()).await.unwrap_err();

    assert!(!aborted.is_cancelled());
    match &aborted.error {
        DownloadError::Api { page, source } => {
            assert_eq!(*page, 2);
            assert_eq!(source.status_code, 401);
            assert_eq!(source.code.as_deref(), Some("apiKeyInvalid"));
            assert!(source.url.contains("apiKey=REDACTED"));
            assert!(!source.url.contains("test-key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(aborted.partial.pages_downloaded, 1);
    assert_eq!(aborted.partial.file_paths.len(), 1);
    assert_eq!(harness.broker.messages().len(), 1);
}

#[tokio::test]
async fn test_publish_failure_keeps_artifact_and_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_body(30, &["first story"])).await;
    mount_page(&server, "2", page_body(30, &["second story"])).await;

    let harness = http_harness(&server.uri());
    harness
        .broker
        .set_mode(AckMode::Fail("broker unavailable".to_string()));

    let result = harness.executor.execute(request()).await.unwrap();

    assert_eq!(result.pages_downloaded, 2);
    assert_eq!(result.file_paths.len(), 2);
    assert!(result.file_paths.iter().all(|p| p.exists()));
    assert_eq!(result.errors.len(), 2);
    for (failure, page) in result.errors.iter().zip([1, 2]) {
        assert_eq!(failure.page, page);
        assert_eq!(failure.stage, FailureStage::Publish);
        assert!(failure.message.contains("broker unavailable"), "{failure}");
    }
}

#[tokio::test]
async fn test_server_error_without_json_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let harness = http_harness(&server.uri());
    let aborted = harness.executor.execute(request()).await.unwrap_err();

    match &aborted.error {
        DownloadError::Api { page: 1, source } => {
            assert_eq!(source.status_code, 502);
            assert_eq!(source.message, "<html>Bad Gateway</html>");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(aborted.partial.file_paths.is_empty());
}

#[tokio::test]
async fn test_query_only_search_sends_no_country() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", "rust language"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, &["story"])))
        .expect(1)
        .mount(&server)
        .await;

    let harness = http_harness(&server.uri());
    let request = DownloadRequest::new("test-key", "").with_query("rust language");
    let result = harness.executor.execute(request).await.unwrap();

    assert_eq!(result.pages_downloaded, 1);
    let received = server.received_requests().await.unwrap();
    assert!(received[0]
        .url
        .query_pairs()
        .all(|(k, _)| k != "country"));
}
