//! Shared fixtures for pipeline tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use news_ingest::clock::{ManualClock, SharedClock};
use news_ingest::config::Config;
use news_ingest::fetcher::newsapi_http::NewsApiClient;
use news_ingest::fetcher::transport::ReqwestTransport;
use news_ingest::fetcher::{HttpResponse, Transport, TransportError};
use news_ingest::output::json::JsonArtifactWriter;
use news_ingest::output::path::ArtifactPathGenerator;
use news_ingest::publisher::memory::MemoryBroker;
use news_ingest::publisher::producer::BrokerPublisher;
use news_ingest::DownloadExecutor;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Wall-clock time every pipeline test runs at
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap()
}

/// A provider page body with one article per title
pub fn page_body(total: u64, titles: &[&str]) -> serde_json::Value {
    let articles: Vec<_> = titles
        .iter()
        .map(|title| {
            serde_json::json!({
                "source": {"id": null, "name": "Example Wire"},
                "author": "Desk",
                "title": title,
                "url": format!("https://example.com/{}", title.replace(' ', "-")),
                "publishedAt": "2025-08-15T10:00:00Z"
            })
        })
        .collect();
    serde_json::json!({
        "status": "ok",
        "totalResults": total,
        "articles": articles
    })
}

/// Executor wired to a tempdir, a manual clock and an in-memory broker
pub struct Harness {
    pub executor: DownloadExecutor,
    pub broker: MemoryBroker,
    pub output: TempDir,
    pub config: Config,
    pub clock: Arc<ManualClock>,
}

/// Build a harness whose client talks to `transport` at `base_url`
pub fn harness_with(transport: Arc<dyn Transport>, base_url: &str) -> Harness {
    let output = tempfile::tempdir().unwrap();
    let config = Config {
        base_url: base_url.to_string(),
        default_rate_limit_delay_seconds: 7,
        output_dir: output.path().to_path_buf(),
        ..Config::default()
    };
    let manual = ManualClock::shared(fixed_now());
    let clock: SharedClock = manual.clone();

    let client = NewsApiClient::new(transport, clock.clone(), &config);
    let writer = Arc::new(JsonArtifactWriter::new(
        ArtifactPathGenerator::new(clock.clone()),
        output.path(),
    ));
    let (broker, events) = MemoryBroker::new();
    let publisher = Arc::new(BrokerPublisher::new(broker.clone(), events));

    let executor = DownloadExecutor::new(client, writer, publisher, clock, config.clone())
        .with_page_delay(Duration::ZERO);

    Harness {
        executor,
        broker,
        output,
        config,
        clock: manual,
    }
}

/// Build a harness that talks HTTP to a mock server
pub fn http_harness(server_uri: &str) -> Harness {
    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    harness_with(transport, &format!("{server_uri}/v2/top-headlines"))
}

/// Transport replaying canned responses in order
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            urls: Mutex::new(Vec::new()),
        })
    }

    /// URLs requested so far
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Page numbers requested so far, in order
    pub fn pages(&self) -> Vec<u32> {
        self.urls()
            .iter()
            .filter_map(|u| url::Url::parse(u).ok())
            .filter_map(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "page")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("script exhausted".to_string())))
    }
}

/// A 200 response carrying `page_body(total, titles)`
pub fn ok_response(total: u64, titles: &[&str]) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(200, page_body(total, titles).to_string()))
}
