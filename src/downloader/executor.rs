//! Download executor: the pagination state machine

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn, Instrument};

use crate::clock::SharedClock;
use crate::config::Config;
use crate::downloader::config::{page_count, INTER_PAGE_DELAY_MS};
use crate::downloader::{
    DownloadAborted, DownloadError, DownloadRequest, DownloadResult, FailureStage,
};
use crate::fetcher::newsapi_http::NewsApiClient;
use crate::fetcher::FetcherError;
use crate::metrics::{record_page_downloaded, record_page_failure, record_rate_limit_wait, DownloadMetrics};
use crate::output::ArtifactWriter;
use crate::publisher::{PublishError, QueuePublisher};
use crate::shutdown::{Cancelled, ShutdownCoordinator, SharedShutdown};

/// Download executor orchestrates the complete download workflow
///
/// Pages are processed strictly one after another. Each page is fetched,
/// written and published before the next request goes out.
pub struct DownloadExecutor {
    client: NewsApiClient,
    writer: Arc<dyn ArtifactWriter>,
    publisher: Arc<dyn QueuePublisher>,
    clock: SharedClock,
    config: Config,
    shutdown: SharedShutdown,
    page_delay: Duration,
}

impl DownloadExecutor {
    /// Create an executor with its own shutdown coordinator
    pub fn new(
        client: NewsApiClient,
        writer: Arc<dyn ArtifactWriter>,
        publisher: Arc<dyn QueuePublisher>,
        clock: SharedClock,
        config: Config,
    ) -> Self {
        Self {
            client,
            writer,
            publisher,
            clock,
            config,
            shutdown: ShutdownCoordinator::shared(),
            page_delay: Duration::from_millis(INTER_PAGE_DELAY_MS),
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Override the pause between consecutive pages
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Shutdown handle observed by this executor
    pub fn shutdown(&self) -> &SharedShutdown {
        &self.shutdown
    }

    /// The API client, e.g. to inspect the quota after a run
    pub fn client(&self) -> &NewsApiClient {
        &self.client
    }

    /// Close the publisher, flushing pending deliveries
    pub async fn close(&self) -> Result<(), PublishError> {
        self.publisher.close().await
    }

    /// Download every page of the result set described by `request`
    ///
    /// # Errors
    /// Returns [`DownloadAborted`] on validation failure, a structured API
    /// error or cancellation. Per-page failures are reported in
    /// [`DownloadResult::errors`] instead.
    pub async fn execute(&self, request: DownloadRequest) -> Result<DownloadResult, DownloadAborted> {
        let span = tracing::info_span!(
            "download",
            search = %request.target(),
            start_page = request.start_page,
            page_size = request.page_size
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: DownloadRequest) -> Result<DownloadResult, DownloadAborted> {
        let mut result = DownloadResult::started_at(self.clock.now());

        if let Err(e) = request.validate() {
            warn!(error = %e, "Rejecting download request");
            return Err(self.abort(result, e.into(), None));
        }

        let metrics = DownloadMetrics::start(request.target());
        let country = request.country().unwrap_or_default().to_string();

        info!(
            country = %country,
            query = request.query().unwrap_or_default(),
            from = ?request.from,
            "Starting news download"
        );

        let mut current_page = request.start_page;
        // The start page is always attempted; its totalResults fixes the real bound
        let mut total_pages = request.start_page;

        while current_page <= total_pages {
            if self.shutdown.is_shutdown_requested() {
                return Err(self.abort(
                    result,
                    DownloadError::Cancelled { page: current_page },
                    Some(&metrics),
                ));
            }

            let fetched = match self.client.fetch_page(&self.shutdown, &request, current_page).await {
                Ok(fetched) => fetched,
                Err(FetcherError::RateLimited(signal)) => {
                    warn!(
                        page = current_page,
                        retry_after_ms = signal.retry_after.as_millis() as u64,
                        "Rate limit hit, waiting before retrying the same page"
                    );
                    record_rate_limit_wait(signal.retry_after);
                    if self.shutdown.sleep(signal.retry_after).await.is_err() {
                        return Err(self.abort(
                            result,
                            DownloadError::Cancelled { page: current_page },
                            Some(&metrics),
                        ));
                    }
                    continue;
                }
                Err(FetcherError::Cancelled) => {
                    return Err(self.abort(
                        result,
                        DownloadError::Cancelled { page: current_page },
                        Some(&metrics),
                    ));
                }
                Err(FetcherError::Api(api)) => {
                    result.record_failure(current_page, FailureStage::Fetch, api.to_string());
                    record_page_failure(FailureStage::Fetch.as_str());
                    return Err(self.abort(
                        result,
                        DownloadError::Api {
                            page: current_page,
                            source: api,
                        },
                        Some(&metrics),
                    ));
                }
                Err(e) => {
                    warn!(page = current_page, error = %e, "Error on page, skipping");
                    result.record_failure(current_page, FailureStage::Fetch, e.to_string());
                    record_page_failure(FailureStage::Fetch.as_str());
                    current_page += 1;
                    continue;
                }
            };

            debug!(
                limit = ?fetched.limits.limit,
                remaining = ?fetched.limits.remaining,
                reset_at = ?fetched.limits.reset_at,
                "API rate limits"
            );

            let path = match self.writer.write_page(&fetched.response, &country, current_page) {
                Ok(path) => path,
                Err(e) => {
                    warn!(page = current_page, error = %e, "Failed to save page");
                    result.record_failure(current_page, FailureStage::Write, e.to_string());
                    record_page_failure(FailureStage::Write.as_str());
                    current_page += 1;
                    continue;
                }
            };

            result.file_paths.push(path.clone());
            result.pages_downloaded += 1;
            record_page_downloaded();
            info!(page = current_page, path = %path.display(), "Saved page");

            if self.publish_artifact(&mut result, current_page, &path).await.is_err() {
                return Err(self.abort(
                    result,
                    DownloadError::Cancelled { page: current_page },
                    Some(&metrics),
                ));
            }

            if current_page == request.start_page {
                result.total_articles = fetched.response.total_results;
                total_pages = page_count(fetched.response.total_results, request.page_size);
                info!(
                    total_results = result.total_articles,
                    total_pages = total_pages,
                    "Total results found"
                );
            }

            info!(
                completed = current_page - request.start_page + 1,
                total_pages = total_pages,
                "Progress"
            );

            current_page += 1;

            if current_page <= total_pages && self.shutdown.sleep(self.page_delay).await.is_err() {
                return Err(self.abort(
                    result,
                    DownloadError::Cancelled { page: current_page },
                    Some(&metrics),
                ));
            }
        }

        result.finish(self.clock.now());
        metrics.record_success(result.pages_downloaded, result.errors.len());

        info!(
            total_articles = result.total_articles,
            pages = result.pages_downloaded,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Download completed"
        );

        Ok(result)
    }

    /// Announce `path`; failures are recorded, only cancellation stops the run
    async fn publish_artifact(
        &self,
        result: &mut DownloadResult,
        page: u32,
        path: &Path,
    ) -> Result<(), Cancelled> {
        let message = path.to_string_lossy();
        match self
            .publisher
            .publish(
                &self.shutdown,
                &self.config.kafka_broker,
                &self.config.kafka_topic,
                &message,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(PublishError::Cancelled) => {
                info!(page = page, path = %message, "Publish interrupted by shutdown");
                Err(Cancelled)
            }
            Err(e) => {
                warn!(page = page, path = %message, error = %e, "Failed to publish file path");
                result.record_failure(page, FailureStage::Publish, format!("publish for {message}: {e}"));
                record_page_failure(FailureStage::Publish.as_str());
                Ok(())
            }
        }
    }

    fn abort(
        &self,
        mut result: DownloadResult,
        error: DownloadError,
        metrics: Option<&DownloadMetrics>,
    ) -> DownloadAborted {
        result.finish(self.clock.now());
        if let Some(metrics) = metrics {
            metrics.record_failure(&error.to_string());
        }
        DownloadAborted {
            error,
            partial: Box::new(result),
        }
    }
}
