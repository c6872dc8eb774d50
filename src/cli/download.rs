//! Download command implementation

use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::downloader::config::RUN_DEADLINE;
use crate::downloader::{DownloadAborted, DownloadExecutor, DownloadRequest, DownloadResult};
use crate::fetcher::newsapi_http::NewsApiClient;
use crate::fetcher::transport::ReqwestTransport;
use crate::output::json::JsonArtifactWriter;
use crate::output::path::ArtifactPathGenerator;
use crate::publisher::memory::MemoryBroker;
use crate::publisher::producer::BrokerPublisher;
use crate::publisher::QueuePublisher;
use crate::shutdown::SharedShutdown;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::CliError;

/// Try to parse a datetime in RFC3339 format
///
/// Handles both inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Parse the start of the publication window from YYYY-MM-DD or RFC3339.
///
/// A bare date means start-of-day (00:00:00 UTC).
pub fn parse_from_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid --from time: {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid --from time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Parse the end of the publication window from YYYY-MM-DD or RFC3339.
///
/// A bare date means end-of-day (23:59:59 UTC) so the whole day is included.
/// The provider only accepts whole seconds.
pub fn parse_to_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid --to time: {e}")))?;
    let datetime = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| CliError::InvalidArgument("Invalid --to time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Midnight UTC at the start of the day before `now`
pub fn default_from(now: DateTime<Utc>) -> DateTime<Utc> {
    let yesterday = now.date_naive() - ChronoDuration::days(1);
    yesterday
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

/// Resolve the effective configuration
///
/// A config file that cannot be loaded is not fatal: the run continues on
/// defaults plus environment, as scheduled runs have always done. Environment
/// overrides are applied last in both cases.
pub fn resolve_config(path: Option<&Path>) -> Result<Config, CliError> {
    let mut config = match path {
        Some(path) => match Config::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Err(e) => {
                warn!(error = %e, "Failed to load config file, using environment configuration");
                Config::default()
            }
        },
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// News ingestion CLI
#[derive(Parser, Debug)]
#[command(name = "news-ingest")]
#[command(
    about = "Download paginated news results and announce each saved page on a message queue",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// JSON configuration file (falls back to environment configuration)
    #[arg(long, global = true, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every page of a search and publish the saved file paths
    Download(DownloadArgs),

    /// Validate and print the effective configuration
    Validate(super::ValidateCommand),
}

/// Download command arguments
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Provider API key
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Two-letter country code (pass an empty value for query-only searches)
    #[arg(long, env = "NEWS_COUNTRY", default_value = "us")]
    pub country: String,

    /// Free-text search query
    #[arg(long, env = "NEWS_QUERY")]
    pub query: Option<String>,

    /// Two-letter language code
    #[arg(long)]
    pub language: Option<String>,

    /// Result ordering: relevancy, popularity or publishedAt
    #[arg(long, default_value = "publishedAt")]
    pub sort_by: String,

    /// Oldest publication time (YYYY-MM-DD or RFC3339, default: yesterday 00:00 UTC)
    #[arg(long)]
    pub from: Option<String>,

    /// Newest publication time (YYYY-MM-DD or RFC3339)
    #[arg(long)]
    pub to: Option<String>,

    /// First page to fetch
    #[arg(long, default_value_t = 1)]
    pub start_page: u32,

    /// Results per page (default: the configured max_page_size)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Publish to an in-memory broker instead of Kafka
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl DownloadArgs {
    /// Build the request this invocation describes
    pub fn to_request(&self, config: &Config, now: DateTime<Utc>) -> Result<DownloadRequest, CliError> {
        let from = match &self.from {
            Some(raw) => parse_from_flexible(raw)?,
            None => default_from(now),
        };
        let to = self.to.as_deref().map(parse_to_flexible).transpose()?;

        if let Some(to) = to {
            if to < from {
                return Err(CliError::InvalidArgument(format!(
                    "--to ({to}) is earlier than --from ({from})"
                )));
            }
        }

        let mut request = DownloadRequest::new(self.api_key.clone(), self.country.clone())
            .with_window(Some(from), to)
            .with_page_size(self.page_size.unwrap_or(config.max_page_size))
            .with_start_page(self.start_page);
        if let Some(query) = &self.query {
            request = request.with_query(query.clone());
        }
        request.language = self.language.clone();
        request.sort_by = self.sort_by.clone();
        Ok(request)
    }

    /// Execute the download command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = resolve_config(cli.config.as_deref())?;

        if let Some(addr) = cli.metrics_addr {
            crate::metrics::init_metrics(addr).await?;
        }

        let clock: SharedClock = Arc::new(SystemClock);
        let request = self.to_request(&config, clock.now())?;

        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        let client = NewsApiClient::new(transport, clock.clone(), &config);
        let writer = Arc::new(JsonArtifactWriter::new(
            ArtifactPathGenerator::new(clock.clone()),
            &config.output_dir,
        ));
        let publisher = self.build_publisher(&config)?;

        let executor = DownloadExecutor::new(client, writer, publisher, clock, config)
            .with_shutdown(shutdown.clone());

        let deadline = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                tokio::time::sleep(RUN_DEADLINE).await;
                warn!(
                    deadline_secs = RUN_DEADLINE.as_secs(),
                    "Run deadline reached, cancelling download"
                );
                shutdown.request_shutdown();
            }
        });

        let outcome = executor.execute(request).await;
        deadline.abort();

        match cli.output_format {
            OutputFormat::Json => output_json(&outcome),
            OutputFormat::Human => output_human(&outcome),
        }

        if let Err(e) = executor.close().await {
            warn!(error = %e, "Failed to close publisher cleanly");
        }

        outcome.map(|_| ()).map_err(CliError::from)
    }

    fn build_publisher(&self, config: &Config) -> Result<Arc<dyn QueuePublisher>, CliError> {
        if self.dry_run {
            info!("Dry run: publishing to an in-memory broker");
            let (broker, events) = MemoryBroker::new();
            return Ok(Arc::new(BrokerPublisher::new(broker, events)));
        }

        connect_broker(config)
    }
}

#[cfg(feature = "kafka")]
fn connect_broker(config: &Config) -> Result<Arc<dyn QueuePublisher>, CliError> {
    let (broker, events) = crate::publisher::kafka::KafkaBroker::connect(&config.kafka_broker)?;
    Ok(Arc::new(BrokerPublisher::new(broker, events)))
}

#[cfg(not(feature = "kafka"))]
fn connect_broker(config: &Config) -> Result<Arc<dyn QueuePublisher>, CliError> {
    Err(CliError::InvalidArgument(format!(
        "cannot publish to {}: built without the `kafka` feature (use --dry-run)",
        config.kafka_broker
    )))
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Summary document printed in JSON mode
pub fn summary_json(outcome: &Result<DownloadResult, DownloadAborted>) -> serde_json::Value {
    match outcome {
        Ok(result) => serde_json::json!({
            "success": true,
            "result": result,
            "error": null,
        }),
        Err(aborted) => serde_json::json!({
            "success": false,
            "result": aborted.partial,
            "error": aborted.error.to_string(),
            "cancelled": aborted.is_cancelled(),
        }),
    }
}

fn output_json(outcome: &Result<DownloadResult, DownloadAborted>) {
    match serde_json::to_string(&summary_json(outcome)) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "Failed to encode summary"),
    }
}

fn output_human(outcome: &Result<DownloadResult, DownloadAborted>) {
    let result = match outcome {
        Ok(result) => {
            println!("\nDownload completed successfully!");
            result
        }
        Err(aborted) => {
            eprintln!("\nDownload failed!");
            eprintln!("Error: {}", aborted.error);
            error!(error = %aborted.error, "Download failed");
            aborted.partial.as_ref()
        }
    };

    println!("Total articles: {}", result.total_articles);
    println!("Pages downloaded: {}", result.pages_downloaded);
    println!("Duration: {:.1}s", result.duration.as_secs_f64());
    if !result.file_paths.is_empty() {
        println!("Files:");
        for path in &result.file_paths {
            println!("  {}", path.display());
        }
    }
    if result.has_errors() {
        println!("Page errors: {}", result.errors.len());
        for failure in &result.errors {
            println!("  {failure}");
        }
    }
}
