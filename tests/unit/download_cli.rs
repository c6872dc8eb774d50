//! Unit tests for CLI download command

use chrono::{TimeZone, Utc};
use clap::Parser;
use news_ingest::cli::download::{summary_json, Cli, Commands, DownloadArgs, OutputFormat};
use news_ingest::config::Config;
use news_ingest::downloader::{DownloadAborted, DownloadError, DownloadResult};

fn download_args(cli: Cli) -> DownloadArgs {
    match cli.command {
        Commands::Download(args) => args,
        other => panic!("expected download command, got {other:?}"),
    }
}

#[test]
fn test_download_defaults() {
    let cli = Cli::parse_from(["news-ingest", "download", "--api-key", "k"]);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.metrics_addr.is_none());

    let args = download_args(cli);
    assert_eq!(args.api_key, "k");
    assert_eq!(args.country, "us");
    assert_eq!(args.sort_by, "publishedAt");
    assert_eq!(args.start_page, 1);
    assert!(args.page_size.is_none());
    assert!(!args.dry_run);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "news-ingest",
        "download",
        "--api-key",
        "k",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9000",
        "--dry-run",
    ]);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.metrics_addr.unwrap().port(), 9000);
    assert!(download_args(cli).dry_run);
}

#[test]
fn test_request_uses_config_page_size_and_yesterday() {
    let cli = Cli::parse_from(["news-ingest", "download", "--api-key", "k", "--query", "rust"]);
    let args = download_args(cli);
    let config = Config {
        max_page_size: 50,
        ..Config::default()
    };
    let now = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();

    let request = args.to_request(&config, now).unwrap();
    assert_eq!(request.page_size, 50);
    assert_eq!(request.query(), Some("rust"));
    assert_eq!(request.country(), Some("us"));
    assert_eq!(request.from, Some(Utc.with_ymd_and_hms(2025, 8, 14, 0, 0, 0).unwrap()));
    assert!(request.to.is_none());
    assert!(request.validate().is_ok());
}

#[test]
fn test_request_from_explicit_window() {
    let cli = Cli::parse_from([
        "news-ingest",
        "download",
        "--api-key",
        "k",
        "--from",
        "2025-08-01",
        "--to",
        "2025-08-02",
        "--page-size",
        "100",
        "--start-page",
        "3",
    ]);
    let request = download_args(cli)
        .to_request(&Config::default(), Utc::now())
        .unwrap();

    assert_eq!(request.from, Some(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()));
    assert_eq!(request.to, Some(Utc.with_ymd_and_hms(2025, 8, 2, 23, 59, 59).unwrap()));
    assert_eq!(request.page_size, 100);
    assert_eq!(request.start_page, 3);
}

#[test]
fn test_request_rejects_inverted_window() {
    let cli = Cli::parse_from([
        "news-ingest",
        "download",
        "--api-key",
        "k",
        "--from",
        "2025-08-10",
        "--to",
        "2025-08-01",
    ]);
    assert!(download_args(cli)
        .to_request(&Config::default(), Utc::now())
        .is_err());
}

#[test]
fn test_invalid_output_format_is_rejected() {
    let parsed = Cli::try_parse_from([
        "news-ingest",
        "--output-format",
        "xml",
        "download",
        "--api-key",
        "k",
    ]);
    assert!(parsed.is_err());
}

#[test]
fn test_json_summary_for_aborted_run() {
    let start = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();
    let mut partial = DownloadResult::started_at(start);
    partial.pages_downloaded = 1;
    partial.file_paths.push("/tmp/x/2025/08/a.json".into());

    let outcome: Result<DownloadResult, DownloadAborted> = Err(DownloadAborted {
        error: DownloadError::Cancelled { page: 2 },
        partial: Box::new(partial),
    });
    let summary = summary_json(&outcome);

    assert_eq!(summary["success"], false);
    assert_eq!(summary["cancelled"], true);
    assert_eq!(summary["result"]["pages_downloaded"], 1);
    assert_eq!(summary["result"]["file_paths"][0], "/tmp/x/2025/08/a.json");
    assert_eq!(summary["error"], "download cancelled at page 2");
}
