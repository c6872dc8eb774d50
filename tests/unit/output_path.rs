use chrono::{TimeZone, Utc};
use news_ingest::clock::ManualClock;
use news_ingest::output::json::JsonArtifactWriter;
use news_ingest::output::path::ArtifactPathGenerator;
use news_ingest::output::ArtifactWriter;
use news_ingest::PageResponse;
use std::path::{Path, PathBuf};

fn generator() -> ArtifactPathGenerator {
    ArtifactPathGenerator::new(ManualClock::shared(
        Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap(),
    ))
}

#[test]
fn test_path_layout_is_year_month_then_stamped_file() {
    let path = generator().generate(Path::new("/tmp/x"), "us", 2);
    assert_eq!(
        path.file,
        PathBuf::from("/tmp/x/2025/08/2025-08-15_12-00-00_us_page2.json")
    );
    assert_eq!(path.dir, PathBuf::from("/tmp/x/2025/08"));
}

#[test]
fn test_explicit_timestamp_overrides_clock() {
    let at = Utc.with_ymd_and_hms(2024, 1, 3, 4, 5, 6).unwrap();
    let path = generator().generate_at(Path::new("data"), "gb", 11, at);
    assert_eq!(
        path.file,
        PathBuf::from("data/2024/01/2024-01-03_04-05-06_gb_page11.json")
    );
}

#[test]
fn test_hostile_country_stays_inside_root() {
    let path = generator().generate(Path::new("/tmp/x"), "../../etc", 1);
    assert!(path.file.starts_with("/tmp/x/2025/08"));
    assert_eq!(path.file.parent(), Some(Path::new("/tmp/x/2025/08")));
}

#[test]
fn test_writer_places_artifact_under_root() {
    let dir = tempfile::tempdir().unwrap();
    let writer = JsonArtifactWriter::new(generator(), dir.path());
    let page = PageResponse {
        status: "ok".to_string(),
        total_results: 0,
        ..PageResponse::default()
    };

    let written = writer.write_page(&page, "us", 1).unwrap();
    assert!(written.ends_with("2025/08/2025-08-15_12-00-00_us_page1.json"));
    assert!(written.is_absolute());

    let saved: PageResponse = serde_json::from_slice(&std::fs::read(&written).unwrap()).unwrap();
    assert_eq!(saved, page);
}
