mod common;

use common::{bristol_fetcher, DATA_SCIENCE_URL};
use course_crawler::apis::{BristolSource, OxfordSource};
use course_crawler::config::FailurePolicy;
use course_crawler::error::{NormalizeError, ScraperError};
use course_crawler::normalizer::{Normalizer, RecordStamp};
use course_crawler::pipeline::{Pipeline, RunReport};
use course_crawler::types::CourseSource;
use course_crawler::storage::InMemorySink;
use course_crawler::types::RawCourse;
use serde_json::json;

fn normalizer() -> Normalizer {
    Normalizer::new(RecordStamp::new("2024-01-05", "2024-2025"))
}

fn raw_batch() -> Vec<RawCourse> {
    vec![
        json!({"link": "https://example.ac.uk/a", "title": "A", "locations": ["Bristol, Bristol"]}),
        json!({"link": "https://example.ac.uk/b", "title": "B", "unexpected_field": true}),
        json!({"title": "C", "tuitions": [{"study_mode": "Full-time", "duration": "1 year", "student_category": "uk"}]}),
        json!({"link": "https://example.ac.uk/d", "title": "D"}),
    ]
    .into_iter()
    .map(|v| v.as_object().cloned().unwrap())
    .collect()
}

#[tokio::test]
async fn skip_policy_reports_failures_and_keeps_going() {
    let sink = InMemorySink::new();
    let result = Pipeline::normalize_batch("file", &raw_batch(), &normalizer(), &sink, FailurePolicy::Skip)
        .await
        .unwrap();

    assert_eq!(result.source_name, "file");
    assert_eq!(result.academic_year, "2024-2025");
    assert_eq!(result.total_records, 4);
    assert_eq!(result.normalized_records, 2);
    assert_eq!(result.failures.len(), 2);
    assert_eq!(result.failures[0].link, "https://example.ac.uk/b");
    assert!(result.failures[0].reason.contains("unexpected_field"));
    assert_eq!(result.failures[1].link, "<unknown>");
    assert!(result.failures[1].reason.contains("tuitions[0].fee"));

    let stored = sink.records_for("file");
    let titles: Vec<_> = stored.iter().map(|r| r.title.as_deref().unwrap()).collect();
    assert_eq!(titles, vec!["A", "D"]);
}

#[tokio::test]
async fn abort_policy_stops_at_first_failure() {
    let sink = InMemorySink::new();
    let err = Pipeline::normalize_batch("file", &raw_batch(), &normalizer(), &sink, FailurePolicy::Abort)
        .await
        .unwrap_err();

    match err {
        ScraperError::Normalize { link, source } => {
            assert_eq!(link, "https://example.ac.uk/b");
            assert!(matches!(source, NormalizeError::SchemaViolation { .. }));
        }
        other => panic!("expected a normalization error, got {other}"),
    }
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn empty_batch_is_not_an_error() {
    let sink = InMemorySink::new();
    let result = Pipeline::normalize_batch("file", &[], &normalizer(), &sink, FailurePolicy::Abort)
        .await
        .unwrap();
    assert_eq!(result.total_records, 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn bristol_run_stores_stamped_records() {
    let fetcher = bristol_fetcher();
    let sink = InMemorySink::new();
    let result = Pipeline::run_for_source(
        &BristolSource::new(),
        &fetcher,
        &normalizer(),
        &sink,
        FailurePolicy::Abort,
    )
    .await
    .unwrap();

    assert_eq!(result.source_name, "bristol");
    assert_eq!(result.total_records, 2);
    assert_eq!(result.normalized_records, 2);
    assert!(result.failures.is_empty());

    let records = sink.records_for("bristol");
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.link.as_deref(), Some(DATA_SCIENCE_URL));
        assert_eq!(record.schema_version, "2024-01-05");
        assert_eq!(record.academic_year, "2024-2025");
        assert_eq!(record.locations[0].value, "Clifton Campus, Bristol");
        assert_eq!(record.modules.len(), 2);
    }
    assert_eq!(sink.all_records(), records);
}

#[tokio::test]
async fn source_failure_propagates() {
    let fetcher = common::FixtureFetcher::new();
    let sink = InMemorySink::new();
    let result = Pipeline::run_for_source(
        &BristolSource::new(),
        &fetcher,
        &normalizer(),
        &sink,
        FailurePolicy::Skip,
    )
    .await;
    assert!(result.is_err());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn aborted_batch_is_reported_as_a_failed_run() {
    let sink = InMemorySink::new();
    let mut report = RunReport::default();
    let completed = report.push(
        "file",
        Pipeline::normalize_batch("file", &raw_batch(), &normalizer(), &sink, FailurePolicy::Abort).await,
    );

    assert!(!completed);
    assert!(!report.is_success());
    assert_eq!(report.failures[0].0, "file");
    assert!(report.into_result().is_err());
    // the record normalized before the failure is kept
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn skip_policy_runs_every_source_but_reports_failures() {
    let fetcher = bristol_fetcher();
    let sink = InMemorySink::new();
    let sources: Vec<Box<dyn CourseSource>> = vec![Box::new(OxfordSource::new()), Box::new(BristolSource::new())];

    let report = Pipeline::run_sources(&sources, &fetcher, &normalizer(), &sink, FailurePolicy::Skip).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].source_name, "bristol");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "oxford");
    assert_eq!(sink.records_for("bristol").len(), 2);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn abort_policy_stops_at_first_failing_source() {
    let fetcher = bristol_fetcher();
    let sink = InMemorySink::new();
    let sources: Vec<Box<dyn CourseSource>> = vec![Box::new(OxfordSource::new()), Box::new(BristolSource::new())];

    let report = Pipeline::run_sources(&sources, &fetcher, &normalizer(), &sink, FailurePolicy::Abort).await;

    assert!(report.results.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(sink.is_empty());
    assert!(!fetcher
        .requested()
        .iter()
        .any(|url| url == course_crawler::constants::BRISTOL_UK_FEES_URL));
}

#[tokio::test]
async fn clean_run_report_yields_results() {
    let fetcher = bristol_fetcher();
    let sink = InMemorySink::new();
    let sources: Vec<Box<dyn CourseSource>> = vec![Box::new(BristolSource::new())];

    let report = Pipeline::run_sources(&sources, &fetcher, &normalizer(), &sink, FailurePolicy::Abort).await;

    assert!(report.is_success());
    let results = report.into_result().unwrap();
    assert_eq!(results[0].normalized_records, 2);
}
