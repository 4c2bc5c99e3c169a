use crate::config::FailurePolicy;
use crate::constants::UNKNOWN_LINK;
use crate::error::{Result, ScraperError};
use crate::normalizer::Normalizer;
use crate::storage::CourseSink;
use crate::types::{CourseSource, PageFetcher, RawCourse};
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A raw record that failed normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub link: String,
    pub reason: String,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub source_name: String,
    pub academic_year: String,
    /// UTC start of the run, `%Y-%m-%dT%H:%M:%S`
    pub timestamp: String,
    pub total_records: usize,
    pub normalized_records: usize,
    pub failures: Vec<RecordFailure>,
}

/// Outcome of a multi-source run: the summaries of the sources that
/// completed and the error of every source that did not.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<PipelineResult>,
    pub failures: Vec<(String, ScraperError)>,
}

impl RunReport {
    /// Adds one source's outcome. Returns `false` when the source failed.
    pub fn push(&mut self, source_name: &str, outcome: Result<PipelineResult>) -> bool {
        match outcome {
            Ok(result) => {
                self.results.push(result);
                true
            }
            Err(e) => {
                self.failures.push((source_name.to_string(), e));
                false
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The completed summaries, or the first failure if any source failed.
    pub fn into_result(self) -> Result<Vec<PipelineResult>> {
        match self.failures.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(self.results),
        }
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Collect raw records from `source`, normalize them and hand the valid
    /// ones to `sink`.
    #[instrument(skip_all, fields(source = %source.source_name()))]
    pub async fn run_for_source(
        source: &dyn CourseSource,
        fetcher: &dyn PageFetcher,
        normalizer: &Normalizer,
        sink: &dyn CourseSink,
        policy: FailurePolicy,
    ) -> Result<PipelineResult> {
        let source_name = source.source_name();
        info!("Starting pipeline for {}", source.university_title());
        counter!("course_pipeline_runs_total", "source" => source_name.to_string()).increment(1);
        let started = std::time::Instant::now();

        let raw_records = source.collect(fetcher).await?;
        counter!("course_records_extracted_total", "source" => source_name.to_string())
            .increment(raw_records.len() as u64);
        info!("Collected {} raw records", raw_records.len());

        let result = Self::normalize_batch(source_name, &raw_records, normalizer, sink, policy).await;

        histogram!("course_pipeline_duration_seconds", "source" => source_name.to_string())
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Run every source in order. A failing source is recorded in the
    /// report; under [`FailurePolicy::Abort`] it also ends the run.
    pub async fn run_sources(
        sources: &[Box<dyn CourseSource>],
        fetcher: &dyn PageFetcher,
        normalizer: &Normalizer,
        sink: &dyn CourseSink,
        policy: FailurePolicy,
    ) -> RunReport {
        let mut report = RunReport::default();
        for source in sources {
            let name = source.source_name();
            let outcome = Self::run_for_source(source.as_ref(), fetcher, normalizer, sink, policy).await;
            if let Err(e) = &outcome {
                error!("Pipeline failed for {}: {}", name, e);
            }
            if !report.push(name, outcome) && policy == FailurePolicy::Abort {
                warn!("Abort policy: skipping remaining sources after {}", name);
                break;
            }
        }
        report
    }

    /// Normalize already-extracted records. Under [`FailurePolicy::Skip`]
    /// every failure is reported in the result; under
    /// [`FailurePolicy::Abort`] the first failure ends the batch, leaving
    /// records stored so far in the sink.
    #[instrument(skip(raw_records, normalizer, sink), fields(records = raw_records.len()))]
    pub async fn normalize_batch(
        source_name: &str,
        raw_records: &[RawCourse],
        normalizer: &Normalizer,
        sink: &dyn CourseSink,
        policy: FailurePolicy,
    ) -> Result<PipelineResult> {
        let mut result = PipelineResult {
            run_id: Uuid::new_v4(),
            source_name: source_name.to_string(),
            academic_year: normalizer.stamp().academic_year.clone(),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            total_records: raw_records.len(),
            normalized_records: 0,
            failures: Vec::new(),
        };

        for raw in raw_records {
            let link = raw
                .get("link")
                .and_then(|v| v.as_str())
                .unwrap_or(UNKNOWN_LINK)
                .to_string();

            match normalizer.normalize(raw) {
                Ok(record) => {
                    sink.store(source_name, record).await?;
                    result.normalized_records += 1;
                }
                Err(e) => {
                    counter!("course_records_rejected_total", "source" => source_name.to_string())
                        .increment(1);
                    match policy {
                        FailurePolicy::Skip => {
                            warn!("Skipping invalid record {}: {}", link, e);
                            result.failures.push(RecordFailure {
                                link,
                                reason: e.to_string(),
                            });
                        }
                        FailurePolicy::Abort => {
                            error!("Aborting run on invalid record {}: {}", link, e);
                            return Err(ScraperError::Normalize { link, source: e });
                        }
                    }
                }
            }
        }

        counter!("course_records_normalized_total", "source" => source_name.to_string())
            .increment(result.normalized_records as u64);
        info!(
            "Normalized {} of {} records ({} rejected)",
            result.normalized_records,
            result.total_records,
            result.failures.len()
        );
        Ok(result)
    }
}
