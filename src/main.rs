use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_crawler::apis::create_source;
use course_crawler::config::{Config, FailurePolicy};
use course_crawler::error::ScraperError;
use course_crawler::constants::{self, BRISTOL_SOURCE};
use course_crawler::fetch::ReqwestFetcher;
use course_crawler::logging;
use course_crawler::normalizer::{Normalizer, RecordStamp};
use course_crawler::pipeline::{Pipeline, PipelineResult, RunReport};
use course_crawler::storage::InMemorySink;
use course_crawler::types::RawCourse;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "course_crawler")]
#[command(about = "Postgraduate course scraper and record normalizer")]
#[command(version)]
struct Cli {
    /// What to do with records that fail normalization (skip or abort).
    /// Overrides config.toml and COURSE_FAILURE_POLICY.
    #[arg(long, global = true)]
    failure_policy: Option<FailurePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl sources and print normalized records as JSON
    Crawl {
        /// Sources to run (comma-separated). Available: bristol, oxford, warwick, ucl
        #[arg(long)]
        sources: Option<String>,
    },
    /// Normalize a JSON array of raw records from a file
    Normalize {
        /// Path to the raw records file
        path: PathBuf,
        /// Source name recorded in the run summary
        #[arg(long, default_value = "file")]
        source: String,
    },
    /// List the supported sources
    Sources,
}

fn print_summary(result: &PipelineResult) {
    eprintln!("\n📊 Results for {} ({}):", result.source_name, result.academic_year);
    eprintln!("   Run: {} at {}", result.run_id, result.timestamp);
    eprintln!("   Total records: {}", result.total_records);
    eprintln!("   Normalized: {}", result.normalized_records);
    eprintln!("   Rejected: {}", result.failures.len());
    if !result.failures.is_empty() {
        eprintln!("\n⚠️  Invalid records:");
        for failure in &result.failures {
            eprintln!("   - {}: {}", failure.link, failure.reason);
        }
    }
}

fn load_raw_records(path: &PathBuf) -> Result<Vec<RawCourse>> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<RawCourse> = serde_json::from_str(&data)
        .with_context(|| format!("Expected a JSON array of objects in {}", path.display()))?;
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(policy) = cli.failure_policy {
        config.run.failure_policy = policy;
    }
    let policy = config.run.failure_policy;
    let normalizer = Normalizer::new(RecordStamp::from(&config.run));
    let sink = InMemorySink::new();
    info!(
        "Academic year {}, schema {}, failure policy {}",
        config.run.academic_year, config.run.schema_version, policy
    );

    let report = match cli.command {
        Commands::Sources => {
            for name in constants::get_supported_sources() {
                println!("{name}");
            }
            return Ok(());
        }
        Commands::Crawl { sources } => {
            let source_names: Vec<String> = match sources {
                Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
                None => vec![BRISTOL_SOURCE.to_string()],
            };
            let sources = source_names
                .iter()
                .map(|name| create_source(name).ok_or_else(|| ScraperError::UnknownSource(name.clone())))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let fetcher = ReqwestFetcher::new(&config.http)?;
            Pipeline::run_sources(&sources, &fetcher, &normalizer, &sink, policy).await
        }
        Commands::Normalize { path, source } => {
            let raw_records = load_raw_records(&path)?;
            let mut report = RunReport::default();
            report.push(
                &source,
                Pipeline::normalize_batch(&source, &raw_records, &normalizer, &sink, policy).await,
            );
            report
        }
    };

    for result in &report.results {
        print_summary(result);
    }
    for (name, e) in &report.failures {
        eprintln!("❌ {name}: {e}");
    }

    // Records normalized before a failure are still emitted
    println!("{}", serde_json::to_string_pretty(&sink.all_records())?);
    report.into_result().context("Run did not complete")?;
    Ok(())
}
