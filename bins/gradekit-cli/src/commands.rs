// CLI commands for inspecting submission metadata
use crate::metadata::{self, Field, Query};
use anyhow::{Context, Result};
use gradekit_common::config::{RateLimitCaps, RunnerConfig};
use gradekit_common::submission::read_metadata;
use gradekit_harness::rate_limit::{load_previous_submissions, RateLimiter};
use std::path::Path;
use tracing::debug;

/// Print `output` of the first submission matching `query`.
/// Returns false when nothing matched.
pub fn lookup_student(metadata_file: &Path, query: &str, output: Field) -> Result<bool> {
    let query: Query = query.parse()?;
    let export = metadata::parse_metadata(metadata_file)?;
    debug!(entries = export.len(), field = %query.field, "Searching submission export");

    match metadata::lookup(&export, &query)? {
        Some(info) => {
            println!("{}", info.get(output));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Report where the student stands against the caps, counting the next submission
pub fn rate_limit_status(metadata_file: &Path, caps: RateLimitCaps) -> Result<()> {
    if caps.is_unbounded() {
        println!("No submission caps configured.");
        return Ok(());
    }

    let config = RunnerConfig::from_env().context("Invalid runner configuration")?;
    let metadata = read_metadata(metadata_file)
        .with_context(|| format!("Failed to load {}", metadata_file.display()))?;
    let previous = load_previous_submissions(&metadata);
    let limiter = RateLimiter::new(caps, config.now());

    if let Some(record) = limiter.info_record(&previous, true)? {
        println!("{}", record.output);
        println!();
    }

    match limiter.earlier_results(&previous)? {
        Some(report) => {
            let warning = report.tests.first().map(|t| t.output.as_str()).unwrap_or_default();
            println!("Next submission would be rate limited.");
            println!("{}", warning);
        }
        None => println!("Next submission would be graded."),
    }
    Ok(())
}
