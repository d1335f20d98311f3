mod suite;

use anyhow::Context;
use gradekit_common::config::RunnerConfig;
use gradekit_common::submission::read_metadata;
use gradekit_common::types::Report;
use gradekit_harness::locks::{LockConfig, LockingRunner};
use gradekit_harness::rate_limit::{load_previous_submissions, RateLimiter};
use gradekit_harness::runner::{write_report, JsonTestRunner};
use gradekit_harness::unit::TestSuite;
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

const DEFAULT_SUBMISSION_DIR: &str = "/autograder/submission";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Gradekit runner booting...");

    let config = RunnerConfig::from_env().map_err(|e| {
        error!("Invalid runner configuration: {}", e);
        e
    })?;

    let submission_dir = PathBuf::from(
        std::env::var("GRADEKIT_SUBMISSION_DIR").unwrap_or_else(|_| DEFAULT_SUBMISSION_DIR.to_string()),
    );
    info!(
        submission_dir = %submission_dir.display(),
        results_path = %config.results_path.display(),
        "Grading submission"
    );

    let suite = suite::build(&submission_dir).context("Failed to build grading suite")?;
    let report = grade(&config, &suite).await?;

    write_report(&report, &config.results_path).context("Failed to write results")?;
    info!(score = report.score, max_score = report.max_score, "Grading complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    // Structured logs for platforms that collect them
    if std::env::var("GRADEKIT_LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Either an earlier submission's report (when a cap is reached) or a fresh run of `suite`
#[instrument(skip_all)]
async fn grade(config: &RunnerConfig, suite: &TestSuite) -> anyhow::Result<Report> {
    let metadata = read_metadata(&config.metadata_path).with_context(|| {
        format!("Failed to read submission metadata from {}", config.metadata_path.display())
    })?;
    let previous = load_previous_submissions(&metadata);
    let limiter = RateLimiter::from_config(config);

    if let Some(earlier) = limiter.earlier_results(&previous)? {
        warn!("Submission cap reached, publishing earlier results without running tests");
        return Ok(earlier);
    }

    let inner = JsonTestRunner::new().run_visibility(config.visibility, config.stdout_visibility);
    let runner = LockingRunner::new(inner, LockConfig::from_runner_config(config));
    let mut report = runner.run_suite(suite).await;

    if let Some(record) = limiter.info_record(&previous, true)? {
        report.tests.insert(0, record);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradekit_common::config::RateLimitCaps;
    use gradekit_common::types::TestStatus;
    use gradekit_harness::unit::TestUnit;
    use std::fs;

    fn config(dir: &std::path::Path, caps: RateLimitCaps) -> RunnerConfig {
        RunnerConfig {
            metadata_path: dir.join("submission_metadata.json"),
            results_path: dir.join("results").join("results.json"),
            caps,
            now_override: Some("2025-03-10T12:00:00Z".parse().unwrap()),
            ..Default::default()
        }
    }

    fn suite() -> TestSuite {
        TestSuite::new().add(TestUnit::new("ok", |_| async { Ok(()) }))
    }

    #[tokio::test]
    async fn test_grades_without_history() {
        let dir = tempfile::tempdir().unwrap();
        let report = grade(&config(dir.path(), RateLimitCaps::default()), &suite())
            .await
            .unwrap();
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.score, 1.0);
    }

    #[tokio::test]
    async fn test_prepends_info_record_under_cap() {
        let dir = tempfile::tempdir().unwrap();
        let caps = RateLimitCaps {
            max_total: Some(5),
            ..Default::default()
        };
        let report = grade(&config(dir.path(), caps), &suite()).await.unwrap();

        assert_eq!(report.tests.len(), 2);
        assert_eq!(report.tests[0].name, "Rate Limit Information");
        assert!(report.tests[0].output.contains("This is your 1st submission"));
        // The info record carries no points
        assert_eq!(report.score, 1.0);
        assert_eq!(report.max_score, 1.0);
    }

    #[tokio::test]
    async fn test_falls_back_when_cap_reached() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("submission_metadata.json"),
            r#"{
                "previous_submissions": [
                    {
                        "submission_time": "2025-03-09T10:00:00.000000-07:00",
                        "results": { "score": 7.0, "tests": [{ "name": "old", "score": 7.0, "max_score": 10.0 }] }
                    }
                ]
            }"#,
        )
        .unwrap();
        let caps = RateLimitCaps {
            max_total: Some(1),
            ..Default::default()
        };
        let config = config(dir.path(), caps);
        let report = grade(&config, &suite()).await.unwrap();

        assert!(report.is_rate_limited());
        assert_eq!(report.score, 7.0);
        assert_eq!(report.tests[0].status, Some(TestStatus::Failed));
        assert_eq!(report.tests[1].name, "old");

        write_report(&report, &config.results_path).unwrap();
        assert!(config.results_path.exists());
    }
}
