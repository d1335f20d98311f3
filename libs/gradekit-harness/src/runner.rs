/// Test Runner - Execute Units and Build the Report
///
/// Runs units one at a time in the given order, resolves each through the evaluator,
/// and produces the finalized [`Report`]. A failing, erroring, panicking or timed-out
/// unit never stops the run: every unit yields exactly one record.

use crate::error::GradingError;
use crate::evaluator::{self, LeaderboardBuilder};
use crate::unit::{Outcome, TestSuite, TestUnit};
use gradekit_common::types::{Report, Visibility};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default)]
pub struct JsonTestRunner {
    /// Visibility of records whose test declared none
    pub default_visibility: Visibility,
    /// Run-level `visibility` field of the report
    pub visibility: Option<Visibility>,
    pub stdout_visibility: Option<Visibility>,
}

impl JsonTestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_visibility(mut self, visibility: Visibility) -> Self {
        self.default_visibility = visibility;
        self
    }

    pub fn run_visibility(mut self, visibility: Option<Visibility>, stdout: Option<Visibility>) -> Self {
        self.visibility = visibility;
        self.stdout_visibility = stdout;
        self
    }

    pub async fn run_suite(&self, suite: &TestSuite) -> Report {
        self.run(&suite.flatten()).await
    }

    #[instrument(skip_all, fields(tests = units.len()))]
    pub async fn run(&self, units: &[TestUnit]) -> Report {
        let start = Instant::now();
        let mut records = Vec::with_capacity(units.len());
        let mut leaderboard = LeaderboardBuilder::default();

        info!("Running {} tests", units.len());

        for (idx, unit) in units.iter().enumerate() {
            let invocation = unit.invoke().await;
            let metadata = unit.metadata();

            if let Some(column) = &metadata.leaderboard {
                leaderboard.observe(column, &invocation.run_scoped);
            }

            let record = evaluator::evaluate_test(
                unit.display_name(),
                metadata,
                &invocation,
                self.default_visibility,
            );

            debug!(
                test_num = idx + 1,
                test = %unit.name(),
                status = ?record.status,
                score = record.score,
                max_score = record.max_score,
                execution_ms = invocation.elapsed.as_millis(),
                "Test result"
            );
            if let Outcome::Errored(message) = &invocation.outcome {
                debug!(test = %unit.name(), error = %message, "Test raised an unexpected error");
            }

            records.push(record);
        }

        evaluator::order_records(&mut records);
        let (score, max_score) = evaluator::totals(&records);

        info!(score, max_score, "Run complete");

        Report {
            tests: records,
            score,
            max_score,
            leaderboard: leaderboard.build(),
            execution_time: Some(start.elapsed().as_secs_f64()),
            visibility: self.visibility,
            stdout_visibility: self.stdout_visibility,
            ..Default::default()
        }
    }
}

/// Write the report as pretty JSON, creating parent directories as needed
pub fn write_report(report: &Report, path: &Path) -> Result<(), GradingError> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| GradingError::WriteReport {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| GradingError::WriteReport {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Report written");
    Ok(())
}
