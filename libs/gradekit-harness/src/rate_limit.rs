/// Rate Limiter - Fall Back to Earlier Results Past a Submission Cap
///
/// Counts prior graded submissions from the platform's submission metadata against up to
/// three caps (total, per rolling 24h, per rolling hour). When a cap is reached the current
/// submission is not graded; instead the report of the N-th oldest submission in that scope
/// is returned with a warning record in front of it.
///
/// **Counting rules:**
/// - Submissions without results never finished grading and do not count
/// - Submissions that were themselves rate-limited fallbacks do not count
/// - Windows include submissions strictly after `now - 24h` / `now - 1h`

use crate::error::GradingError;
use chrono::{DateTime, Duration, Utc};
use gradekit_common::config::{RateLimitCaps, RunnerConfig};
use gradekit_common::submission::{PreviousSubmission, SubmissionMetadata};
use gradekit_common::types::{OutputFormat, Report, ResultRecord, TestStatus, Visibility};
use tracing::{info, warn};

pub const WARNING_RECORD_NAME: &str = "Submission Limit Exceeded";
pub const INFO_RECORD_NAME: &str = "Rate Limit Information";

/// Prior submissions that count against the caps
pub fn load_previous_submissions(metadata: &SubmissionMetadata) -> Vec<PreviousSubmission> {
    let all = &metadata.previous_submissions;
    info!(count = all.len(), "Previous submissions in metadata");

    let counted: Vec<PreviousSubmission> = all
        .iter()
        .filter(|s| s.results.is_some())
        .filter(|s| !s.is_rate_limited())
        .cloned()
        .collect();

    info!(
        count = counted.len(),
        "Previous submissions remaining after dropping ungraded and rate-limited ones"
    );
    counted
}

/// Copy of the earlier report with the warning record at index 0, flagged as rate limited
pub fn prepend_rate_limit_warning(previous: &PreviousSubmission, reason: &str) -> Report {
    let mut report = previous.results.clone().unwrap_or_default();
    let warning = ResultRecord {
        name: WARNING_RECORD_NAME.to_string(),
        name_format: Some(OutputFormat::Text),
        status: Some(TestStatus::Failed),
        output: format!(
            "WARNING: Rate Limit exceeded. The current submission will not be evaluated. \
             Falling back to earlier submission from {}.  Reason: {}",
            previous.submission_time, reason
        ),
        output_format: OutputFormat::Text,
        visibility: Visibility::Visible,
        ..Default::default()
    };
    report.tests.insert(0, warning);
    report.mark_rate_limited();
    report
}

/// 1st, 2nd, 3rd, 4th, ..., 11th, 12th, 13th, ..., 21st
pub fn ordinal(rank: usize) -> String {
    let suffix = match (rank % 10, rank % 100) {
        (1, r) if r != 11 => "st",
        (2, r) if r != 12 => "nd",
        (3, r) if r != 13 => "rd",
        _ => "th",
    };
    format!("{rank}{suffix}")
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Total,
    Day,
    Hour,
}

impl Scope {
    fn window(&self) -> Option<Duration> {
        match self {
            Scope::Total => None,
            Scope::Day => Some(Duration::hours(24)),
            Scope::Hour => Some(Duration::hours(1)),
        }
    }

    fn limit_reason(&self, cap: u32, count: usize) -> String {
        let (limit, history) = match self {
            Scope::Total => (
                format!("Limit of {cap} maximum total submissions is in effect."),
                format!("You previously submitted {count} times."),
            ),
            Scope::Day => (
                format!("Limit of {cap} maximum submissions per 24 hours is in effect."),
                format!("In the past 24h, you submitted {count} times."),
            ),
            Scope::Hour => (
                format!("Limit of {cap} maximum submissions per hour is in effect."),
                format!("In the past hour, you submitted {count} times."),
            ),
        };
        format!("{limit} {history} Please contact the course staff if you believe this is an error.")
    }

    fn info_line(&self, cap: u32, count: usize) -> String {
        let left = i64::from(cap) - count as i64;
        match self {
            Scope::Total => format!(
                "Cap on total submissions: {cap}. This is your {} submission. \
                 You have {left} submissions left (total).",
                ordinal(count)
            ),
            Scope::Day => format!(
                "Cap on submissions per 24h: {cap}. In the past 24 hours, you submitted {count} times. \
                 You have {left} attempts left in the current 24h window."
            ),
            Scope::Hour => format!(
                "Cap on submissions per hour: {cap}. In the past hour, you submitted {count} times. \
                 You have {left} attempts left in the current hour."
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    caps: RateLimitCaps,
    now: DateTime<Utc>,
}

impl RateLimiter {
    pub fn new(caps: RateLimitCaps, now: DateTime<Utc>) -> Self {
        Self { caps, now }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.caps, config.now())
    }

    fn scopes(&self) -> [(Scope, Option<u32>); 3] {
        [
            (Scope::Total, self.caps.max_total),
            (Scope::Day, self.caps.max_per_day),
            (Scope::Hour, self.caps.max_per_hour),
        ]
    }

    /// Submissions in `scope`, oldest first
    fn in_scope<'a>(
        &self,
        scope: Scope,
        timed: &[(DateTime<Utc>, &'a PreviousSubmission)],
    ) -> Vec<(DateTime<Utc>, &'a PreviousSubmission)> {
        let mut selected: Vec<_> = match scope.window() {
            None => timed.to_vec(),
            Some(window) => {
                let start = self.now - window;
                timed.iter().copied().filter(|(at, _)| *at > start).collect()
            }
        };
        selected.sort_by_key(|(at, _)| *at);
        selected
    }

    /// The report to publish instead of grading this submission, if any cap is reached.
    /// Caps are checked total, then 24h, then hourly.
    pub fn earlier_results(
        &self,
        previous: &[PreviousSubmission],
    ) -> Result<Option<Report>, GradingError> {
        if self.caps.is_unbounded() {
            return Ok(None);
        }
        let timed = with_times(previous)?;

        for (scope, cap) in self.scopes() {
            let Some(cap) = cap else { continue };
            let selected = self.in_scope(scope, &timed);
            if selected.len() < cap as usize {
                continue;
            }

            // A cap of 0 falls back to the newest submission in scope.
            let index = match cap {
                0 => selected.len().saturating_sub(1),
                cap => cap as usize - 1,
            };
            let Some((_, fallback)) = selected.get(index) else {
                continue;
            };
            warn!(
                ?scope,
                cap,
                submissions = selected.len(),
                fallback = %fallback.submission_time,
                "Submission cap reached, reusing earlier results"
            );
            let reason = scope.limit_reason(cap, selected.len());
            return Ok(Some(prepend_rate_limit_warning(fallback, &reason)));
        }
        Ok(None)
    }

    /// Informational record listing each configured cap and what is left of it
    pub fn info_record(
        &self,
        previous: &[PreviousSubmission],
        plus_one_for_current: bool,
    ) -> Result<Option<ResultRecord>, GradingError> {
        if self.caps.is_unbounded() {
            return Ok(None);
        }
        let timed = with_times(previous)?;
        let current = usize::from(plus_one_for_current);

        let lines: Vec<String> = self
            .scopes()
            .into_iter()
            .filter_map(|(scope, cap)| {
                let count = self.in_scope(scope, &timed).len() + current;
                cap.map(|cap| scope.info_line(cap, count))
            })
            .collect();

        Ok(Some(ResultRecord {
            name: INFO_RECORD_NAME.to_string(),
            name_format: Some(OutputFormat::Text),
            status: Some(TestStatus::Passed),
            output: lines.join("\n\n"),
            output_format: OutputFormat::SimpleFormat,
            ..Default::default()
        }))
    }
}

fn with_times(
    previous: &[PreviousSubmission],
) -> Result<Vec<(DateTime<Utc>, &PreviousSubmission)>, GradingError> {
    previous
        .iter()
        .map(|s| -> Result<_, GradingError> { Ok((s.submitted_at()?, s)) })
        .collect()
}

/// Shorthand over [`RateLimiter::earlier_results`] starting from raw metadata
pub fn earlier_results_if_rate_limited(
    metadata: &SubmissionMetadata,
    caps: RateLimitCaps,
    now: DateTime<Utc>,
) -> Result<Option<Report>, GradingError> {
    if caps.is_unbounded() {
        return Ok(None);
    }
    RateLimiter::new(caps, now).earlier_results(&load_previous_submissions(metadata))
}

/// Shorthand over [`RateLimiter::info_record`] starting from raw metadata
pub fn rate_limit_info(
    metadata: &SubmissionMetadata,
    caps: RateLimitCaps,
    plus_one_for_current: bool,
    now: DateTime<Utc>,
) -> Result<Option<ResultRecord>, GradingError> {
    if caps.is_unbounded() {
        return Ok(None);
    }
    RateLimiter::new(caps, now).info_record(&load_previous_submissions(metadata), plus_one_for_current)
}
