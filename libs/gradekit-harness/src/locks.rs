/// Locking Runner - Time-Gated Test Exclusion
///
/// Extends [`JsonTestRunner`]:
/// - Units whose `available_from` lies after "now" are not run
/// - They are excluded from the report's max_score
/// - Optionally they appear as zero-point placeholders saying when they unlock
///
/// "Now" is taken once per run, from the configured override or the wall clock.

use crate::evaluator;
use crate::metadata::{Metadata, Unlock};
use crate::runner::JsonTestRunner;
use crate::unit::{TestSuite, TestUnit};
use chrono::{DateTime, Utc};
use gradekit_common::config::{RunnerConfig, DEFAULT_LOCKED_MESSAGE};
use gradekit_common::types::{Report, ResultRecord, Visibility};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDecision {
    Unlocked,
    Locked { unlock_at: DateTime<Utc> },
}

/// Locked iff an unlock time is declared and `now` is strictly before it
pub fn lock_decision(metadata: &Metadata, now: DateTime<Utc>) -> LockDecision {
    match &metadata.available_from {
        Some(Unlock { at, .. }) if now < *at => LockDecision::Locked { unlock_at: *at },
        _ => LockDecision::Unlocked,
    }
}

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub include_locked_in_output: bool,
    /// `{iso}` is replaced by the unlock instant
    pub locked_message_template: String,
    /// Placeholder visibility when the test declared none
    pub locked_visibility: Visibility,
    pub now: Option<DateTime<Utc>>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            include_locked_in_output: false,
            locked_message_template: DEFAULT_LOCKED_MESSAGE.to_string(),
            locked_visibility: Visibility::Hidden,
            now: None,
        }
    }
}

impl LockConfig {
    pub fn from_runner_config(config: &RunnerConfig) -> Self {
        Self {
            include_locked_in_output: config.include_locked,
            locked_message_template: config.locked_message_template.clone(),
            locked_visibility: config.locked_visibility,
            now: config.now_override,
        }
    }
}

/// A unit held back from this run
#[derive(Debug, Clone)]
pub struct LockedUnit {
    pub unit: TestUnit,
    pub unlock_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct LockingRunner {
    inner: JsonTestRunner,
    config: LockConfig,
}

impl LockingRunner {
    pub fn new(inner: JsonTestRunner, config: LockConfig) -> Self {
        Self { inner, config }
    }

    /// Split units into (runnable, locked) against one reference instant
    pub fn partition(units: &[TestUnit], now: DateTime<Utc>) -> (Vec<TestUnit>, Vec<LockedUnit>) {
        let mut runnable = Vec::new();
        let mut locked = Vec::new();
        for unit in units {
            match lock_decision(unit.metadata(), now) {
                LockDecision::Unlocked => runnable.push(unit.clone()),
                LockDecision::Locked { unlock_at } => locked.push(LockedUnit {
                    unit: unit.clone(),
                    unlock_at,
                }),
            }
        }
        (runnable, locked)
    }

    pub async fn run_suite(&self, suite: &TestSuite) -> Report {
        self.run(&suite.flatten()).await
    }

    #[instrument(skip_all, fields(tests = units.len()))]
    pub async fn run(&self, units: &[TestUnit]) -> Report {
        let now = self.config.now.unwrap_or_else(Utc::now);
        let (runnable, locked) = Self::partition(units, now);

        for held in &locked {
            info!(
                test = %held.unit.name(),
                unlock_at = %held.unlock_at.to_rfc3339(),
                "Test is locked, skipping"
            );
        }

        let mut report = self.inner.run(&runnable).await;
        self.finalize(&mut report, &locked);
        report
    }

    /// Post-process a report produced from the runnable units only
    pub fn finalize(&self, report: &mut Report, locked: &[LockedUnit]) {
        // Recomputed from the records that ran, so nothing locked is ever counted.
        let (_, max_score) = evaluator::totals(&report.tests);
        report.max_score = max_score;

        if self.config.include_locked_in_output {
            report
                .tests
                .extend(locked.iter().map(|held| self.placeholder(held)));
        }
    }

    fn placeholder(&self, held: &LockedUnit) -> ResultRecord {
        let metadata = held.unit.metadata();
        let mut message = self
            .config
            .locked_message_template
            .replace("{iso}", &held.unlock_at.to_rfc3339());
        if let Some(reason) = metadata.available_from.as_ref().and_then(|u| u.reason.as_deref()) {
            message.push_str("\nReason: ");
            message.push_str(reason);
        }

        ResultRecord {
            name: held.unit.display_name().to_string(),
            status: None,
            score: 0.0,
            max_score: 0.0,
            output: message,
            visibility: metadata.visibility.unwrap_or(self.config.locked_visibility),
            tags: metadata.tags.clone(),
            number: metadata.number.clone(),
            ..Default::default()
        }
    }
}
