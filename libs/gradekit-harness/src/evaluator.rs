/// Result Evaluator - Metadata Resolution and Scoring Logic
///
/// **Core Responsibility:**
/// Turn (static metadata, invocation outcome, reported values) into one
/// [`ResultRecord`], and many records into report totals.
///
/// **Critical Properties:**
/// - Knows nothing about how tests execute
/// - Pure functions: same inputs, same record
///
/// **Scoring Rules:**
/// - max_score = declared weight, default 1.0, regardless of outcome
/// - passed without a reported score → score = max_score
/// - reported score → that score; status is passed only if the test passed
///   and the score reaches max_score
/// - failed / timed out / errored without a reported score → 0
/// - skipped → 0 / 0, no status, excluded from totals
///
/// **Output Rules:**
/// - captured output first, then "Test Failed: <message>" (or the hide-errors text)
///   on its own line
/// - custom output `replace` swaps in the reported text wholesale when one was set
/// - custom output `append` adds the reported text after a blank line

use crate::metadata::{LeaderboardColumn, Metadata, RunScoped};
use crate::unit::{Invocation, Outcome};
use gradekit_common::types::{CustomOutputMode, LeaderboardEntry, ResultRecord, TestStatus, Visibility};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub fn failure_text(message: &str) -> String {
    format!("Test Failed: {}\n", message)
}

/// Resolve one test's record
pub fn evaluate_test(
    name: &str,
    metadata: &Metadata,
    invocation: &Invocation,
    default_visibility: Visibility,
) -> ResultRecord {
    let max_score = metadata.max_score();
    let reported = invocation.run_scoped.score;

    let (status, score, max_score) = match &invocation.outcome {
        Outcome::Passed => match reported {
            Some(score) if score < max_score => (Some(TestStatus::Failed), score, max_score),
            Some(score) => (Some(TestStatus::Passed), score, max_score),
            None => (Some(TestStatus::Passed), max_score, max_score),
        },
        Outcome::Failed(_) | Outcome::TimedOut(_) => {
            (Some(TestStatus::Failed), reported.unwrap_or(0.0), max_score)
        }
        Outcome::Errored(_) => (Some(TestStatus::Error), reported.unwrap_or(0.0), max_score),
        Outcome::Skipped(_) => (None, 0.0, 0.0),
    };

    ResultRecord {
        name: name.to_string(),
        status,
        score,
        max_score,
        output: compose_output(metadata, invocation),
        output_format: metadata.output_format.unwrap_or_default(),
        visibility: metadata.visibility.unwrap_or(default_visibility),
        tags: metadata.tags.clone(),
        number: metadata.number.clone(),
        ..Default::default()
    }
}

fn compose_output(metadata: &Metadata, invocation: &Invocation) -> String {
    let mut output = invocation.output.clone();

    let failure = match &invocation.outcome {
        Outcome::Skipped(reason) => Some(format!("Skipped: {}\n", reason)),
        outcome => outcome.failure_message().map(|message| {
            metadata
                .hide_errors
                .clone()
                .unwrap_or_else(|| failure_text(message))
        }),
    };
    if let Some(text) = failure {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&text);
    }

    let mode = metadata.custom_output_mode.unwrap_or_default();
    match (mode, invocation.run_scoped.custom_output.as_deref()) {
        (CustomOutputMode::Replace, Some(custom)) => custom.to_string(),
        (CustomOutputMode::Append, Some(custom)) => {
            let base = output.trim_end_matches('\n');
            if base.is_empty() {
                custom.to_string()
            } else {
                format!("{}\n\n{}", base, custom)
            }
        }
        _ => output,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NumberSegment {
    Numeric(u64),
    Text(String),
}

fn number_key(number: &str) -> Vec<NumberSegment> {
    number
        .split('.')
        .map(|segment| match segment.trim().parse::<u64>() {
            Ok(n) => NumberSegment::Numeric(n),
            Err(_) => NumberSegment::Text(segment.to_string()),
        })
        .collect()
}

/// Compare declared numbers so that "1.2" < "1.10" < "2"
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    number_key(a).cmp(&number_key(b)).then_with(|| a.cmp(b))
}

/// Sort by declared number when every record has one; otherwise keep discovery order
pub fn order_records(records: &mut [ResultRecord]) {
    if records.is_empty() || records.iter().any(|r| r.number.is_none()) {
        return;
    }
    records.sort_by(|a, b| {
        compare_numbers(
            a.number.as_deref().unwrap_or_default(),
            b.number.as_deref().unwrap_or_default(),
        )
    });
}

/// Collects one leaderboard entry per distinct column, in first-declaration order
#[derive(Debug, Default)]
pub struct LeaderboardBuilder {
    entries: Vec<LeaderboardEntry>,
    index: BTreeMap<String, usize>,
}

impl LeaderboardBuilder {
    pub fn observe(&mut self, column: &LeaderboardColumn, run_scoped: &RunScoped) {
        let value: Option<Value> = run_scoped.leaderboard_value.clone();
        match self.index.get(&column.name) {
            Some(&idx) => {
                if value.is_some() {
                    self.entries[idx].value = value;
                }
            }
            None => {
                self.index.insert(column.name.clone(), self.entries.len());
                self.entries.push(LeaderboardEntry {
                    name: column.name.clone(),
                    value,
                    order: column.order,
                });
            }
        }
    }

    pub fn build(self) -> Vec<LeaderboardEntry> {
        self.entries
    }
}

/// (score, max_score) summed over records
pub fn totals(records: &[ResultRecord]) -> (f64, f64) {
    records
        .iter()
        .fold((0.0, 0.0), |(score, max), r| (score + r.score, max + r.max_score))
}
