/// Test Metadata - Static and Run-Scoped Grading Attributes
///
/// **Static attributes** are attached once when a test is defined (weight, number,
/// visibility, tags, ...). Every decorator writes them through [`Metadata::merge`],
/// which is last-write-wins per key and never touches other keys. That is what makes
/// independent decorators commute.
///
/// **Run-scoped attributes** ([`RunScoped`]) are written by the test body during one
/// invocation through setters injected by stateful decorators.

use chrono::{DateTime, Utc};
use gradekit_common::types::{CustomOutputMode, OutputFormat, SortOrder, Visibility};
use serde_json::Value;

/// Weight of a test that never declared one
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// The closed set of static attributes a decorator may attach
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Weight(f64),
    Number(String),
    Visibility(Visibility),
    Tags(Vec<String>),
    HideErrors(String),
    OutputFormat(OutputFormat),
    CustomOutputMode(CustomOutputMode),
    Leaderboard(LeaderboardColumn),
    AvailableFrom(Unlock),
    TimeLimit(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardColumn {
    pub name: String,
    pub order: SortOrder,
}

/// When a time-gated test becomes runnable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlock {
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub weight: Option<f64>,
    /// Kept as a string so "1.10" sorts after "1.9"
    pub number: Option<String>,
    pub visibility: Option<Visibility>,
    pub tags: Option<Vec<String>>,
    pub hide_errors: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub custom_output_mode: Option<CustomOutputMode>,
    pub leaderboard: Option<LeaderboardColumn>,
    pub available_from: Option<Unlock>,
    pub time_limit: Option<u64>,
}

impl Metadata {
    pub fn merge(&mut self, attribute: Attribute) {
        match attribute {
            Attribute::Weight(weight) => self.weight = Some(weight),
            Attribute::Number(number) => self.number = Some(number),
            Attribute::Visibility(visibility) => self.visibility = Some(visibility),
            Attribute::Tags(tags) => self.tags = Some(tags),
            Attribute::HideErrors(message) => self.hide_errors = Some(message),
            Attribute::OutputFormat(format) => self.output_format = Some(format),
            Attribute::CustomOutputMode(mode) => self.custom_output_mode = Some(mode),
            Attribute::Leaderboard(column) => self.leaderboard = Some(column),
            Attribute::AvailableFrom(unlock) => self.available_from = Some(unlock),
            Attribute::TimeLimit(seconds) => self.time_limit = Some(seconds),
        }
    }

    pub fn max_score(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }
}

/// Keys of the run-scoped attributes, one per setter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunScopedKey {
    Score,
    LeaderboardValue,
    CustomOutput,
}

impl RunScopedKey {
    pub fn setter_name(&self) -> &'static str {
        match self {
            RunScopedKey::Score => "set_score",
            RunScopedKey::LeaderboardValue => "set_leaderboard_value",
            RunScopedKey::CustomOutput => "set_custom_output",
        }
    }
}

/// Values a test body reported during one invocation. Absent means never reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunScoped {
    pub score: Option<f64>,
    pub leaderboard_value: Option<Value>,
    pub custom_output: Option<String>,
}
