use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Outcome of one test as reported to the grading platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
}

/// Who may see a test result, and when
///
/// - `hidden`: never shown to students
/// - `after_due_date`: shown once the (late) due date has passed
/// - `after_published`: shown once grades are explicitly published
/// - `visible`: always shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Hidden,
    AfterDueDate,
    AfterPublished,
    #[default]
    Visible,
}

impl Visibility {
    pub const CHOICES: &'static [&'static str] =
        &["hidden", "after_due_date", "after_published", "visible"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Hidden => "hidden",
            Visibility::AfterDueDate => "after_due_date",
            Visibility::AfterPublished => "after_published",
            Visibility::Visible => "visible",
        }
    }
}

impl FromStr for Visibility {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Visibility::Hidden),
            "after_due_date" => Ok(Visibility::AfterDueDate),
            "after_published" => Ok(Visibility::AfterPublished),
            "visible" => Ok(Visibility::Visible),
            other => Err(CommonError::InvalidChoice {
                field: "visibility",
                value: other.to_string(),
                allowed: Self::CHOICES,
            }),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering hint for a record's `output` (and `name` for synthesized records)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Html,
    SimpleFormat,
    Md,
    Ansi,
}

impl OutputFormat {
    pub const CHOICES: &'static [&'static str] = &["text", "html", "simple_format", "md", "ansi"];
}

impl FromStr for OutputFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "html" => Ok(OutputFormat::Html),
            "simple_format" => Ok(OutputFormat::SimpleFormat),
            "md" => Ok(OutputFormat::Md),
            "ansi" => Ok(OutputFormat::Ansi),
            other => Err(CommonError::InvalidChoice {
                field: "format",
                value: other.to_string(),
                allowed: Self::CHOICES,
            }),
        }
    }
}

/// How a run-reported custom output combines with the default failure text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomOutputMode {
    #[default]
    ErrorOnly,
    Replace,
    Append,
}

impl CustomOutputMode {
    pub const CHOICES: &'static [&'static str] = &["error_only", "replace", "append"];

    /// Whether the mode hands a `set_custom_output` setter to the test body
    pub fn reports_back(&self) -> bool {
        matches!(self, CustomOutputMode::Replace | CustomOutputMode::Append)
    }
}

impl FromStr for CustomOutputMode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error_only" => Ok(CustomOutputMode::ErrorOnly),
            "replace" => Ok(CustomOutputMode::Replace),
            "append" => Ok(CustomOutputMode::Append),
            other => Err(CommonError::InvalidChoice {
                field: "mode",
                value: other.to_string(),
                allowed: Self::CHOICES,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// One per-test entry of the report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_format: Option<OutputFormat>,
    /// Absent on locked-test placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub max_score: f64,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Fields written by other producers that we carry through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One column of the leaderboard section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    /// `null` when the test never reported a value
    pub value: Option<Value>,
    #[serde(default)]
    pub order: SortOrder,
}

/// The full run output consumed by the grading platform
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub tests: Vec<ResultRecord>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub max_score: f64,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Report {
    /// True when an earlier run flagged this report as a rate-limited fallback.
    /// Reports written before the flag existed count as not limited.
    pub fn is_rate_limited(&self) -> bool {
        self.extra_data
            .as_ref()
            .and_then(|extra| extra.get("rate_limited"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn mark_rate_limited(&mut self) {
        self.extra_data = Some(serde_json::json!({ "rate_limited": true }));
    }
}
