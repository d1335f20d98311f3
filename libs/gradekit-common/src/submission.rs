use crate::error::CommonError;
use crate::time::parse_utc_instant;
use crate::types::Report;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Submission metadata file as written by the grading platform.
/// Only the fields we consume are typed; everything else is carried in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(default)]
    pub previous_submissions: Vec<PreviousSubmission>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousSubmission {
    /// Formatted like "2017-04-06T14:24:48.087023-07:00"
    pub submission_time: String,
    /// `None` when the submission never finished grading
    #[serde(default)]
    pub results: Option<Report>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PreviousSubmission {
    pub fn submitted_at(&self) -> Result<DateTime<Utc>, CommonError> {
        parse_utc_instant("submission_time", &self.submission_time)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.results.as_ref().is_some_and(Report::is_rate_limited)
    }
}

/// Read the metadata file. A missing file yields empty metadata.
pub fn read_metadata(path: &Path) -> Result<SubmissionMetadata, CommonError> {
    if !path.exists() {
        debug!(path = %path.display(), "Submission metadata not found, assuming no history");
        return Ok(SubmissionMetadata::default());
    }

    let content = fs::read_to_string(path).map_err(|source| CommonError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| CommonError::Json {
        path: path.to_path_buf(),
        source,
    })
}
