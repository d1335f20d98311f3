// Runner configuration, read once from the environment before any test runs
use crate::error::CommonError;
use crate::time::parse_utc_instant;
use crate::types::Visibility;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub const NOW_OVERRIDE_VAR: &str = "GS_NOW_UTC";
pub const DEFAULT_RESULTS_PATH: &str = "/autograder/results/results.json";
pub const DEFAULT_METADATA_PATH: &str = "/autograder/submission_metadata.json";
pub const DEFAULT_LOCKED_MESSAGE: &str = "This test unlocks on {iso}.";

/// Submission caps enforced by the rate limiter. `None` means uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitCaps {
    pub max_total: Option<u32>,
    pub max_per_day: Option<u32>,
    pub max_per_hour: Option<u32>,
}

impl RateLimitCaps {
    pub fn is_unbounded(&self) -> bool {
        self.max_total.is_none() && self.max_per_day.is_none() && self.max_per_hour.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Substitute for wall-clock time, for deterministic replays of locked tests
    pub now_override: Option<DateTime<Utc>>,
    pub results_path: PathBuf,
    pub metadata_path: PathBuf,
    pub include_locked: bool,
    pub locked_visibility: Visibility,
    pub locked_message_template: String,
    pub caps: RateLimitCaps,
    pub visibility: Option<Visibility>,
    pub stdout_visibility: Option<Visibility>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            now_override: None,
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
            include_locked: false,
            locked_visibility: Visibility::Hidden,
            locked_message_template: DEFAULT_LOCKED_MESSAGE.to_string(),
            caps: RateLimitCaps::default(),
            visibility: None,
            stdout_visibility: None,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, CommonError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys keep their defaults;
    /// set-but-invalid keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CommonError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(NOW_OVERRIDE_VAR).filter(|v| !v.trim().is_empty()) {
            config.now_override = Some(parse_utc_instant(NOW_OVERRIDE_VAR, &raw)?);
        }
        if let Some(path) = lookup("GRADEKIT_RESULTS_PATH") {
            config.results_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("GRADEKIT_METADATA_PATH") {
            config.metadata_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("GRADEKIT_INCLUDE_LOCKED") {
            config.include_locked = parse_bool("GRADEKIT_INCLUDE_LOCKED", &raw)?;
        }
        if let Some(raw) = lookup("GRADEKIT_LOCKED_VISIBILITY") {
            config.locked_visibility = raw.trim().parse()?;
        }
        if let Some(template) = lookup("GRADEKIT_LOCKED_MESSAGE") {
            config.locked_message_template = template;
        }
        if let Some(raw) = lookup("GRADEKIT_VISIBILITY") {
            config.visibility = Some(raw.trim().parse()?);
        }
        if let Some(raw) = lookup("GRADEKIT_STDOUT_VISIBILITY") {
            config.stdout_visibility = Some(raw.trim().parse()?);
        }

        config.caps = RateLimitCaps {
            max_total: parse_cap(&lookup, "GRADEKIT_MAX_TOTAL")?,
            max_per_day: parse_cap(&lookup, "GRADEKIT_MAX_PER_DAY")?,
            max_per_hour: parse_cap(&lookup, "GRADEKIT_MAX_PER_HOUR")?,
        };

        Ok(config)
    }

    /// The single "now" reference for a run
    pub fn now(&self) -> DateTime<Utc> {
        self.now_override.unwrap_or_else(Utc::now)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, CommonError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(CommonError::InvalidSetting {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_cap<F>(lookup: &F, key: &str) -> Result<Option<u32>, CommonError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| CommonError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
    }
}
