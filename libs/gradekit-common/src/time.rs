// ISO 8601 handling shared by the locking layer, the "now" override and the rate limiter
use crate::error::CommonError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

/// Parse an ISO 8601 instant into UTC.
///
/// Accepts a trailing `Z`, an explicit offset, or no offset at all. Values without
/// an offset are taken to be UTC so containers with odd local zones behave.
pub fn parse_utc_instant(field: &'static str, raw: &str) -> Result<DateTime<Utc>, CommonError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CommonError::MissingTimestamp { field });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(CommonError::InvalidTimestamp {
        field,
        value: raw.to_string(),
    })
}
