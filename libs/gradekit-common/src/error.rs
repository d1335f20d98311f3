use std::path::PathBuf;

/// Errors raised while reading configuration, timestamps, or submission metadata.
#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("{field} must be one of {allowed:?}, got {value:?}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("{field}: timestamp string required")]
    MissingTimestamp { field: &'static str },

    #[error("{field}: cannot parse {value:?} as an ISO 8601 timestamp")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
