use gradekit_common::CommonError;
use std::path::PathBuf;

/// Configuration and harness errors. Decoration-time variants abort the run before any
/// test executes.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("weight must be a finite, non-negative number, got {0}")]
    InvalidWeight(f64),

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("test {test:?} already has a {seconds}s timeout; nested timeouts are not supported")]
    NestedTimeout { test: String, seconds: u64 },

    #[error("a deadline is already armed for this invocation")]
    DeadlineAlreadyArmed,

    #[error("{0} is unavailable: no decorator on this test reports it")]
    SetterNotInstalled(&'static str),

    #[error("failed to write report to {}: {source}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// An expected test failure, recorded with status `failed`.
/// `assert!`-style panics inside a test body are classified the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AssertionFailure {
    pub message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Raised by the timeout guard when a test overruns its deadline
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TestTimeout {
    pub seconds: u64,
    pub message: String,
}

/// Raised by a test body to mark itself skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct TestSkipped {
    pub reason: String,
}

/// Shorthand for failing a test from a body returning `anyhow::Result<()>`:
/// `return Err(fail("expected 3 items"))`.
pub fn fail(message: impl Into<String>) -> anyhow::Error {
    AssertionFailure::new(message).into()
}

/// Shorthand for skipping a test: `return Err(skip("needs network"))`.
pub fn skip(reason: impl Into<String>) -> anyhow::Error {
    TestSkipped {
        reason: reason.into(),
    }
    .into()
}
