/// Decorators - Declarative Grading Metadata for Test Units
///
/// Each decorator is a value implementing [`Decorator`]. Static decorators merge one
/// [`Attribute`]; stateful decorators additionally wrap the body so the test can report
/// a value back. Validation happens when the decorator is built or applied, so a
/// misconfigured suite fails before anything is graded.
///
/// ```ignore
/// let unit = TestUnit::new("test_sort", |ctx| async move {
///     ctx.set_score(sorted_fraction()? * 10.0)?;
///     Ok(())
/// })
/// .with(PartialCredit(10.0))?
/// .with(Timeout::seconds(5))?
/// .with(SetVisibility::parse("after_due_date")?)?;
/// ```

use crate::context::TestContext;
use crate::error::GradingError;
use crate::metadata::{Attribute, LeaderboardColumn, RunScopedKey, Unlock};
use crate::timeout;
use crate::unit::{TestBody, TestUnit};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use gradekit_common::time::parse_utc_instant;
use gradekit_common::types::{CustomOutputMode, OutputFormat, SortOrder, Visibility};
use std::sync::Arc;

pub trait Decorator {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError>;
}

impl<D: Decorator + ?Sized> Decorator for &D {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        (**self).decorate(unit)
    }
}

impl<D: Decorator + ?Sized> Decorator for Box<D> {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        (**self).decorate(unit)
    }
}

/// Apply decorators as they would be stacked in source: the first element is the
/// outermost, so the last element is applied first.
pub fn decorate<D: Decorator>(unit: TestUnit, decorators: &[D]) -> Result<TestUnit, GradingError> {
    decorators
        .iter()
        .rev()
        .try_fold(unit, |unit, decorator| decorator.decorate(unit))
}

/// Expose a setter for `key` to every invocation of `unit`.
///
/// Each invocation gets a fresh setter bound to the invocation's shared record, so
/// stacking several of these (in any order) keeps every layer's reported values.
pub fn report_back(unit: TestUnit, key: RunScopedKey) -> TestUnit {
    unit.wrap(move |inner: TestBody| -> TestBody {
        Arc::new(move |ctx: TestContext| inner(ctx.install(key)))
    })
}

/// Points the test is worth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight(pub f64);

impl Decorator for Weight {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::Weight(validate_weight(self.0)?)))
    }
}

fn validate_weight(weight: f64) -> Result<f64, GradingError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(weight)
    } else {
        Err(GradingError::InvalidWeight(weight))
    }
}

/// Sort key on the grading platform, e.g. "1.2"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number(pub String);

impl Number {
    pub fn new(number: impl ToString) -> Self {
        Self(number.to_string())
    }
}

impl Decorator for Number {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::Number(self.0.clone())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetVisibility(pub Visibility);

impl SetVisibility {
    /// Rejects anything outside hidden / after_due_date / after_published / visible
    pub fn parse(value: &str) -> Result<Self, GradingError> {
        Ok(Self(value.parse()?))
    }
}

impl Decorator for SetVisibility {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::Visibility(self.0)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }
}

impl Decorator for Tags {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::Tags(self.0.clone())))
    }
}

/// Show this message instead of the failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HideErrors(pub String);

impl Default for HideErrors {
    fn default() -> Self {
        Self("Test failed".to_string())
    }
}

impl Decorator for HideErrors {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::HideErrors(self.0.clone())))
    }
}

/// Marks the test as feeding a leaderboard column; the body reports the value with
/// `ctx.set_leaderboard_value(..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    pub column: String,
    pub order: SortOrder,
}

impl Leaderboard {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

impl Decorator for Leaderboard {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        let unit = unit.annotate(Attribute::Leaderboard(LeaderboardColumn {
            name: self.column.clone(),
            order: self.order,
        }));
        Ok(report_back(unit, RunScopedKey::LeaderboardValue))
    }
}

/// Test worth `weight` points whose score the body reports with `ctx.set_score(..)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialCredit(pub f64);

impl Decorator for PartialCredit {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        let unit = unit.annotate(Attribute::Weight(validate_weight(self.0)?));
        Ok(report_back(unit, RunScopedKey::Score))
    }
}

/// Wall-clock limit for one invocation, in whole seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeout {
    pub seconds: u64,
    pub message: Option<String>,
}

impl Timeout {
    pub fn seconds(seconds: u64) -> Self {
        Self {
            seconds,
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Decorator for Timeout {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        if self.seconds == 0 {
            return Err(GradingError::ZeroTimeout);
        }
        if let Some(existing) = unit.metadata().time_limit {
            return Err(GradingError::NestedTimeout {
                test: unit.name().to_string(),
                seconds: existing,
            });
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| timeout::default_message(self.seconds));
        let unit = unit.annotate(Attribute::TimeLimit(self.seconds));
        Ok(timeout::bound(unit, self.seconds, message))
    }
}

/// Output format of the record, plus how a body-reported output combines with the
/// failure text. `replace` and `append` give the body `ctx.set_custom_output(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomOutput {
    pub format: OutputFormat,
    pub mode: CustomOutputMode,
}

impl CustomOutput {
    pub fn new(format: OutputFormat, mode: CustomOutputMode) -> Self {
        Self { format, mode }
    }

    /// Validate both values against the allowed sets
    pub fn parse(format: &str, mode: &str) -> Result<Self, GradingError> {
        Ok(Self {
            format: format.parse()?,
            mode: mode.parse()?,
        })
    }
}

impl Decorator for CustomOutput {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        let unit = unit
            .annotate(Attribute::OutputFormat(self.format))
            .annotate(Attribute::CustomOutputMode(self.mode));
        if self.mode.reports_back() {
            Ok(report_back(unit, RunScopedKey::CustomOutput))
        } else {
            Ok(unit)
        }
    }
}

/// Keep the test locked (not run, not counted) until `at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableFrom {
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl AvailableFrom {
    pub fn at<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        Self {
            at: at.with_timezone(&Utc),
            reason: None,
        }
    }

    /// A timestamp without zone information is taken as UTC
    pub fn naive(at: NaiveDateTime) -> Self {
        Self {
            at: at.and_utc(),
            reason: None,
        }
    }

    /// Accepts "2025-10-01T09:00:00Z", an explicit offset, or a naive timestamp (UTC)
    pub fn parse(when: &str) -> Result<Self, GradingError> {
        Ok(Self {
            at: parse_utc_instant("available_from", when)?,
            reason: None,
        })
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = (!reason.is_empty()).then_some(reason);
        self
    }
}

impl Decorator for AvailableFrom {
    fn decorate(&self, unit: TestUnit) -> Result<TestUnit, GradingError> {
        Ok(unit.annotate(Attribute::AvailableFrom(Unlock {
            at: self.at,
            reason: self.reason.clone(),
        })))
    }
}
