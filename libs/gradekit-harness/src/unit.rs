/// Test Units - Invokable Grading Checks
///
/// A [`TestUnit`] is a name, its static [`Metadata`] and an async body. Decorators
/// either merge metadata or wrap the body in another layer; neither changes how the
/// unit is invoked. [`TestUnit::invoke`] runs one invocation and classifies it:
///
/// - `Ok(())` → passed
/// - [`AssertionFailure`] or a panic (the `assert!` family) → failed
/// - [`TestTimeout`] → failed with the timeout message
/// - [`TestSkipped`] → skipped
/// - any other error → errored, message preserved

use crate::context::TestContext;
use crate::error::{AssertionFailure, GradingError, TestSkipped, TestTimeout};
use crate::metadata::{Attribute, Metadata, RunScoped};
use futures_util::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type TestFuture = BoxFuture<'static, anyhow::Result<()>>;

/// The invokable part of a unit; decorator layers wrap one body in another
pub type TestBody = Arc<dyn Fn(TestContext) -> TestFuture + Send + Sync>;

#[derive(Clone)]
pub struct TestUnit {
    name: String,
    description: Option<String>,
    metadata: Metadata,
    body: TestBody,
}

impl std::fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl TestUnit {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            metadata: Metadata::default(),
            body: Arc::new(move |ctx| body(ctx).boxed()),
        }
    }

    /// Human-readable name used in the report instead of the identifier
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Attach one static attribute
    pub fn annotate(mut self, attribute: Attribute) -> Self {
        self.metadata.merge(attribute);
        self
    }

    /// Replace the body with a layer built around it
    pub fn wrap<F>(mut self, layer: F) -> Self
    where
        F: FnOnce(TestBody) -> TestBody,
    {
        self.body = layer(self.body);
        self
    }

    /// Apply one decorator
    pub fn with<D: crate::decorators::Decorator>(self, decorator: D) -> Result<Self, GradingError> {
        decorator.decorate(self)
    }

    /// Run the body once with a fresh context and capture what happened.
    /// Never panics and never returns an error: every failure becomes an [`Outcome`].
    pub async fn invoke(&self) -> Invocation {
        let ctx = TestContext::new();
        let start = Instant::now();
        let result = AssertUnwindSafe((self.body)(ctx.clone()))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        let outcome = match result {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(err)) => classify_error(err),
            Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
        };
        let (run_scoped, output) = ctx.snapshot();

        Invocation {
            outcome,
            run_scoped,
            output,
            elapsed,
        }
    }
}

/// What one invocation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    TimedOut(String),
    Errored(String),
    Skipped(String),
}

impl Outcome {
    /// The message shown as "Test Failed: ..." when the test did not pass
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Outcome::Failed(m) | Outcome::TimedOut(m) | Outcome::Errored(m) => Some(m),
            Outcome::Passed | Outcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub outcome: Outcome,
    pub run_scoped: RunScoped,
    pub output: String,
    pub elapsed: Duration,
}

fn classify_error(err: anyhow::Error) -> Outcome {
    if let Some(timeout) = err.downcast_ref::<TestTimeout>() {
        Outcome::TimedOut(timeout.message.clone())
    } else if let Some(failure) = err.downcast_ref::<AssertionFailure>() {
        Outcome::Failed(failure.message.clone())
    } else if let Some(skipped) = err.downcast_ref::<TestSkipped>() {
        Outcome::Skipped(skipped.reason.clone())
    } else {
        Outcome::Errored(format!("{err:#}"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked".to_string()
    }
}

pub enum SuiteItem {
    Unit(TestUnit),
    Group(TestSuite),
}

/// A possibly nested grouping of units
#[derive(Default)]
pub struct TestSuite {
    name: Option<String>,
    items: Vec<SuiteItem>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            items: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn add(mut self, unit: TestUnit) -> Self {
        self.items.push(SuiteItem::Unit(unit));
        self
    }

    pub fn add_group(mut self, group: TestSuite) -> Self {
        self.items.push(SuiteItem::Group(group));
        self
    }

    /// Every unit, depth-first, in encounter order
    pub fn flatten(&self) -> Vec<TestUnit> {
        let mut units = Vec::new();
        self.collect_into(&mut units);
        units
    }

    fn collect_into(&self, units: &mut Vec<TestUnit>) {
        for item in &self.items {
            match item {
                SuiteItem::Unit(unit) => units.push(unit.clone()),
                SuiteItem::Group(group) => group.collect_into(units),
            }
        }
    }
}
