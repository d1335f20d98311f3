/// Invocation Context - Shared Run-Scoped Record and Setters
///
/// One [`TestContext`] is created per invocation by the outermost layer and handed
/// down through every decorator layer to the test body. All layers write into the
/// same record, so stacking wrappers never loses another wrapper's values.
///
/// Stateful decorators install a fresh [`Setter`] for their key before calling the
/// layer below. The body reaches setters through `ctx.set_score(..)` and friends, or
/// takes an owned handle (`ctx.score_setter()`) into detached work.

use crate::error::GradingError;
use crate::metadata::{RunScoped, RunScopedKey};
use serde_json::Value;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

static NEXT_SETTER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct InvocationState {
    record: Mutex<RunScoped>,
    captured: Mutex<String>,
    /// Set once a deadline fires; later writes are dropped
    sealed: AtomicBool,
    deadline_armed: AtomicBool,
}

impl InvocationState {
    fn record(&self) -> MutexGuard<'_, RunScoped> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn captured(&self) -> MutexGuard<'_, String> {
        self.captured.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}

/// Handle to one invocation's run-scoped state
#[derive(Debug, Clone)]
pub struct TestContext {
    state: Arc<InvocationState>,
    setters: Vec<Setter>,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(InvocationState::default()),
            setters: Vec::new(),
        }
    }

    /// Returns a context that additionally exposes a fresh setter for `key`
    pub(crate) fn install(mut self, key: RunScopedKey) -> Self {
        let setter = Setter {
            key,
            id: NEXT_SETTER_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::clone(&self.state),
        };
        self.setters.push(setter);
        self
    }

    /// The innermost installed setter for `key`
    pub fn setter(&self, key: RunScopedKey) -> Result<Setter, GradingError> {
        self.setters
            .iter()
            .rev()
            .find(|s| s.key == key)
            .cloned()
            .ok_or(GradingError::SetterNotInstalled(key.setter_name()))
    }

    pub fn score_setter(&self) -> Result<ScoreSetter, GradingError> {
        self.setter(RunScopedKey::Score).map(ScoreSetter)
    }

    pub fn set_score(&self, score: f64) -> Result<(), GradingError> {
        self.score_setter()?.set(score);
        Ok(())
    }

    pub fn set_leaderboard_value(&self, value: impl Into<Value>) -> Result<(), GradingError> {
        self.setter(RunScopedKey::LeaderboardValue)?
            .write(|record| record.leaderboard_value = Some(value.into()));
        Ok(())
    }

    pub fn set_custom_output(&self, output: impl Into<String>) -> Result<(), GradingError> {
        self.setter(RunScopedKey::CustomOutput)?
            .write(|record| record.custom_output = Some(output.into()));
        Ok(())
    }

    /// Append text to the captured output of this test
    pub fn print(&self, text: impl Display) {
        if self.state.is_sealed() {
            return;
        }
        self.state.captured().push_str(&text.to_string());
    }

    pub fn println(&self, text: impl Display) {
        self.print(format_args!("{text}\n"));
    }

    /// Arm the single deadline this invocation may carry
    pub(crate) fn arm_deadline(&self) -> Result<DeadlineGuard, GradingError> {
        if self.state.deadline_armed.swap(true, Ordering::SeqCst) {
            return Err(GradingError::DeadlineAlreadyArmed);
        }
        Ok(DeadlineGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Freeze the run-scoped record; anything reported afterwards is ignored
    pub(crate) fn seal(&self) {
        self.state.sealed.store(true, Ordering::SeqCst);
    }

    /// Copy out what the body reported so far
    pub(crate) fn snapshot(&self) -> (RunScoped, String) {
        (self.state.record().clone(), self.state.captured().clone())
    }
}

/// A setter handed to the test body by one decorator layer. Every layer builds its
/// own setter with a distinct id; all of them write into the invocation's record.
#[derive(Debug, Clone)]
pub struct Setter {
    key: RunScopedKey,
    id: u64,
    state: Arc<InvocationState>,
}

impl Setter {
    pub fn key(&self) -> RunScopedKey {
        self.key
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn write(&self, apply: impl FnOnce(&mut RunScoped)) {
        if self.state.is_sealed() {
            warn!(
                setter = self.key.setter_name(),
                "Ignoring value reported after the test deadline"
            );
            return;
        }
        apply(&mut self.state.record());
    }
}

/// Owned `set_score` handle, usable from spawned work
#[derive(Debug, Clone)]
pub struct ScoreSetter(Setter);

impl ScoreSetter {
    pub fn set(&self, score: f64) {
        self.0.write(|record| record.score = Some(score));
    }
}

/// Clears the armed deadline on every exit path
#[derive(Debug)]
pub(crate) struct DeadlineGuard {
    state: Arc<InvocationState>,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.state.deadline_armed.store(false, Ordering::SeqCst);
    }
}
