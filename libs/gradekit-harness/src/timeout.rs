/// Timeout Guard - Per-Test Wall-Clock Limit
///
/// Runs the body on its own task and bounds the join with `tokio::time::timeout`.
/// On overrun the task is aborted and the invocation fails with [`TestTimeout`].
///
/// **Guarantees:**
/// - The deadline is disarmed on every exit path (normal return, error, panic, timeout)
/// - Values reported through setters before the deadline stay on the record
/// - The record is sealed on timeout, so detached work cannot report afterwards
/// - Only one deadline per invocation; arming a second one fails the test loudly
///
/// A body that blocks its worker thread (`std::thread::sleep`, busy loops) is still
/// reported as timed out, but only a multi-threaded runtime can observe the deadline
/// while it blocks. The blocked thread itself is released when the body returns.

use crate::context::TestContext;
use crate::error::TestTimeout;
use crate::unit::{TestBody, TestUnit};
use futures_util::FutureExt;
use std::panic;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub fn default_message(seconds: u64) -> String {
    format!("test timed out after {}s.", seconds)
}

/// Wrap `unit` so each invocation is bounded by `seconds`
pub(crate) fn bound(unit: TestUnit, seconds: u64, message: String) -> TestUnit {
    let test_name = unit.name().to_string();
    unit.wrap(move |inner: TestBody| -> TestBody {
        Arc::new(move |ctx: TestContext| {
            let inner = Arc::clone(&inner);
            let message = message.clone();
            let test_name = test_name.clone();
            async move {
                let _deadline = ctx.arm_deadline()?;
                let limit = Duration::from_secs(seconds);

                let mut handle = tokio::spawn(inner(ctx.clone()));

                match tokio::time::timeout(limit, &mut handle).await {
                    Ok(Ok(result)) => result,
                    // Panic payload goes back to the invocation
                    Ok(Err(e)) if e.is_panic() => panic::resume_unwind(e.into_panic()),
                    Ok(Err(e)) => Err(anyhow::anyhow!("test task was cancelled: {}", e)),
                    Err(_) => {
                        handle.abort();
                        ctx.seal();
                        warn!(test = %test_name, timeout_s = seconds, "Test exceeded its time limit");
                        Err(TestTimeout { seconds, message }.into())
                    }
                }
            }
            .boxed()
        })
    })
}
