//! Shared fixtures for the agentdag integration tests: workflow and pool
//! builders, a scripted task runner, and the tracing and deadline helpers
//! below.

pub mod builders;
pub mod fake_runner;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Longest a single executor run may take before the test is declared hung.
pub const RUN_DEADLINE: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Route executor and scheduler logs into the test harness capture.
///
/// Output only shows up for failing tests. `RUST_LOG` overrides the default
/// of `warn,agentdag=info`; `RUST_LOG=agentdag::exec=debug` shows each
/// attempt, backoff and agent wait.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,agentdag=info"));

        // Another test binary helper may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await an executor run, failing the test if it outlives [`RUN_DEADLINE`].
///
/// Paused-clock tests advance through backoff and agent waits instantly, so
/// hitting the deadline there means a level never drained: a leaked agent
/// lease or a dispatch that never resolved.
pub async fn with_timeout<F, T>(run: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_DEADLINE, run).await {
        Ok(value) => value,
        Err(_) => panic!("workflow run still going after {RUN_DEADLINE:?}"),
    }
}
