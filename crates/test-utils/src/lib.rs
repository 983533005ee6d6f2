//! Shared fakes and helpers for taskloop's integration tests.

pub mod builders;
pub mod fake_admission;
pub mod fake_source;
pub mod scripted_worker;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for any single test scenario.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Install a per-test tracing subscriber once per test binary.
///
/// Output is captured and only shown for failing tests. Set `TASKLOOP_LOG`
/// (e.g. `TASKLOOP_LOG=taskloop=debug`) to change the filter.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TASKLOOP_LOG")
            .unwrap_or_else(|_| EnvFilter::new("taskloop=info,warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test scenario did not finish within {TEST_TIMEOUT:?}"),
    }
}
