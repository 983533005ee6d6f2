#![allow(dead_code)]

use std::sync::Arc;

pub use taskloop_test_utils::builders::{LoopOptionsBuilder, TaskBuilder};
pub use taskloop_test_utils::fake_admission::{
    FakeUsageProvider, HangingUsageProvider, ScriptedAdmission,
};
pub use taskloop_test_utils::fake_source::FakeTaskSource;
pub use taskloop_test_utils::scripted_worker::{ScriptedWorker, WorkerStep};
pub use taskloop_test_utils::{init_tracing, with_timeout};

use taskloop::admission::AdmissionControl;
use taskloop::engine::{Interrupt, LoopOptions, Orchestrator, RunReport, StopSentinel};
use taskloop::exec::WorkerBackend;
use taskloop::fs::mock::MockFileSystem;

pub const STOP_FILE: &str = ".taskloop-stop";

/// Run the orchestrator over the given fakes until it exits.
///
/// Handles are cloned, so the caller keeps its own views of the source,
/// filesystem and interrupt for assertions.
pub async fn run_loop<W, A>(
    source: &FakeTaskSource,
    worker: W,
    admission: A,
    options: LoopOptions,
    fs: &MockFileSystem,
    interrupt: &Interrupt,
) -> RunReport
where
    W: WorkerBackend,
    A: AdmissionControl,
{
    let sentinel = StopSentinel::new(Arc::new(fs.clone()), STOP_FILE);
    let orchestrator = Orchestrator::new(
        source.clone(),
        worker,
        admission,
        options,
        sentinel,
        interrupt.clone(),
    );
    with_timeout(orchestrator.run()).await
}

/// Shorthand for a run with default fakes around `source` and `worker`.
pub async fn run_simple(
    source: &FakeTaskSource,
    worker: &ScriptedWorker,
    options: LoopOptions,
) -> RunReport {
    run_loop(
        source,
        worker.clone(),
        ScriptedAdmission::default(),
        options,
        &MockFileSystem::new(),
        &Interrupt::new(),
    )
    .await
}
