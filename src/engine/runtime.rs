// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::admission::{Admission, AdmissionControl};
use crate::config::Config;
use crate::errors::Result;
use crate::exec::{PermissionMode, PromptBuilder, WorkerBackend, WorkerInvocation, WorkerOutcome};
use crate::source::{model_for, next_task, Task, TaskId, TaskSource, TaskStatus};

use super::lifecycle::{run_teardown_hook, ExitReason, Interrupt, RunReport, StopSentinel};
use super::run_state::{FailureVerdict, RetryLimits, RunState};

/// Upper bound for a single interruptible wait.
const LONGEST_PAUSE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Loop settings derived from [`Config`] and the CLI.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub limits: RetryLimits,
    /// How long to wait before rechecking admission once over the threshold.
    pub admission_wait: Duration,
    /// Granularity of interruptible waits.
    pub poll_interval: Duration,
    pub default_model: String,
    pub instructions: Option<String>,
    pub permissions: PermissionMode,
    pub teardown: Option<String>,
}

impl LoopOptions {
    pub fn from_config(config: &Config, permissions: PermissionMode) -> Self {
        Self {
            limits: RetryLimits::from(&config.run),
            admission_wait: config.admission.wait,
            poll_interval: config.run.stop_poll_interval,
            default_model: config.worker.default_model.clone(),
            instructions: config.worker.instructions.clone(),
            permissions,
            teardown: config.hooks.teardown.clone(),
        }
    }
}

/// The orchestration loop.
///
/// Runs one task at a time: stop check → admission → selection → worker →
/// bookkeeping. All counters live in a [`RunState`] owned by this struct and
/// are only touched between worker runs.
pub struct Orchestrator<S, W, A>
where
    S: TaskSource,
    W: WorkerBackend,
    A: AdmissionControl,
{
    source: S,
    worker: W,
    admission: A,
    options: LoopOptions,
    sentinel: StopSentinel,
    interrupt: Interrupt,
    state: RunState,
    /// Task this loop has marked `in_progress`, if any.
    claimed: Option<TaskId>,
}

impl<S, W, A> fmt::Debug for Orchestrator<S, W, A>
where
    S: TaskSource,
    W: WorkerBackend,
    A: AdmissionControl,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("claimed", &self.claimed)
            .finish_non_exhaustive()
    }
}

impl<S, W, A> Orchestrator<S, W, A>
where
    S: TaskSource,
    W: WorkerBackend,
    A: AdmissionControl,
{
    pub fn new(
        source: S,
        worker: W,
        admission: A,
        options: LoopOptions,
        sentinel: StopSentinel,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            source,
            worker,
            admission,
            options,
            sentinel,
            interrupt,
            state: RunState::new(),
            claimed: None,
        }
    }

    /// Run until the queue is empty, a stop is requested, the process is
    /// interrupted or the circuit breaker trips.
    ///
    /// Cleanup runs on every path: a claimed task goes back to `open` and the
    /// teardown hook is invoked.
    pub async fn run(mut self) -> RunReport {
        info!("taskloop started");

        let reason = match self.run_loop().await {
            Ok(reason) => reason,
            Err(err) => {
                error!(error = %err, "orchestration loop failed");
                ExitReason::Error(err.to_string())
            }
        };

        self.cleanup().await;

        let report = RunReport {
            reason,
            state: self.state,
        };
        info!(
            completed = report.state.completed_count,
            failed = report.state.failed_count,
            skipped = report.state.skipped_count(),
            reason = %report.reason,
            "taskloop finished"
        );
        report
    }

    async fn run_loop(&mut self) -> Result<ExitReason> {
        loop {
            if self.interrupt.is_set() {
                return Ok(ExitReason::Interrupted);
            }

            if self.sentinel.take_request() {
                return Ok(ExitReason::StopRequested);
            }

            if let Some(reason) = self.await_admission().await {
                return Ok(reason);
            }

            let Some(task) = next_task(&self.source, &self.state.skipped).await? else {
                info!("no ready tasks left; queue exhausted");
                return Ok(ExitReason::QueueExhausted);
            };

            if let Some(reason) = self.execute(task).await? {
                return Ok(reason);
            }
        }
    }

    /// Block until admission allows a new task.
    ///
    /// Returns `Some` if a stop request or interrupt arrived while waiting.
    async fn await_admission(&mut self) -> Option<ExitReason> {
        loop {
            let admission = tokio::select! {
                admission = self.admission.check() => admission,
                _ = self.interrupt.wait() => return Some(ExitReason::Interrupted),
            };

            match admission {
                Admission::Ok => return None,
                Admission::Over => {
                    info!(
                        wait_secs = self.options.admission_wait.as_secs(),
                        "usage over threshold; waiting before next task"
                    );
                    if let Some(reason) = self.pause(self.options.admission_wait).await {
                        return Some(reason);
                    }
                }
            }
        }
    }

    /// Sleep for `total`, in `poll_interval` slices, watching for stop and
    /// interrupt requests.
    async fn pause(&mut self, total: Duration) -> Option<ExitReason> {
        let now = Instant::now();
        let deadline = now
            .checked_add(total)
            .unwrap_or_else(|| now + LONGEST_PAUSE);

        loop {
            if self.interrupt.is_set() {
                return Some(ExitReason::Interrupted);
            }
            if self.sentinel.take_request() {
                return Some(ExitReason::StopRequested);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let step = self.options.poll_interval.min(deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.interrupt.wait() => return Some(ExitReason::Interrupted),
            }
        }
    }

    /// Run a single task and book its outcome.
    ///
    /// Returns `Some` when the loop must end.
    async fn execute(&mut self, task: Task) -> Result<Option<ExitReason>> {
        let model = model_for(&self.source, &task, &self.options.default_model).await;

        info!(
            task = %task.id,
            title = %task.title,
            priority = task.priority,
            model = %model,
            "starting task"
        );

        if self.interrupt.is_set() {
            return Ok(Some(ExitReason::Interrupted));
        }

        self.claimed = Some(task.id.clone());
        self.source
            .update_status(&task.id, TaskStatus::InProgress)
            .await?;

        let prompt = PromptBuilder::for_task(&task)
            .instructions(self.options.instructions.as_deref())
            .build();

        let invocation = WorkerInvocation {
            task_id: task.id.clone(),
            prompt,
            model,
            permissions: self.options.permissions,
        };

        let outcome = match self.worker.run(invocation, self.interrupt.clone()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(task = %task.id, error = %err, "worker could not be run");
                WorkerOutcome::Failed { exit_code: None }
            }
        };

        if outcome.is_failure() {
            return self.on_failure(&task, outcome).await;
        }
        if outcome == WorkerOutcome::Interrupted {
            return Ok(Some(ExitReason::Interrupted));
        }

        self.on_success(&task).await;
        Ok(None)
    }

    async fn on_success(&mut self, task: &Task) {
        if let Err(err) = self.source.close(&task.id, "completed").await {
            // The worker usually closes the task itself.
            debug!(task = %task.id, error = %err, "closing completed task failed");
        }
        self.claimed = None;
        self.state.record_success();

        info!(
            task = %task.id,
            completed = self.state.completed_count,
            "task completed"
        );
    }

    async fn on_failure(
        &mut self,
        task: &Task,
        outcome: WorkerOutcome,
    ) -> Result<Option<ExitReason>> {
        match outcome {
            WorkerOutcome::Stalled { idle } => warn!(
                task = %task.id,
                idle_secs = idle.as_secs(),
                "task failed: worker stalled and was killed"
            ),
            WorkerOutcome::Failed { exit_code } => warn!(
                task = %task.id,
                exit_code = ?exit_code,
                "task failed: worker exited unsuccessfully"
            ),
            WorkerOutcome::Success | WorkerOutcome::Interrupted => {}
        }

        self.source.update_status(&task.id, TaskStatus::Open).await?;
        self.claimed = None;

        match self.state.record_failure(&task.id, self.options.limits) {
            FailureVerdict::Retry {
                failures,
                retries_left,
            } => {
                info!(
                    task = %task.id,
                    failures,
                    retries_left,
                    consecutive_failures = self.state.consecutive_failures,
                    "task returned to queue for retry"
                );
                Ok(None)
            }
            FailureVerdict::Skip { failures } => {
                let reason = format!("skipped after {failures} consecutive failed attempts");
                if let Err(err) = self.source.close(&task.id, &reason).await {
                    warn!(task = %task.id, error = %err, "failed to close skipped task");
                }
                warn!(task = %task.id, failures, "task skipped");
                Ok(None)
            }
            FailureVerdict::Abort {
                consecutive_failures,
            } => {
                error!(
                    task = %task.id,
                    consecutive_failures,
                    "too many consecutive failures across tasks; aborting run"
                );
                Ok(Some(ExitReason::Aborted {
                    consecutive_failures,
                }))
            }
        }
    }

    /// Leave the task store consistent and run the teardown hook.
    async fn cleanup(&mut self) {
        if let Some(id) = self.claimed.take() {
            match self.source.update_status(&id, TaskStatus::Open).await {
                Ok(()) => info!(task = %id, "reverted interrupted task to open"),
                Err(err) => error!(task = %id, error = %err, "failed to revert task to open"),
            }
        }

        run_teardown_hook(self.options.teardown.as_deref()).await;
    }
}
