use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskloop::engine::Interrupt;
use taskloop::errors::{Result, TaskloopError};
use taskloop::exec::{WorkerBackend, WorkerInvocation, WorkerOutcome};

/// What a scripted worker run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStep {
    Succeed,
    Fail(i32),
    Stall,
    /// Fire the interrupt mid-run, then behave like a killed worker.
    Interrupt,
    /// The worker cannot be started at all.
    SpawnError,
}

type RunHook = Arc<dyn Fn(&WorkerInvocation) + Send + Sync>;

/// A worker backend that never spawns processes.
///
/// Each task id has a queue of steps; when a queue is empty the run
/// succeeds. All invocations are recorded in order.
#[derive(Clone, Default)]
pub struct ScriptedWorker {
    steps: Arc<Mutex<HashMap<String, VecDeque<WorkerStep>>>>,
    invocations: Arc<Mutex<Vec<WorkerInvocation>>>,
    on_run: Option<RunHook>,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task_id: &str, steps: &[WorkerStep]) -> Self {
        self.steps
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .extend(steps.iter().copied());
        self
    }

    /// Run `hook` at the start of every invocation (while the task is
    /// claimed).
    pub fn on_run(mut self, hook: impl Fn(&WorkerInvocation) + Send + Sync + 'static) -> Self {
        self.on_run = Some(Arc::new(hook));
        self
    }

    pub fn invocations(&self) -> Vec<WorkerInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn run_order(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|inv| inv.task_id)
            .collect()
    }
}

impl WorkerBackend for ScriptedWorker {
    fn run(
        &mut self,
        invocation: WorkerInvocation,
        mut interrupt: Interrupt,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutcome>> + Send + '_>> {
        if let Some(hook) = &self.on_run {
            hook(&invocation);
        }

        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(&invocation.task_id)
            .and_then(|q| q.pop_front())
            .unwrap_or(WorkerStep::Succeed);

        self.invocations.lock().unwrap().push(invocation);

        Box::pin(async move {
            if interrupt.is_set() {
                return Ok(WorkerOutcome::Interrupted);
            }

            let outcome = match step {
                WorkerStep::Succeed => WorkerOutcome::Success,
                WorkerStep::Fail(code) => WorkerOutcome::Failed {
                    exit_code: Some(code),
                },
                WorkerStep::Stall => WorkerOutcome::Stalled {
                    idle: Duration::from_secs(600),
                },
                WorkerStep::Interrupt => {
                    interrupt.fire();
                    interrupt.wait().await;
                    WorkerOutcome::Interrupted
                }
                WorkerStep::SpawnError => {
                    return Err(TaskloopError::WorkerError(
                        "scripted spawn failure".to_string(),
                    ));
                }
            };
            Ok(outcome)
        })
    }
}
