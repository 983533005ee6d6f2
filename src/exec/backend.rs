// src/exec/backend.rs

//! Pluggable worker backend.
//!
//! The loop talks to a [`WorkerBackend`] instead of spawning processes
//! itself, so tests can script worker outcomes without real processes.
//!
//! - [`RealWorkerBackend`] builds the worker command line from
//!   [`WorkerSettings`] and runs it under [`supervise`].

use std::future::Future;
use std::pin::Pin;

use tokio::process::Command;

use crate::config::WorkerSettings;
use crate::engine::Interrupt;
use crate::errors::Result;
use crate::exec::task_runner::supervise;
use crate::exec::watchdog::IdlePolicy;
use crate::exec::{PermissionMode, WorkerInvocation, WorkerOutcome};

/// Trait abstracting how a single task is executed.
pub trait WorkerBackend: Send {
    /// Run one worker to completion.
    ///
    /// Implementations must not return while anything they started for this
    /// invocation is still running, and must stop promptly with
    /// [`WorkerOutcome::Interrupted`] once `interrupt` fires.
    fn run(
        &mut self,
        invocation: WorkerInvocation,
        interrupt: Interrupt,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutcome>> + Send + '_>>;
}

/// Production backend: one supervised subprocess per invocation.
#[derive(Debug, Clone)]
pub struct RealWorkerBackend {
    settings: WorkerSettings,
    policy: IdlePolicy,
}

impl RealWorkerBackend {
    pub fn new(settings: WorkerSettings, policy: IdlePolicy) -> Self {
        Self { settings, policy }
    }

    /// Command line for `invocation`. The worker is spawned directly, never
    /// through a shell pipeline.
    pub fn command_for(&self, invocation: &WorkerInvocation) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(worker_args(&self.settings, invocation));
        cmd
    }
}

/// Arguments passed to the worker program.
pub fn worker_args(settings: &WorkerSettings, invocation: &WorkerInvocation) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        invocation.prompt.clone(),
        "--model".to_string(),
        invocation.model.clone(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
    ];

    match invocation.permissions {
        PermissionMode::Bypass => args.push("--dangerously-skip-permissions".to_string()),
        PermissionMode::Scoped => {
            if !settings.allowed_tools.is_empty() {
                args.push("--allowedTools".to_string());
                args.push(settings.allowed_tools.join(","));
            }
        }
    }

    args.extend(settings.extra_args.iter().cloned());
    args
}

impl WorkerBackend for RealWorkerBackend {
    fn run(
        &mut self,
        invocation: WorkerInvocation,
        interrupt: Interrupt,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutcome>> + Send + '_>> {
        let cmd = self.command_for(&invocation);
        let policy = self.policy;

        Box::pin(async move { supervise(cmd, &invocation.task_id, policy, interrupt).await })
    }
}
