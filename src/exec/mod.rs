// src/exec/mod.rs

//! Worker execution layer.
//!
//! - [`backend`] provides the `WorkerBackend` trait and the production
//!   `RealWorkerBackend`; tests substitute a scripted implementation.
//! - [`task_runner`] supervises one worker process and its helpers.
//! - [`watchdog`] holds the idle/stall policy.
//! - [`prompt`] builds worker prompts from task fields.

use std::time::Duration;

pub mod backend;
pub mod prompt;
pub mod task_runner;
pub mod watchdog;

pub use backend::{RealWorkerBackend, WorkerBackend};
pub use prompt::PromptBuilder;
pub use task_runner::supervise;
pub use watchdog::{IdlePolicy, Watchdog, WatchdogAction};

/// Permission scope granted to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// Only the configured tool allow-list.
    #[default]
    Scoped,
    /// Every permission prompt bypassed.
    Bypass,
}

/// Everything needed to start one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    pub task_id: String,
    pub prompt: String,
    pub model: String,
    pub permissions: PermissionMode,
}

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Exit status 0.
    Success,
    /// Nonzero exit (or killed by something other than us).
    Failed { exit_code: Option<i32> },
    /// Killed by the watchdog after `idle` without output.
    Stalled { idle: Duration },
    /// Killed because the orchestrator was interrupted.
    Interrupted,
}

impl WorkerOutcome {
    /// Whether this outcome counts as a task failure for retry purposes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            WorkerOutcome::Failed { .. } | WorkerOutcome::Stalled { .. }
        )
    }
}
