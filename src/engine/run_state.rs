// src/engine/run_state.rs

//! Retry and circuit-breaker bookkeeping.
//!
//! Pure and synchronous: the loop records each task outcome here and acts
//! on the returned [`FailureVerdict`].
//!
//! Two counters interact:
//! - a per-task streak, counting failures of the *same* task id on
//!   consecutive attempts; exceeding the retry budget skips that task.
//! - a global streak of failures in a row across all tasks; reaching its
//!   limit aborts the run, because distinct tasks failing back to back point
//!   at the environment rather than at any one task.

use std::collections::HashSet;

use crate::config::LoopSettings;
use crate::source::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLimits {
    /// Retries granted to a failing task before it is skipped.
    pub max_retries: u32,
    /// Failures in a row that abort the whole run.
    pub max_consecutive_failures: u32,
}

impl From<&LoopSettings> for RetryLimits {
    fn from(s: &LoopSettings) -> Self {
        Self {
            max_retries: s.max_retries,
            max_consecutive_failures: s.max_consecutive_failures,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Put the task back; `failures` attempts of it have failed in a row.
    Retry { failures: u32, retries_left: u32 },
    /// The task used up its retries; close it as skipped.
    Skip { failures: u32 },
    /// Systemic failure: stop the run.
    Abort { consecutive_failures: u32 },
}

/// Counters for one orchestrator run. Owned by the loop alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub completed_count: u32,
    pub failed_count: u32,
    pub consecutive_failures: u32,
    pub last_failed_task_id: Option<TaskId>,
    pub fail_count_for_last_failed_id: u32,
    /// Tasks skipped during this run; never selected again.
    pub skipped: HashSet<TaskId>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.completed_count += 1;
        self.consecutive_failures = 0;
        self.last_failed_task_id = None;
        self.fail_count_for_last_failed_id = 0;
    }

    /// Record a failed attempt and decide what happens next.
    ///
    /// The abort check runs first: a run that has hit the global limit stops
    /// even if the failing task also exhausted its retries.
    pub fn record_failure(&mut self, task_id: &str, limits: RetryLimits) -> FailureVerdict {
        self.failed_count += 1;
        self.consecutive_failures += 1;

        if self.last_failed_task_id.as_deref() == Some(task_id) {
            self.fail_count_for_last_failed_id += 1;
        } else {
            self.last_failed_task_id = Some(task_id.to_string());
            self.fail_count_for_last_failed_id = 1;
        }

        if self.consecutive_failures >= limits.max_consecutive_failures {
            return FailureVerdict::Abort {
                consecutive_failures: self.consecutive_failures,
            };
        }

        let failures = self.fail_count_for_last_failed_id;
        if failures > limits.max_retries {
            self.skipped.insert(task_id.to_string());
            self.last_failed_task_id = None;
            self.fail_count_for_last_failed_id = 0;
            return FailureVerdict::Skip { failures };
        }

        FailureVerdict::Retry {
            failures,
            retries_left: limits.max_retries + 1 - failures,
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}
