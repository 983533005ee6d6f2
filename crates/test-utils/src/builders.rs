#![allow(dead_code)]

use std::time::Duration;

use taskloop::engine::{LoopOptions, RetryLimits};
use taskloop::exec::PermissionMode;
use taskloop::source::{Task, TaskStatus};

/// Builder for `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task {
                id: id.to_string(),
                title: format!("task {id}"),
                description: String::new(),
                status: TaskStatus::Open,
                priority: 2,
                labels: Vec::new(),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.task.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn in_progress(self) -> Self {
        self.status(TaskStatus::InProgress)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.task.labels.push(label.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `LoopOptions` with test-friendly (short) waits.
pub struct LoopOptionsBuilder {
    options: LoopOptions,
}

impl LoopOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: LoopOptions {
                limits: RetryLimits {
                    max_retries: 3,
                    max_consecutive_failures: 5,
                },
                admission_wait: Duration::from_millis(200),
                poll_interval: Duration::from_millis(20),
                default_model: "sonnet".to_string(),
                instructions: None,
                permissions: PermissionMode::Scoped,
                teardown: None,
            },
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.options.limits.max_retries = n;
        self
    }

    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.options.limits.max_consecutive_failures = n;
        self
    }

    pub fn admission_wait(mut self, wait: Duration) -> Self {
        self.options.admission_wait = wait;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    pub fn default_model(mut self, model: &str) -> Self {
        self.options.default_model = model.to_string();
        self
    }

    pub fn instructions(mut self, text: &str) -> Self {
        self.options.instructions = Some(text.to_string());
        self
    }

    pub fn permissions(mut self, mode: PermissionMode) -> Self {
        self.options.permissions = mode;
        self
    }

    pub fn teardown(mut self, cmd: &str) -> Self {
        self.options.teardown = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> LoopOptions {
        self.options
    }
}

impl Default for LoopOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
