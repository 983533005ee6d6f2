use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use taskloop::engine::Interrupt;
use taskloop::errors::{Result, TaskloopError};
use taskloop::source::{SourceFuture, Task, TaskSource, TaskStatus};

#[derive(Default)]
struct Store {
    tasks: Vec<Task>,
    labels: HashMap<String, Vec<String>>,
    close_reasons: HashMap<String, String>,
    updates: Vec<(String, TaskStatus)>,
    fire_on_claim: Option<Interrupt>,
}

/// In-memory task store.
///
/// - `list_ready` returns open tasks sorted by priority (stable).
/// - `close` records the reason.
/// - every status change is recorded in order.
///
/// Clones share the same store, so a test can keep one handle for assertions
/// while the orchestrator owns another.
#[derive(Clone, Default)]
pub struct FakeTaskSource {
    store: Arc<Mutex<Store>>,
}

impl FakeTaskSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        let source = Self::default();
        source.store.lock().unwrap().tasks = tasks;
        source
    }

    pub fn set_labels(&self, id: &str, labels: &[&str]) {
        self.store
            .lock()
            .unwrap()
            .labels
            .insert(id.to_string(), labels.iter().map(|s| s.to_string()).collect());
    }

    /// Fire `interrupt` the moment any task is marked `in_progress`.
    pub fn fire_on_claim(&self, interrupt: Interrupt) {
        self.store.lock().unwrap().fire_on_claim = Some(interrupt);
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.store
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status)
    }

    pub fn close_reason(&self, id: &str) -> Option<String> {
        self.store.lock().unwrap().close_reasons.get(id).cloned()
    }

    pub fn updates(&self) -> Vec<(String, TaskStatus)> {
        self.store.lock().unwrap().updates.clone()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.store
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.status == status)
            .count()
    }

    fn set_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let interrupt = {
            let mut store = self.store.lock().unwrap();
            let task = store
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| TaskloopError::SourceError(format!("no such task: {id}")))?;
            task.status = status;
            store.updates.push((id.to_string(), status));

            if status == TaskStatus::InProgress {
                store.fire_on_claim.clone()
            } else {
                None
            }
        };

        if let Some(interrupt) = interrupt {
            interrupt.fire();
        }
        Ok(())
    }

    fn with_status(&self, status: TaskStatus) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .store
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.priority);
        tasks
    }
}

impl TaskSource for FakeTaskSource {
    fn list_in_progress(&self) -> SourceFuture<'_, Vec<Task>> {
        let tasks = self.with_status(TaskStatus::InProgress);
        Box::pin(async move { Ok(tasks) })
    }

    fn list_ready(&self) -> SourceFuture<'_, Vec<Task>> {
        let tasks = self.with_status(TaskStatus::Open);
        Box::pin(async move { Ok(tasks) })
    }

    fn update_status<'a>(&'a self, id: &'a str, status: TaskStatus) -> SourceFuture<'a, ()> {
        let res = self.set_status(id, status);
        Box::pin(async move { res })
    }

    fn close<'a>(&'a self, id: &'a str, reason: &'a str) -> SourceFuture<'a, ()> {
        let res = self.set_status(id, TaskStatus::Closed);
        if res.is_ok() {
            self.store
                .lock()
                .unwrap()
                .close_reasons
                .insert(id.to_string(), reason.to_string());
        }
        Box::pin(async move { res })
    }

    fn labels<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Vec<String>> {
        let labels = self
            .store
            .lock()
            .unwrap()
            .labels
            .get(id)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(labels) })
    }
}
