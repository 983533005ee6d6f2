// src/source/selector.rs

//! Next-task selection.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::source::{model_from_labels, Task, TaskId, TaskSource, TaskStatus};

/// Pick the task the loop should run next.
///
/// 1. A task already `in_progress` comes first. With at most one worker
///    alive, such a task can only be left over from an earlier crash.
/// 2. Otherwise the most urgent ready task (lowest `priority`; ties keep the
///    source's order).
///
/// Ids in `skipped` are never returned. `Ok(None)` means the queue is
/// exhausted.
pub async fn next_task<S: TaskSource + ?Sized>(
    source: &S,
    skipped: &HashSet<TaskId>,
) -> Result<Option<Task>> {
    let orphan = source
        .list_in_progress()
        .await?
        .into_iter()
        .find(|t| !skipped.contains(&t.id));

    if let Some(task) = orphan {
        warn!(task = %task.id, title = %task.title, "resuming orphaned in_progress task");
        return Ok(Some(task));
    }

    let ready = source.list_ready().await?;
    debug!(count = ready.len(), "ready tasks listed");

    let next = ready
        .into_iter()
        .filter(|t| t.status != TaskStatus::Closed && !skipped.contains(&t.id))
        .enumerate()
        .min_by_key(|(idx, t)| (t.priority, *idx))
        .map(|(_, t)| t);

    Ok(next)
}

/// Resolve the worker model for `task`.
///
/// Labels embedded in the listing win; otherwise the source is asked for the
/// task's labels. Any lookup error falls back to `default_model`.
pub async fn model_for<S: TaskSource + ?Sized>(
    source: &S,
    task: &Task,
    default_model: &str,
) -> String {
    if let Some(model) = task.model_label() {
        return model.to_string();
    }

    match source.labels(&task.id).await {
        Ok(labels) => model_from_labels(&labels)
            .unwrap_or(default_model)
            .to_string(),
        Err(err) => {
            warn!(
                task = %task.id,
                error = %err,
                "failed to read task labels; using default model"
            );
            default_model.to_string()
        }
    }
}
