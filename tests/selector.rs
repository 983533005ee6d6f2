// tests/selector.rs

mod common;
use crate::common::{
    init_tracing, run_simple, FakeTaskSource, LoopOptionsBuilder, ScriptedWorker, TaskBuilder,
};

use std::collections::HashSet;

use taskloop::errors::TaskloopError;
use taskloop::exec::PermissionMode;
use taskloop::source::{
    model_for, model_from_labels, next_task, SourceFuture, Task, TaskSource, TaskStatus,
};

fn ids(skipped: &[&str]) -> HashSet<String> {
    skipped.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn orphaned_in_progress_task_comes_first() {
    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("A").priority(0).build(),
        TaskBuilder::new("B").priority(3).in_progress().build(),
    ]);

    let task = next_task(&source, &HashSet::new()).await.expect("select");
    assert_eq!(task.map(|t| t.id).as_deref(), Some("B"));
}

#[tokio::test]
async fn lowest_priority_number_wins() {
    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("low").priority(4).build(),
        TaskBuilder::new("urgent").priority(0).build(),
        TaskBuilder::new("mid").priority(2).build(),
    ]);

    let task = next_task(&source, &HashSet::new()).await.expect("select");
    assert_eq!(task.map(|t| t.id).as_deref(), Some("urgent"));
}

#[tokio::test]
async fn ties_keep_source_order() {
    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("first").priority(1).build(),
        TaskBuilder::new("second").priority(1).build(),
    ]);

    let task = next_task(&source, &HashSet::new()).await.expect("select");
    assert_eq!(task.map(|t| t.id).as_deref(), Some("first"));
}

#[tokio::test]
async fn skipped_tasks_are_never_selected() {
    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("A").priority(0).build(),
        TaskBuilder::new("B").priority(1).build(),
        TaskBuilder::new("C").priority(2).in_progress().build(),
    ]);

    let task = next_task(&source, &ids(&["A", "C"])).await.expect("select");
    assert_eq!(task.map(|t| t.id).as_deref(), Some("B"));

    let task = next_task(&source, &ids(&["A", "B", "C"]))
        .await
        .expect("select");
    assert!(task.is_none());
}

#[tokio::test]
async fn empty_queue_yields_none() {
    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("done").status(TaskStatus::Closed).build(),
    ]);
    assert!(next_task(&source, &HashSet::new()).await.expect("select").is_none());
}

#[test]
fn model_label_parsing() {
    assert_eq!(model_from_labels(&["bug", "model:opus"]), Some("opus"));
    assert_eq!(model_from_labels(&["bug"]), None);
    assert_eq!(model_from_labels::<&str>(&[]), None);

    let task = TaskBuilder::new("A").label("model:haiku").build();
    assert_eq!(task.model_label(), Some("haiku"));
}

#[tokio::test]
async fn model_comes_from_embedded_then_source_labels_then_default() {
    let source = FakeTaskSource::new(vec![]);
    source.set_labels("B", &["area:api", "model:opus"]);

    let embedded = TaskBuilder::new("A").label("model:haiku").build();
    assert_eq!(model_for(&source, &embedded, "sonnet").await, "haiku");

    let labelled = TaskBuilder::new("B").build();
    assert_eq!(model_for(&source, &labelled, "sonnet").await, "opus");

    let plain = TaskBuilder::new("C").build();
    assert_eq!(model_for(&source, &plain, "sonnet").await, "sonnet");
}

/// A source whose every call fails.
struct BrokenSource;

impl TaskSource for BrokenSource {
    fn list_in_progress(&self) -> SourceFuture<'_, Vec<Task>> {
        Box::pin(async { Err(TaskloopError::SourceError("tracker offline".into())) })
    }

    fn list_ready(&self) -> SourceFuture<'_, Vec<Task>> {
        Box::pin(async { Err(TaskloopError::SourceError("tracker offline".into())) })
    }

    fn update_status<'a>(&'a self, _id: &'a str, _status: TaskStatus) -> SourceFuture<'a, ()> {
        Box::pin(async { Err(TaskloopError::SourceError("tracker offline".into())) })
    }

    fn close<'a>(&'a self, _id: &'a str, _reason: &'a str) -> SourceFuture<'a, ()> {
        Box::pin(async { Err(TaskloopError::SourceError("tracker offline".into())) })
    }

    fn labels<'a>(&'a self, _id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async { Err(TaskloopError::SourceError("tracker offline".into())) })
    }
}

#[tokio::test]
async fn label_lookup_failure_falls_back_to_default_model() {
    init_tracing();
    let task = TaskBuilder::new("A").build();
    assert_eq!(model_for(&BrokenSource, &task, "sonnet").await, "sonnet");
}

#[tokio::test]
async fn selection_errors_propagate() {
    assert!(next_task(&BrokenSource, &HashSet::new()).await.is_err());
}

#[tokio::test]
async fn loop_resumes_orphan_before_ready_work() {
    init_tracing();

    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("ready").priority(0).build(),
        TaskBuilder::new("orphan").priority(4).in_progress().build(),
    ]);
    let worker = ScriptedWorker::new();

    let report = run_simple(&source, &worker, LoopOptionsBuilder::new().build()).await;

    assert_eq!(report.state.completed_count, 2);
    assert_eq!(worker.run_order(), vec!["orphan", "ready"]);
}

#[tokio::test]
async fn invocation_carries_model_prompt_and_permissions() {
    init_tracing();

    let source = FakeTaskSource::new(vec![
        TaskBuilder::new("A")
            .title("Fix login")
            .description("The login form rejects valid emails.")
            .priority(0)
            .build(),
        TaskBuilder::new("B").priority(1).build(),
    ]);
    source.set_labels("A", &["model:opus"]);
    let worker = ScriptedWorker::new();

    let options = LoopOptionsBuilder::new()
        .default_model("sonnet")
        .instructions("Close the task when done.")
        .permissions(PermissionMode::Bypass)
        .build();

    run_simple(&source, &worker, options).await;

    let invocations = worker.invocations();
    assert_eq!(invocations.len(), 2);

    let a = &invocations[0];
    assert_eq!(a.task_id, "A");
    assert_eq!(a.model, "opus");
    assert_eq!(a.permissions, PermissionMode::Bypass);
    assert!(a.prompt.contains("# Task A: Fix login"));
    assert!(a.prompt.contains("The login form rejects valid emails."));
    assert!(a.prompt.contains("Close the task when done."));

    assert_eq!(invocations[1].model, "sonnet");
}

#[tokio::test]
async fn source_failure_ends_the_run_with_an_error() {
    init_tracing();

    let report = taskloop_test_utils::with_timeout(
        taskloop::engine::Orchestrator::new(
            BrokenSource,
            ScriptedWorker::new(),
            taskloop::admission::AlwaysAdmit,
            LoopOptionsBuilder::new().build(),
            taskloop::engine::StopSentinel::new(
                std::sync::Arc::new(taskloop::fs::mock::MockFileSystem::new()),
                common::STOP_FILE,
            ),
            taskloop::engine::Interrupt::new(),
        )
        .run(),
    )
    .await;

    assert!(matches!(report.reason, taskloop::engine::ExitReason::Error(_)));
    assert_eq!(report.exit_code(), 1);
}

#[cfg(unix)]
mod bd_cli {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use taskloop::source::BdTaskSource;

    /// Write an executable stand-in for the tracker CLI that logs its
    /// arguments and answers listing commands with canned JSON.
    fn fake_bd(dir: &Path) -> (PathBuf, PathBuf) {
        let log = dir.join("calls.log");
        let script = dir.join("bd");
        let body = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
case "$1" in
  ready) echo '[{{"id":"bd-2","title":"Second","status":"open","priority":2,"issue_type":"task"}},{{"id":"bd-1","title":"First","description":"do it","status":"open","priority":1,"labels":["model:opus"]}}]' ;;
  list) echo 'null' ;;
  label) echo '["model:haiku"]' ;;
  update|close) ;;
  *) echo "unknown command" >&2; exit 1 ;;
esac
"#,
            log = log.display()
        );
        std::fs::write(&script, body).expect("write fake bd");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake bd");
        (script, log)
    }

    #[tokio::test]
    async fn bd_source_speaks_the_tracker_cli() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (program, log) = fake_bd(dir.path());
        let source = BdTaskSource::new(program.to_string_lossy());

        assert!(source.list_in_progress().await.expect("list").is_empty());

        let ready = source.list_ready().await.expect("ready");
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[1].id, "bd-1");
        assert_eq!(ready[1].model_label(), Some("opus"));
        assert_eq!(ready[0].description, "");

        let next = next_task(&source, &HashSet::new()).await.expect("select");
        assert_eq!(next.map(|t| t.id).as_deref(), Some("bd-1"));

        assert_eq!(source.labels("bd-2").await.expect("labels"), vec!["model:haiku"]);

        source
            .update_status("bd-1", TaskStatus::InProgress)
            .await
            .expect("update");
        source.close("bd-1", "completed").await.expect("close");

        let calls = std::fs::read_to_string(&log).expect("call log");
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            vec![
                "list --status in_progress --json",
                "ready --json",
                "list --status in_progress --json",
                "ready --json",
                "label list bd-2 --json",
                "update bd-1 --status in_progress",
                "close bd-1 --reason completed",
            ]
        );
    }

    #[tokio::test]
    async fn failing_tracker_command_is_a_source_error() {
        let source = BdTaskSource::new("false");
        let err = source.list_ready().await.expect_err("must fail");
        assert!(matches!(err, TaskloopError::SourceError(_)));
    }
}
