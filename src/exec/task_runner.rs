// src/exec/task_runner.rs

//! Supervision of a single worker process.
//!
//! For the lifetime of one worker this runs four things side by side:
//! the process itself, a stdout reader, a stderr reader and the idle
//! [`watchdog`](crate::exec::watchdog). Whatever ends the run (normal exit,
//! stall kill or interrupt), the process is reaped and every helper is joined
//! or aborted before [`supervise`] returns.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::Interrupt;
use crate::errors::Result;
use crate::exec::watchdog::{monitor, IdlePolicy};
use crate::exec::WorkerOutcome;

/// How long readers may keep draining after the worker is gone. A grandchild
/// that inherited the pipes can keep them open indefinitely.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Run `cmd` to completion under the watchdog.
///
/// - exit 0 → `Success`, any other exit → `Failed`
/// - no output for `policy.kill_after` → killed, `Stalled`
/// - `interrupt` fired → killed, `Interrupted`
pub async fn supervise(
    mut cmd: Command,
    task_id: &str,
    policy: IdlePolicy,
    mut interrupt: Interrupt,
) -> Result<WorkerOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning worker for task '{task_id}'"))?;

    info!(task = %task_id, pid = ?child.id(), "worker started");

    let (activity_tx, activity_rx) = watch::channel(Instant::now());
    let activity_tx = Arc::new(activity_tx);

    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(read_stream(
            stdout,
            StreamKind::Stdout,
            task_id.to_string(),
            Arc::clone(&activity_tx),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(read_stream(
            stderr,
            StreamKind::Stderr,
            task_id.to_string(),
            Arc::clone(&activity_tx),
        )));
    }

    let (kill_tx, mut kill_rx) = oneshot::channel::<Duration>();
    let watchdog = tokio::spawn(monitor(
        task_id.to_string(),
        policy,
        activity_rx,
        kill_tx,
    ));

    let outcome: Result<WorkerOutcome> = tokio::select! {
        biased;

        _ = interrupt.wait() => {
            info!(task = %task_id, "interrupt received; killing worker");
            kill_and_reap(&mut child, task_id).await;
            Ok(WorkerOutcome::Interrupted)
        }

        Ok(idle) = &mut kill_rx => {
            kill_and_reap(&mut child, task_id).await;
            Ok(WorkerOutcome::Stalled { idle })
        }

        status_res = child.wait() => {
            match status_res {
                Ok(status) => {
                    let code = status.code();
                    info!(
                        task = %task_id,
                        exit_code = ?code,
                        success = status.success(),
                        "worker exited"
                    );
                    if status.success() {
                        Ok(WorkerOutcome::Success)
                    } else if interrupt.is_set() {
                        // A terminal Ctrl-C reaches the worker too; it may exit
                        // before the interrupt branch is polled.
                        Ok(WorkerOutcome::Interrupted)
                    } else {
                        Ok(WorkerOutcome::Failed { exit_code: code })
                    }
                }
                Err(err) => {
                    kill_and_reap(&mut child, task_id).await;
                    Err(anyhow::Error::from(err)
                        .context(format!("waiting for worker of task '{task_id}'"))
                        .into())
                }
            }
        }
    };

    // Join barrier: nothing spawned for this worker outlives this call.
    watchdog.abort();
    let _ = watchdog.await;
    for reader in readers {
        join_reader(reader, task_id).await;
    }
    debug!(task = %task_id, "worker helpers joined");

    outcome
}

async fn kill_and_reap(child: &mut Child, task_id: &str) {
    if let Err(err) = child.kill().await {
        warn!(task = %task_id, error = %err, "failed to kill worker process");
    }
    match child.wait().await {
        Ok(status) => debug!(task = %task_id, %status, "worker reaped"),
        Err(err) => warn!(task = %task_id, error = %err, "failed to reap worker process"),
    }
}

async fn join_reader(mut reader: JoinHandle<()>, task_id: &str) {
    match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader).await {
        Ok(_) => {}
        Err(_) => {
            debug!(task = %task_id, "output reader still open after worker exit; aborting");
            reader.abort();
            let _ = reader.await;
        }
    }
}

/// Consume one output stream, stamping activity on every line.
async fn read_stream<R>(
    stream: R,
    kind: StreamKind,
    task_id: String,
    activity: Arc<watch::Sender<Instant>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                activity.send_replace(Instant::now());
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                match kind {
                    StreamKind::Stdout => log_stdout_line(&task_id, line),
                    StreamKind::Stderr => debug!(task = %task_id, "stderr: {}", line),
                }
            }
            Err(err) => {
                debug!(task = %task_id, ?kind, error = %err, "output stream read failed");
                break;
            }
        }
    }

    debug!(task = %task_id, ?kind, "output stream closed");
}

/// Log one line of stream-json output. Non-JSON lines are logged verbatim.
fn log_stdout_line(task_id: &str, line: &str) {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(line) else {
        debug!(task = %task_id, "stdout: {}", line);
        return;
    };

    let kind = event.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");
    if kind == "result" {
        info!(
            task = %task_id,
            subtype = event.get("subtype").and_then(|v| v.as_str()).unwrap_or(""),
            is_error = event.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false),
            num_turns = event.get("num_turns").and_then(|v| v.as_u64()),
            duration_ms = event.get("duration_ms").and_then(|v| v.as_u64()),
            total_cost_usd = event.get("total_cost_usd").and_then(|v| v.as_f64()),
            "worker reported result"
        );
    } else {
        debug!(task = %task_id, event = kind, "worker event");
    }
}
