// src/engine/lifecycle.rs

//! Run lifecycle: interrupts, the stop sentinel, teardown and the summary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::run_state::RunState;
use crate::fs::FileSystem;

/// Shared interrupt flag.
///
/// Set once by the signal listener (or a test); every clone observes it.
/// [`Interrupt::wait`] resolves as soon as the flag is set, including when it
/// was set before the call.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender gone without firing: never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire `interrupt` on the first termination signal.
pub fn spawn_signal_listener(interrupt: Interrupt) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_termination_signal().await {
            Ok(signal) => {
                warn!(signal, "termination signal received; shutting down");
                interrupt.fire();
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handlers");
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
        _ = hup.recv() => Ok("SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
}

/// Cooperative stop request: a well-known file in the working directory.
#[derive(Debug, Clone)]
pub struct StopSentinel {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl StopSentinel {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a stop was requested. The sentinel is consumed (removed) when
    /// observed.
    pub fn take_request(&self) -> bool {
        if !self.fs.exists(&self.path) {
            return false;
        }

        info!(path = %self.path.display(), "stop file found; stopping after current work");
        if let Err(err) = self.fs.remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove stop file");
        }
        true
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// No ready task left.
    QueueExhausted,
    /// Stop file observed between tasks.
    StopRequested,
    /// Termination signal.
    Interrupted,
    /// Circuit breaker tripped.
    Aborted { consecutive_failures: u32 },
    /// The task source or another collaborator failed.
    Error(String),
}

impl ExitReason {
    /// Process exit code for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::QueueExhausted | ExitReason::StopRequested => 0,
            ExitReason::Interrupted | ExitReason::Error(_) => 1,
            ExitReason::Aborted { .. } => 2,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::QueueExhausted => write!(f, "queue exhausted"),
            ExitReason::StopRequested => write!(f, "stop requested"),
            ExitReason::Interrupted => write!(f, "interrupted by signal"),
            ExitReason::Aborted {
                consecutive_failures,
            } => write!(
                f,
                "aborted after {consecutive_failures} consecutive failures (likely an environment problem)"
            ),
            ExitReason::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Final report of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reason: ExitReason,
    pub state: RunState,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "taskloop finished ({}): {} completed, {} failed attempts, {} skipped",
            self.reason,
            self.state.completed_count,
            self.state.failed_count,
            self.state.skipped_count()
        )
    }
}

/// Run the teardown hook, if configured. Failures are logged only.
pub async fn run_teardown_hook(command: Option<&str>) {
    let Some(command) = command else {
        return;
    };

    info!(cmd = %command, "running teardown hook");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    match cmd.status().await {
        Ok(status) if status.success() => info!("teardown hook finished"),
        Ok(status) => warn!(%status, "teardown hook exited unsuccessfully"),
        Err(err) => warn!(error = %err, "failed to run teardown hook"),
    }
}
