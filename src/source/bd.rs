// src/source/bd.rs

//! [`TaskSource`] backed by the `bd` issue tracker CLI.
//!
//! Every call shells out once and parses the `--json` output. The tracker
//! owns ordering and dependency exclusion for `bd ready`.

use std::process::Stdio;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{Result, TaskloopError};
use crate::source::{SourceFuture, Task, TaskSource, TaskStatus};

#[derive(Debug, Clone)]
pub struct BdTaskSource {
    program: String,
}

impl BdTaskSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn exec(&self, args: &[&str]) -> Result<String> {
        debug!(program = %self.program, ?args, "running task source command");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("running '{} {}'", self.program, args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TaskloopError::SourceError(format!(
                "'{} {}' exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn exec_json<T: DeserializeOwned + Default>(&self, args: &[&str]) -> Result<T> {
        let stdout = self.exec(args).await?;
        parse_json_or_default(&stdout).map_err(|e| {
            TaskloopError::SourceError(format!(
                "parsing JSON from '{} {}': {e}",
                self.program,
                args.join(" ")
            ))
        })
    }
}

/// Parse tracker JSON, treating empty output and `null` as "nothing".
pub fn parse_json_or_default<T: DeserializeOwned + Default>(
    raw: &str,
) -> std::result::Result<T, serde_json::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed)
}

impl TaskSource for BdTaskSource {
    fn list_in_progress(&self) -> SourceFuture<'_, Vec<Task>> {
        Box::pin(async move {
            self.exec_json(&["list", "--status", TaskStatus::InProgress.as_str(), "--json"])
                .await
        })
    }

    fn list_ready(&self) -> SourceFuture<'_, Vec<Task>> {
        Box::pin(async move { self.exec_json(&["ready", "--json"]).await })
    }

    fn update_status<'a>(&'a self, id: &'a str, status: TaskStatus) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            self.exec(&["update", id, "--status", status.as_str()]).await?;
            Ok(())
        })
    }

    fn close<'a>(&'a self, id: &'a str, reason: &'a str) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            self.exec(&["close", id, "--reason", reason]).await?;
            Ok(())
        })
    }

    fn labels<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move { self.exec_json(&["label", "list", id, "--json"]).await })
    }
}
