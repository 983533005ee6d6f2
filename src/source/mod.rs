// src/source/mod.rs

//! Task source: the external queue the loop consumes.
//!
//! The loop never owns task state; it reads tasks and requests status
//! transitions through the [`TaskSource`] trait.
//!
//! - [`bd`] implements the trait on top of the `bd` tracker CLI.
//! - [`selector`] decides which task runs next.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::Result;

pub mod bd;
pub mod selector;

pub use bd::BdTaskSource;
pub use selector::{model_for, next_task};

/// Canonical task id type.
pub type TaskId = String;

/// Label prefix selecting the worker model, e.g. `model:opus`.
pub const MODEL_LABEL_PREFIX: &str = "model:";

/// Status of a task as tracked by the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "closed" => Ok(TaskStatus::Closed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A unit of work as read from the task source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Lower value means more urgent.
    #[serde(default)]
    pub priority: i64,
    /// Labels, when the source includes them in listings.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Task {
    /// Model named by a `model:<name>` label, if any.
    pub fn model_label(&self) -> Option<&str> {
        model_from_labels(&self.labels)
    }
}

/// Return the first `model:<name>` label value with a non-empty name.
pub fn model_from_labels<S: AsRef<str>>(labels: &[S]) -> Option<&str> {
    labels
        .iter()
        .filter_map(|l| l.as_ref().strip_prefix(MODEL_LABEL_PREFIX))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

/// Boxed future returned by [`TaskSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The external task store.
///
/// Production code uses [`BdTaskSource`]; tests provide an in-memory store.
pub trait TaskSource: Send + Sync {
    /// Tasks currently marked `in_progress`.
    fn list_in_progress(&self) -> SourceFuture<'_, Vec<Task>>;

    /// Open tasks whose dependencies are satisfied, in priority order.
    fn list_ready(&self) -> SourceFuture<'_, Vec<Task>>;

    fn update_status<'a>(&'a self, id: &'a str, status: TaskStatus) -> SourceFuture<'a, ()>;

    /// Close a task, recording why.
    fn close<'a>(&'a self, id: &'a str, reason: &'a str) -> SourceFuture<'a, ()>;

    fn labels<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Vec<String>>;
}
