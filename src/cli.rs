// src/cli.rs

//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::exec::PermissionMode;

/// Work through a task queue one supervised worker at a time.
#[derive(Debug, Clone, Parser)]
#[command(name = "taskloop", version, long_about = None)]
pub struct CliArgs {
    /// Config file (TOML). A missing `Taskloop.toml` in the working
    /// directory means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Taskloop.toml")]
    pub config: PathBuf,

    /// Bypass every worker permission prompt instead of passing the
    /// configured tool allow-list.
    #[arg(long)]
    pub skip_permissions: bool,

    /// Log level for taskloop itself. Overrides `TASKLOOP_LOG`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config, print the resolved settings and the task that
    /// would run next, then exit without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn permission_mode(&self) -> PermissionMode {
        if self.skip_permissions {
            PermissionMode::Bypass
        } else {
            PermissionMode::Scoped
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
