// src/logging.rs

//! Logging setup: `tracing` events to stderr through an `EnvFilter`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (one level for the crate; HTTP client internals stay at
//!    `warn`)
//! 2. `TASKLOOP_LOG`, taken as full filter directives such as
//!    `taskloop=debug,reqwest=info`
//! 3. `info`
//!
//! Stdout carries only the end-of-run summary.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "TASKLOOP_LOG";

const DEFAULT_LEVEL: &str = "info";
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Resolve the filter directives from the CLI flag and the environment.
///
/// An empty or unparsable environment value falls back to the default.
pub fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(level) = cli_level {
        return format!("{},{QUIET_DEPENDENCIES}", level.as_str());
    }

    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() && EnvFilter::try_new(value).is_ok() => value.to_string(),
        _ => format!("{DEFAULT_LEVEL},{QUIET_DEPENDENCIES}"),
    }
}
