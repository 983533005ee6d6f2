// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::config::duration::parse_duration;
use crate::config::model::{
    AdmissionSettings, Config, HookSettings, LoopSettings, MAX_DURATION, RawAdmissionSection,
    RawConfigFile, RawLoopSection, RawWatchdogSection, RawWorkerSection, SourceSettings,
    WatchdogSettings, WorkerSettings,
};
use crate::errors::{Result, TaskloopError};

impl TryFrom<RawConfigFile> for Config {
    type Error = crate::errors::TaskloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let run = validate_loop(&raw.run)?;
        let admission = validate_admission(&raw.admission)?;
        let watchdog = validate_watchdog(&raw.watchdog)?;
        let worker = validate_worker(raw.worker)?;

        let source = SourceSettings {
            program: raw
                .source
                .program
                .unwrap_or_else(|| SourceSettings::default().program),
        };
        ensure_non_empty("[source].program", &source.program)?;

        let hooks = HookSettings {
            teardown: raw.hooks.teardown.filter(|cmd| !cmd.trim().is_empty()),
        };

        Ok(Config {
            run,
            admission,
            watchdog,
            worker,
            source,
            hooks,
        })
    }
}

fn validate_loop(raw: &RawLoopSection) -> Result<LoopSettings> {
    let defaults = LoopSettings::default();

    let settings = LoopSettings {
        max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
        max_consecutive_failures: raw
            .max_consecutive_failures
            .unwrap_or(defaults.max_consecutive_failures),
        stop_file: raw.stop_file.clone().unwrap_or(defaults.stop_file),
        stop_poll_interval: duration_or(
            "[loop].stop_poll_interval",
            raw.stop_poll_interval.as_deref(),
            defaults.stop_poll_interval,
        )?,
    };

    if settings.max_consecutive_failures == 0 {
        return Err(TaskloopError::config(
            "[loop].max_consecutive_failures must be >= 1 (got 0)",
        ));
    }

    if settings.max_consecutive_failures <= settings.max_retries {
        // Legal, but the breaker will trip before any task can be skipped.
        warn!(
            max_retries = settings.max_retries,
            max_consecutive_failures = settings.max_consecutive_failures,
            "max_consecutive_failures <= max_retries; a single failing task aborts the run"
        );
    }

    ensure_positive("[loop].stop_poll_interval", settings.stop_poll_interval)?;

    Ok(settings)
}

fn validate_admission(raw: &RawAdmissionSection) -> Result<AdmissionSettings> {
    let defaults = AdmissionSettings::default();

    let settings = AdmissionSettings {
        enabled: raw.enabled.unwrap_or(defaults.enabled),
        threshold: raw.threshold.unwrap_or(defaults.threshold),
        cache_ttl: duration_or(
            "[admission].cache_ttl",
            raw.cache_ttl.as_deref(),
            defaults.cache_ttl,
        )?,
        wait: duration_or("[admission].wait", raw.wait.as_deref(), defaults.wait)?,
        endpoint: raw.endpoint.clone().unwrap_or(defaults.endpoint),
        keychain_service: raw
            .keychain_service
            .clone()
            .unwrap_or(defaults.keychain_service),
        credentials_file: raw.credentials_file.as_deref().map(expand_home),
        request_timeout: duration_or(
            "[admission].request_timeout",
            raw.request_timeout.as_deref(),
            defaults.request_timeout,
        )?,
        headers: raw.headers.clone().unwrap_or(defaults.headers),
    };

    if !(settings.threshold > 0.0 && settings.threshold <= 100.0) {
        return Err(TaskloopError::config(format!(
            "[admission].threshold must be in (0, 100] (got {})",
            settings.threshold
        )));
    }

    if settings.enabled {
        ensure_non_empty("[admission].endpoint", &settings.endpoint)?;
        ensure_positive("[admission].wait", settings.wait)?;
    }

    Ok(settings)
}

fn validate_watchdog(raw: &RawWatchdogSection) -> Result<WatchdogSettings> {
    let defaults = WatchdogSettings::default();

    let settings = WatchdogSettings {
        poll_interval: duration_or(
            "[watchdog].poll_interval",
            raw.poll_interval.as_deref(),
            defaults.poll_interval,
        )?,
        warn_after: duration_or(
            "[watchdog].warn_after",
            raw.warn_after.as_deref(),
            defaults.warn_after,
        )?,
        kill_after: duration_or(
            "[watchdog].kill_after",
            raw.kill_after.as_deref(),
            defaults.kill_after,
        )?,
    };

    ensure_positive("[watchdog].poll_interval", settings.poll_interval)?;

    if settings.warn_after >= settings.kill_after {
        return Err(TaskloopError::config(format!(
            "[watchdog].warn_after ({:?}) must be shorter than kill_after ({:?})",
            settings.warn_after, settings.kill_after
        )));
    }

    Ok(settings)
}

fn validate_worker(raw: RawWorkerSection) -> Result<WorkerSettings> {
    let defaults = WorkerSettings::default();

    let settings = WorkerSettings {
        program: raw.program.unwrap_or(defaults.program),
        default_model: raw.default_model.unwrap_or(defaults.default_model),
        allowed_tools: raw.allowed_tools.unwrap_or(defaults.allowed_tools),
        extra_args: raw.extra_args,
        instructions: raw.instructions.filter(|s| !s.trim().is_empty()),
    };

    ensure_non_empty("[worker].program", &settings.program)?;
    ensure_non_empty("[worker].default_model", &settings.default_model)?;

    Ok(settings)
}

fn duration_or(field: &str, raw: Option<&str>, default: Duration) -> Result<Duration> {
    let Some(s) = raw else {
        return Ok(default);
    };

    let value =
        parse_duration(s).map_err(|e| TaskloopError::config(format!("{field}: {e}")))?;

    if value > MAX_DURATION {
        return Err(TaskloopError::config(format!(
            "{field}: {value:?} exceeds the maximum of {MAX_DURATION:?}"
        )));
    }
    Ok(value)
}

fn ensure_positive(field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(TaskloopError::config(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(())
}

fn ensure_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TaskloopError::config(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
