// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use taskloop::config::{
    default_config_path, load_and_validate, load_from_path, load_or_default, parse_duration,
    Config,
};
use taskloop::engine::LoopOptions;
use taskloop::errors::TaskloopError;
use taskloop::exec::{IdlePolicy, PermissionMode};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Taskloop.toml");
    std::fs::write(&path, contents).expect("write config");
    (dir, path)
}

fn config_error(contents: &str) -> String {
    let (_dir, path) = write_config(contents);
    match load_and_validate(&path) {
        Err(TaskloopError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn demo_config_loads() -> TestResult {
    init_tracing();

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest.join("demos/Taskloop.toml"))?;

    assert_eq!(cfg.run.max_retries, 2);
    assert_eq!(cfg.run.max_consecutive_failures, 4);
    assert_eq!(cfg.run.stop_poll_interval, Duration::from_secs(2));
    assert_eq!(cfg.admission.threshold, 70.0);
    assert_eq!(
        cfg.admission.headers.get("anthropic-beta").map(String::as_str),
        Some("oauth-2025-04-20")
    );
    assert_eq!(cfg.watchdog.warn_after, Duration::from_secs(180));
    assert_eq!(cfg.watchdog.kill_after, Duration::from_secs(600));
    assert_eq!(cfg.worker.allowed_tools.len(), 6);
    assert!(cfg
        .worker
        .instructions
        .as_deref()
        .is_some_and(|s| s.contains("close the\ntask")));
    assert_eq!(cfg.source.program, "bd");
    assert_eq!(cfg.hooks.teardown.as_deref(), Some("docker compose down"));

    Ok(())
}

#[test]
fn empty_file_means_defaults() -> TestResult {
    let (_dir, path) = write_config("");
    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.run.max_retries, 3);
    assert_eq!(cfg.run.max_consecutive_failures, 5);
    assert_eq!(cfg.run.stop_file, PathBuf::from(".taskloop-stop"));
    assert!(cfg.admission.enabled);
    assert_eq!(cfg.admission.threshold, 80.0);
    assert_eq!(cfg.admission.cache_ttl, Duration::from_secs(300));
    assert_eq!(cfg.admission.wait, Duration::from_secs(600));
    assert_eq!(IdlePolicy::from(cfg.watchdog), IdlePolicy::default());
    assert_eq!(cfg.worker.program, "claude");
    assert_eq!(cfg.worker.default_model, "sonnet");
    assert!(cfg.worker.instructions.is_none());
    assert!(cfg.hooks.teardown.is_none());

    Ok(())
}

#[test]
fn partial_sections_keep_other_defaults() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[loop]
max_retries = 0

[watchdog]
kill_after = "20m"

[worker]
default_model = "opus"
extra_args = ["--add-dir", "../shared"]
"#,
    );
    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.run.max_retries, 0);
    assert_eq!(cfg.run.max_consecutive_failures, 5);
    assert_eq!(cfg.watchdog.warn_after, Duration::from_secs(180));
    assert_eq!(cfg.watchdog.kill_after, Duration::from_secs(1200));
    assert_eq!(cfg.worker.default_model, "opus");
    assert_eq!(cfg.worker.extra_args, vec!["--add-dir", "../shared"]);

    Ok(())
}

#[test]
fn loop_options_follow_config() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[loop]
max_retries = 1
max_consecutive_failures = 2
stop_poll_interval = "250ms"

[admission]
wait = "30s"

[worker]
instructions = "Be brief."

[hooks]
teardown = "true"
"#,
    );
    let cfg = load_and_validate(&path)?;
    let opts = LoopOptions::from_config(&cfg, PermissionMode::Bypass);

    assert_eq!(opts.limits.max_retries, 1);
    assert_eq!(opts.limits.max_consecutive_failures, 2);
    assert_eq!(opts.poll_interval, Duration::from_millis(250));
    assert_eq!(opts.admission_wait, Duration::from_secs(30));
    assert_eq!(opts.instructions.as_deref(), Some("Be brief."));
    assert_eq!(opts.permissions, PermissionMode::Bypass);
    assert_eq!(opts.teardown.as_deref(), Some("true"));

    Ok(())
}

#[test]
fn blank_hook_and_instructions_are_dropped() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[worker]
instructions = "   "

[hooks]
teardown = ""
"#,
    );
    let cfg = load_and_validate(&path)?;
    assert!(cfg.worker.instructions.is_none());
    assert!(cfg.hooks.teardown.is_none());
    Ok(())
}

#[test]
fn home_relative_credentials_file_is_expanded() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[admission]
credentials_file = "~/.claude/.credentials.json"
"#,
    );
    let cfg = load_and_validate(&path)?;
    let creds = cfg.admission.credentials_file.expect("credentials file");

    if let Some(home) = dirs::home_dir() {
        assert_eq!(creds, home.join(".claude/.credentials.json"));
    }
    Ok(())
}

#[test]
fn zero_consecutive_failures_is_rejected() {
    let msg = config_error("[loop]\nmax_consecutive_failures = 0\n");
    assert!(msg.contains("max_consecutive_failures"));
}

#[test]
fn threshold_out_of_range_is_rejected() {
    assert!(config_error("[admission]\nthreshold = 0.0\n").contains("threshold"));
    assert!(config_error("[admission]\nthreshold = 100.5\n").contains("threshold"));
    assert!(config_error("[admission]\nthreshold = -3.0\n").contains("threshold"));
}

#[test]
fn threshold_of_one_hundred_is_allowed() -> TestResult {
    let (_dir, path) = write_config("[admission]\nthreshold = 100.0\n");
    assert_eq!(load_and_validate(&path)?.admission.threshold, 100.0);
    Ok(())
}

#[test]
fn warn_must_precede_kill() {
    let msg = config_error("[watchdog]\nwarn_after = \"10m\"\nkill_after = \"10m\"\n");
    assert!(msg.contains("warn_after"));

    let msg = config_error("[watchdog]\nwarn_after = \"20m\"\n");
    assert!(msg.contains("warn_after"));
}

#[test]
fn zero_intervals_are_rejected() {
    assert!(config_error("[watchdog]\npoll_interval = \"0s\"\n").contains("poll_interval"));
    assert!(config_error("[loop]\nstop_poll_interval = \"0ms\"\n").contains("stop_poll_interval"));
}

#[test]
fn empty_programs_are_rejected() {
    assert!(config_error("[worker]\nprogram = \"\"\n").contains("[worker].program"));
    assert!(config_error("[source]\nprogram = \" \"\n").contains("[source].program"));
}

#[test]
fn bad_duration_names_the_field() {
    let msg = config_error("[admission]\ncache_ttl = \"5 minutes\"\n");
    assert!(msg.contains("[admission].cache_ttl"));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let (_dir, path) = write_config("[loop\nmax_retries = 3");
    assert!(matches!(
        load_from_path(&path),
        Err(TaskloopError::TomlError(_))
    ));

    let (_dir, path) = write_config("[loop]\nmax_retries = \"three\"\n");
    assert!(matches!(
        load_and_validate(&path),
        Err(TaskloopError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_or_default(&missing),
        Err(TaskloopError::IoError(_))
    ));
}

#[test]
fn default_path_is_in_working_directory() {
    assert_eq!(default_config_path(), PathBuf::from("Taskloop.toml"));
}

#[test]
fn default_config_matches_empty_file() -> TestResult {
    let (_dir, path) = write_config("");
    let loaded = load_and_validate(&path)?;
    let built_in = Config::default();

    assert_eq!(loaded.run.max_retries, built_in.run.max_retries);
    assert_eq!(loaded.admission.endpoint, built_in.admission.endpoint);
    assert_eq!(loaded.admission.headers, built_in.admission.headers);
    assert_eq!(loaded.worker.allowed_tools, built_in.worker.allowed_tools);
    Ok(())
}

#[test]
fn durations_parse() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("15s"), Ok(Duration::from_secs(15)));
    assert_eq!(parse_duration(" 3m "), Ok(Duration::from_secs(180)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_duration("10M"), Ok(Duration::from_secs(600)));
}

#[test]
fn bad_durations_are_rejected() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("15").is_err());
    assert!(parse_duration("m").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("1.5s").is_err());
}

#[test]
fn overflowing_durations_are_errors() {
    let err = parse_duration("400000000000000000m").expect_err("minutes overflow");
    assert!(err.contains("too large"), "{err}");
    assert!(parse_duration("6000000000000000h").is_err());
    assert!(parse_duration("99999999999999999999s").is_err());
    assert_eq!(
        parse_duration("18446744073709551615ms"),
        Ok(Duration::from_millis(u64::MAX))
    );
}

#[test]
fn durations_beyond_thirty_days_are_rejected() {
    let msg = config_error("[admission]\nwait = \"18446744073709551615s\"\n");
    assert!(msg.contains("[admission].wait"), "{msg}");
    assert!(msg.contains("exceeds the maximum"), "{msg}");

    let msg = config_error("[watchdog]\nkill_after = \"99999999h\"\n");
    assert!(msg.contains("[watchdog].kill_after"), "{msg}");
}

#[test]
fn thirty_days_is_the_longest_accepted_duration() -> TestResult {
    let (_dir, path) = write_config("[admission]\nwait = \"720h\"\n");
    let config = load_and_validate(&path)?;
    assert_eq!(config.admission.wait, Duration::from_secs(30 * 24 * 60 * 60));
    Ok(())
}
