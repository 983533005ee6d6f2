// src/lib.rs

pub mod admission;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod source;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::{load_or_default, Config};
use crate::engine::{spawn_signal_listener, Interrupt, LoopOptions, Orchestrator, StopSentinel};
use crate::errors::Result;
use crate::exec::{IdlePolicy, PermissionMode, RealWorkerBackend};
use crate::fs::RealFileSystem;
use crate::source::{model_for, next_task, BdTaskSource};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - the `bd` task source
/// - admission control
/// - the supervised worker backend
/// - signal handling and the stop sentinel
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = load_or_default(&args.config)?;

    let permissions = args.permission_mode();

    let source = BdTaskSource::new(config.source.program.clone());

    if args.dry_run {
        print_dry_run(&config, permissions, &source).await?;
        return Ok(0);
    }

    let interrupt = Interrupt::new();
    let listener = spawn_signal_listener(interrupt.clone());

    let sentinel = StopSentinel::new(Arc::new(RealFileSystem), config.run.stop_file.clone());
    let admission = admission::from_settings(&config.admission);
    let worker = RealWorkerBackend::new(config.worker.clone(), IdlePolicy::from(config.watchdog));
    let options = LoopOptions::from_config(&config, permissions);

    info!(
        permissions = ?permissions,
        max_retries = options.limits.max_retries,
        max_consecutive_failures = options.limits.max_consecutive_failures,
        stop_file = %sentinel.path().display(),
        "configuration loaded"
    );

    let orchestrator = Orchestrator::new(source, worker, admission, options, sentinel, interrupt);
    let report = orchestrator.run().await;

    listener.abort();

    println!("{report}");
    Ok(report.exit_code())
}

/// Dry-run output: resolved settings and the task that would run next.
async fn print_dry_run(
    config: &Config,
    permissions: PermissionMode,
    source: &BdTaskSource,
) -> Result<()> {
    println!("taskloop dry-run");
    println!("  permissions = {permissions:?}");
    println!("  loop.max_retries = {}", config.run.max_retries);
    println!(
        "  loop.max_consecutive_failures = {}",
        config.run.max_consecutive_failures
    );
    println!("  loop.stop_file = {}", config.run.stop_file.display());
    println!(
        "  admission = {} (threshold {}%, wait {:?}, cache {:?})",
        if config.admission.enabled { "enabled" } else { "disabled" },
        config.admission.threshold,
        config.admission.wait,
        config.admission.cache_ttl
    );
    println!(
        "  watchdog = poll {:?}, warn {:?}, kill {:?}",
        config.watchdog.poll_interval, config.watchdog.warn_after, config.watchdog.kill_after
    );
    println!(
        "  worker = {} (default model {})",
        config.worker.program, config.worker.default_model
    );
    if let Some(ref teardown) = config.hooks.teardown {
        println!("  hooks.teardown = {teardown}");
    }
    println!();

    match next_task(source, &HashSet::new()).await? {
        Some(task) => {
            let model = model_for(source, &task, &config.worker.default_model).await;
            println!("next task: {} [{}] {} (model {model})", task.id, task.status, task.title);
        }
        None => println!("next task: none (queue empty)"),
    }

    Ok(())
}
