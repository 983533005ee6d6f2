// src/engine/mod.rs

//! Orchestration engine for taskloop.
//!
//! - [`run_state`] is the pure retry / circuit-breaker bookkeeping.
//! - [`lifecycle`] covers interrupts, the stop sentinel, teardown and the
//!   end-of-run report.
//! - [`runtime`] is the async loop driving source, admission and workers.

pub mod lifecycle;
pub mod run_state;
pub mod runtime;

pub use lifecycle::{
    run_teardown_hook, spawn_signal_listener, ExitReason, Interrupt, RunReport, StopSentinel,
};
pub use run_state::{FailureVerdict, RetryLimits, RunState};
pub use runtime::{LoopOptions, Orchestrator};
