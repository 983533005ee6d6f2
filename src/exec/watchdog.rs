// src/exec/watchdog.rs

//! Idle-based stall detection for a running worker.
//!
//! The stream readers publish the instant of the last output line on a
//! `watch` channel. [`monitor`] samples it on a fixed interval and feeds the
//! idle time into a [`Watchdog`], which decides between nothing, a warning,
//! and a kill. A kill is requested at most once per worker.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::WatchdogSettings;

/// Thresholds for stall detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    pub poll_interval: Duration,
    pub warn_after: Duration,
    pub kill_after: Duration,
}

impl From<WatchdogSettings> for IdlePolicy {
    fn from(s: WatchdogSettings) -> Self {
        Self {
            poll_interval: s.poll_interval,
            warn_after: s.warn_after,
            kill_after: s.kill_after,
        }
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        WatchdogSettings::default().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    None,
    Warn,
    Kill,
}

/// Per-worker stall state machine.
#[derive(Debug, Clone)]
pub struct Watchdog {
    policy: IdlePolicy,
    warned: bool,
    killed: bool,
}

impl Watchdog {
    pub fn new(policy: IdlePolicy) -> Self {
        Self {
            policy,
            warned: false,
            killed: false,
        }
    }

    pub fn has_killed(&self) -> bool {
        self.killed
    }

    /// Decide what to do for the observed idle time.
    ///
    /// One warning per idle stretch: the warning re-arms once output resumes
    /// (idle drops back under the warn threshold). `Kill` is returned once;
    /// every later observation is `None`.
    pub fn observe(&mut self, idle: Duration) -> WatchdogAction {
        if self.killed {
            return WatchdogAction::None;
        }

        if idle >= self.policy.kill_after {
            self.killed = true;
            return WatchdogAction::Kill;
        }

        if idle >= self.policy.warn_after {
            if self.warned {
                return WatchdogAction::None;
            }
            self.warned = true;
            return WatchdogAction::Warn;
        }

        self.warned = false;
        WatchdogAction::None
    }
}

/// Poll `activity` until the worker has been idle for `kill_after`, then send
/// the idle time on `kill_tx` and return.
///
/// The caller aborts this task once the worker is gone.
pub async fn monitor(
    task_id: String,
    policy: IdlePolicy,
    activity: watch::Receiver<Instant>,
    kill_tx: oneshot::Sender<Duration>,
) {
    let mut dog = Watchdog::new(policy);
    let mut ticker = tokio::time::interval(policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let last = *activity.borrow();
        let idle = Instant::now().saturating_duration_since(last);

        match dog.observe(idle) {
            WatchdogAction::None => {
                debug!(task = %task_id, idle_secs = idle.as_secs(), "worker activity check");
            }
            WatchdogAction::Warn => {
                warn!(
                    task = %task_id,
                    idle_secs = idle.as_secs(),
                    kill_after_secs = policy.kill_after.as_secs(),
                    "worker has produced no output for a while"
                );
            }
            WatchdogAction::Kill => {
                warn!(
                    task = %task_id,
                    idle_secs = idle.as_secs(),
                    "worker stalled; requesting termination"
                );
                let _ = kill_tx.send(idle);
                return;
            }
        }
    }
}
