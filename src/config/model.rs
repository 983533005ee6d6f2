// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
pub const DEFAULT_STOP_FILE: &str = ".taskloop-stop";
pub const DEFAULT_STOP_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_USAGE_THRESHOLD: f64 = 80.0;
pub const DEFAULT_USAGE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_USAGE_WAIT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_USAGE_ENDPOINT: &str = "https://api.anthropic.com/api/oauth/usage";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Claude Code-credentials";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_WATCHDOG_POLL: Duration = Duration::from_secs(15);
pub const DEFAULT_WARN_AFTER: Duration = Duration::from_secs(180);
pub const DEFAULT_KILL_AFTER: Duration = Duration::from_secs(600);

pub const DEFAULT_WORKER_PROGRAM: &str = "claude";
pub const DEFAULT_MODEL: &str = "sonnet";
pub const DEFAULT_SOURCE_PROGRAM: &str = "bd";

/// Longest duration any setting may take (30 days).
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [loop]
/// max_retries = 3
/// max_consecutive_failures = 5
///
/// [admission]
/// threshold = 80.0
/// wait = "10m"
///
/// [watchdog]
/// warn_after = "3m"
/// kill_after = "10m"
///
/// [worker]
/// default_model = "sonnet"
/// ```
///
/// All sections are optional. Durations are strings such as `"15s"`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default, rename = "loop")]
    pub run: RawLoopSection,

    #[serde(default)]
    pub admission: RawAdmissionSection,

    #[serde(default)]
    pub watchdog: RawWatchdogSection,

    #[serde(default)]
    pub worker: RawWorkerSection,

    #[serde(default)]
    pub source: RawSourceSection,

    #[serde(default)]
    pub hooks: RawHooksSection,
}

/// `[loop]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLoopSection {
    /// Retries granted to a failing task. A task runs at most
    /// `max_retries + 1` times in a row; the failure that leaves no retry
    /// skips it, so `0` skips on the first failure.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Failures in a row (across any tasks) that abort the whole run.
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,

    /// Sentinel file whose presence requests a graceful stop.
    #[serde(default)]
    pub stop_file: Option<PathBuf>,

    /// Granularity of the interruptible waits.
    #[serde(default)]
    pub stop_poll_interval: Option<String>,
}

/// `[admission]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAdmissionSection {
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Utilization percentage (0-100) at or above which new work waits.
    #[serde(default)]
    pub threshold: Option<f64>,

    #[serde(default)]
    pub cache_ttl: Option<String>,

    /// How long to wait before rechecking once over the threshold.
    #[serde(default)]
    pub wait: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub keychain_service: Option<String>,

    /// Credentials JSON file used where no keychain is available.
    #[serde(default)]
    pub credentials_file: Option<String>,

    #[serde(default)]
    pub request_timeout: Option<String>,

    /// Extra request headers, e.g. `anthropic-beta = "oauth-2025-04-20"`.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
}

/// `[watchdog]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWatchdogSection {
    #[serde(default)]
    pub poll_interval: Option<String>,

    #[serde(default)]
    pub warn_after: Option<String>,

    #[serde(default)]
    pub kill_after: Option<String>,
}

/// `[worker]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWorkerSection {
    #[serde(default)]
    pub program: Option<String>,

    /// Model used when a task carries no `model:<name>` label.
    #[serde(default)]
    pub default_model: Option<String>,

    /// Tool allow-list passed in scoped permission mode.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Extra instructions appended to every task prompt.
    #[serde(default)]
    pub instructions: Option<String>,
}

/// `[source]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSourceSection {
    /// Task tracker CLI.
    #[serde(default)]
    pub program: Option<String>,
}

/// `[hooks]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHooksSection {
    /// Shell command run once when the loop terminates.
    #[serde(default)]
    pub teardown: Option<String>,
}

/// Validated configuration with typed values and defaults applied.
///
/// Build one from a [`RawConfigFile`] via `TryFrom`, or take
/// [`Config::default`] for built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub run: LoopSettings,
    pub admission: AdmissionSettings,
    pub watchdog: WatchdogSettings,
    pub worker: WorkerSettings,
    pub source: SourceSettings,
    pub hooks: HookSettings,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Retries per task after its first failed attempt (see
    /// [`RawLoopSection::max_retries`]).
    pub max_retries: u32,
    pub max_consecutive_failures: u32,
    pub stop_file: PathBuf,
    pub stop_poll_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            stop_file: PathBuf::from(DEFAULT_STOP_FILE),
            stop_poll_interval: DEFAULT_STOP_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub enabled: bool,
    pub threshold: f64,
    pub cache_ttl: Duration,
    pub wait: Duration,
    pub endpoint: String,
    pub keychain_service: String,
    pub credentials_file: Option<PathBuf>,
    pub request_timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("anthropic-beta".to_string(), "oauth-2025-04-20".to_string());

        Self {
            enabled: true,
            threshold: DEFAULT_USAGE_THRESHOLD,
            cache_ttl: DEFAULT_USAGE_CACHE_TTL,
            wait: DEFAULT_USAGE_WAIT,
            endpoint: DEFAULT_USAGE_ENDPOINT.to_string(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            credentials_file: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            headers,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WatchdogSettings {
    pub poll_interval: Duration,
    pub warn_after: Duration,
    pub kill_after: Duration,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_WATCHDOG_POLL,
            warn_after: DEFAULT_WARN_AFTER,
            kill_after: DEFAULT_KILL_AFTER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub program: String,
    pub default_model: String,
    pub allowed_tools: Vec<String>,
    pub extra_args: Vec<String>,
    pub instructions: Option<String>,
}

pub fn default_allowed_tools() -> Vec<String> {
    ["Read", "Edit", "Write", "Glob", "Grep", "Bash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_WORKER_PROGRAM.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            allowed_tools: default_allowed_tools(),
            extra_args: Vec::new(),
            instructions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub program: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_SOURCE_PROGRAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HookSettings {
    pub teardown: Option<String>,
}
