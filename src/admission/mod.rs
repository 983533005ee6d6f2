// src/admission/mod.rs

//! Admission control: may a new task start right now?
//!
//! The loop asks an [`AdmissionControl`] before every task. The production
//! gate ([`UsageGate`]) compares the account's usage windows against a
//! threshold and caches the answer for a TTL. Any failure while checking is
//! treated as "admit": the check must never be the reason work stops.
//!
//! - [`credentials`] reads the bearer token from the platform store.
//! - [`usage`] fetches and parses the usage document.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::model::DEFAULT_REQUEST_TIMEOUT;
use crate::errors::Result;

pub mod credentials;
pub mod usage;

pub use credentials::{CredentialStore, FileCredentialStore, KeychainCredentialStore};
pub use usage::{parse_usage, OAuthUsageProvider};

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Ok,
    Over,
}

/// Utilization percentages (0-100) for both usage windows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Utilization {
    pub five_hour: f64,
    pub seven_day: f64,
}

impl Utilization {
    /// `Over` if either window is at or above `threshold`.
    pub fn admission(&self, threshold: f64) -> Admission {
        if self.five_hour >= threshold || self.seven_day >= threshold {
            Admission::Over
        } else {
            Admission::Ok
        }
    }
}

/// A cached utilization reading.
#[derive(Debug, Clone, Copy)]
pub struct QuotaSnapshot {
    pub utilization: Utilization,
    pub captured_at: Instant,
    pub ttl: Duration,
}

impl QuotaSnapshot {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.captured_at) < self.ttl
    }
}

/// Source of utilization readings.
pub trait UsageProvider: Send + Sync {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Utilization>> + Send + '_>>;
}

/// What the loop consults before starting a task.
pub trait AdmissionControl: Send {
    fn check(&mut self) -> Pin<Box<dyn Future<Output = Admission> + Send + '_>>;
}

/// Admission disabled in config: every check passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAdmit;

impl AdmissionControl for AlwaysAdmit {
    fn check(&mut self) -> Pin<Box<dyn Future<Output = Admission> + Send + '_>> {
        Box::pin(async { Admission::Ok })
    }
}

/// Threshold gate over a [`UsageProvider`], with a TTL cache.
pub struct UsageGate<P: UsageProvider> {
    provider: P,
    threshold: f64,
    ttl: Duration,
    /// Bound on one provider fetch, credential lookup included.
    fetch_timeout: Duration,
    snapshot: Option<QuotaSnapshot>,
}

impl<P: UsageProvider> UsageGate<P> {
    pub fn new(provider: P, threshold: f64, ttl: Duration) -> Self {
        Self {
            provider,
            threshold,
            ttl,
            fetch_timeout: DEFAULT_REQUEST_TIMEOUT,
            snapshot: None,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// The cached reading, if any.
    pub fn snapshot(&self) -> Option<&QuotaSnapshot> {
        self.snapshot.as_ref()
    }

    /// Check usage, refreshing the cached snapshot when it has expired.
    pub async fn check_usage(&mut self) -> Admission {
        let now = Instant::now();

        let utilization = match self.snapshot {
            Some(snap) if snap.is_fresh(now) => {
                debug!(utilization = ?snap.utilization, "using cached usage snapshot");
                snap.utilization
            }
            _ => match tokio::time::timeout(self.fetch_timeout, self.provider.fetch()).await {
                Ok(Ok(utilization)) => {
                    self.snapshot = Some(QuotaSnapshot {
                        utilization,
                        captured_at: now,
                        ttl: self.ttl,
                    });
                    utilization
                }
                Ok(Err(err)) => {
                    // Fail open; errors are not cached so the next check retries.
                    warn!(error = %err, "usage check failed; admitting task");
                    return Admission::Ok;
                }
                Err(_) => {
                    warn!(
                        timeout_secs = self.fetch_timeout.as_secs(),
                        "usage check timed out; admitting task"
                    );
                    return Admission::Ok;
                }
            },
        };

        let admission = utilization.admission(self.threshold);
        if admission == Admission::Over {
            info!(
                five_hour = utilization.five_hour,
                seven_day = utilization.seven_day,
                threshold = self.threshold,
                "usage at or above threshold"
            );
        }
        admission
    }
}

impl<P: UsageProvider> AdmissionControl for UsageGate<P> {
    fn check(&mut self) -> Pin<Box<dyn Future<Output = Admission> + Send + '_>> {
        Box::pin(self.check_usage())
    }
}

impl AdmissionControl for Box<dyn AdmissionControl> {
    fn check(&mut self) -> Pin<Box<dyn Future<Output = Admission> + Send + '_>> {
        (**self).check()
    }
}

/// Build the admission gate described by `settings`.
///
/// A gate that cannot be constructed (e.g. the HTTP client fails to build)
/// degrades to [`AlwaysAdmit`], in line with the fail-open policy.
pub fn from_settings(settings: &crate::config::AdmissionSettings) -> Box<dyn AdmissionControl> {
    if !settings.enabled {
        info!("admission control disabled");
        return Box::new(AlwaysAdmit);
    }

    match OAuthUsageProvider::from_settings(settings) {
        Ok(provider) => Box::new(
            UsageGate::new(provider, settings.threshold, settings.cache_ttl)
                .with_fetch_timeout(settings.request_timeout),
        ),
        Err(err) => {
            warn!(error = %err, "admission control unavailable; admitting all tasks");
            Box::new(AlwaysAdmit)
        }
    }
}
