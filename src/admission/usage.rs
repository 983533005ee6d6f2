// src/admission/usage.rs

//! Usage endpoint client.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::admission::credentials::{platform_store, CredentialStore};
use crate::admission::{UsageProvider, Utilization};
use crate::config::AdmissionSettings;
use crate::errors::Result;

/// One usage window: either a bare percentage or an object carrying
/// `utilization` (plus fields we ignore, such as reset times).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsageWindow {
    Bare(f64),
    Detailed {
        #[serde(default)]
        utilization: Option<f64>,
    },
}

impl UsageWindow {
    fn percent(&self) -> f64 {
        match self {
            UsageWindow::Bare(v) => *v,
            UsageWindow::Detailed { utilization } => utilization.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsageDocument {
    #[serde(default)]
    five_hour: Option<UsageWindow>,
    #[serde(default)]
    seven_day: Option<UsageWindow>,
}

/// Parse a usage response body. Missing windows count as 0%.
pub fn parse_usage(body: &str) -> Result<Utilization> {
    let doc: UsageDocument = serde_json::from_str(body).context("parsing usage response")?;

    Ok(Utilization {
        five_hour: doc.five_hour.as_ref().map_or(0.0, UsageWindow::percent),
        seven_day: doc.seven_day.as_ref().map_or(0.0, UsageWindow::percent),
    })
}

/// Fetches utilization from the OAuth usage endpoint.
pub struct OAuthUsageProvider {
    client: reqwest::Client,
    endpoint: String,
    headers: BTreeMap<String, String>,
    credentials: Box<dyn CredentialStore>,
}

impl OAuthUsageProvider {
    pub fn new(
        settings: &AdmissionSettings,
        credentials: Box<dyn CredentialStore>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("building HTTP client for usage checks")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            headers: settings.headers.clone(),
            credentials,
        })
    }

    /// Provider using the platform's default credential store.
    pub fn from_settings(settings: &AdmissionSettings) -> Result<Self> {
        Self::new(settings, platform_store(settings))
    }

    async fn fetch_inner(&self) -> Result<Utilization> {
        let token = self.credentials.access_token().await?;

        let mut request = self.client.get(&self.endpoint).bearer_auth(token);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("requesting {}", self.endpoint))?
            .error_for_status()
            .context("usage endpoint returned an error status")?;

        let body = response.text().await.context("reading usage response")?;
        let utilization = parse_usage(&body)?;

        debug!(
            five_hour = utilization.five_hour,
            seven_day = utilization.seven_day,
            "fetched usage"
        );

        Ok(utilization)
    }
}

impl UsageProvider for OAuthUsageProvider {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Utilization>> + Send + '_>> {
        Box::pin(self.fetch_inner())
    }
}
