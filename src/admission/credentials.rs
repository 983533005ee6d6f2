// src/admission/credentials.rs

//! Bearer credential lookup from the platform's secure store.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tokio::process::Command;

use crate::config::AdmissionSettings;
use crate::errors::Result;

/// Something that can hand out the current access token.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// macOS keychain entry, read through the `security` tool.
#[derive(Debug, Clone)]
pub struct KeychainCredentialStore {
    service: String,
}

impl KeychainCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl CredentialStore for KeychainCredentialStore {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let output = Command::new("security")
                .args(["find-generic-password", "-s", &self.service, "-w"])
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .context("running `security find-generic-password`")?;

            if !output.status.success() {
                return Err(anyhow!(
                    "keychain entry '{}' not readable (exit {})",
                    self.service,
                    output.status
                )
                .into());
            }

            extract_access_token(&String::from_utf8_lossy(&output.stdout))
        })
    }
}

/// JSON credentials file, as written by the worker CLI on Linux.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("reading credentials file {:?}", self.path))?;
            extract_access_token(&raw)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsDocument {
    claude_ai_oauth: Option<OAuthEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthEntry {
    access_token: String,
}

/// Pull the access token out of a stored credential.
///
/// Accepts the JSON credentials document or a bare token string.
pub fn extract_access_token(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        let doc: CredentialsDocument =
            serde_json::from_str(trimmed).context("parsing credentials JSON")?;
        return doc
            .claude_ai_oauth
            .map(|entry| entry.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("credentials JSON has no OAuth access token").into());
    }

    if trimmed.is_empty() {
        return Err(anyhow!("stored credential is empty").into());
    }

    Ok(trimmed.to_string())
}

/// Default location of the credentials file.
pub fn default_credentials_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join(".credentials.json"))
}

/// Choose the credential store for this platform.
///
/// An explicit `credentials_file` always wins. Otherwise macOS uses the
/// keychain and everything else the default credentials file.
pub fn platform_store(settings: &AdmissionSettings) -> Box<dyn CredentialStore> {
    if let Some(path) = &settings.credentials_file {
        return Box::new(FileCredentialStore::new(path.clone()));
    }

    if cfg!(target_os = "macos") {
        return Box::new(KeychainCredentialStore::new(settings.keychain_service.clone()));
    }

    let path = default_credentials_file()
        .unwrap_or_else(|| PathBuf::from(".claude/.credentials.json"));
    Box::new(FileCredentialStore::new(path))
}
