//! Connection configuration loading.
//!
//! Settings are resolved from an optional `roadsync.toml` file with
//! environment variables taking precedence. Two spellings are accepted for
//! each variable (`JIRA_URL`/`JIRA_INSTANCE`, `JIRA_USER`/`EMAIL`,
//! `JIRA_TOKEN`/`API_TOKEN`) for compatibility with existing setups.
//! Every missing setting is reported in one batch.

use serde::Deserialize;
use std::path::Path;

use crate::error::SyncError;

/// Resolved connection settings for one run.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Base URL of the tracker instance (scheme required).
    pub base_url: String,
    /// Account email used for basic auth.
    pub email: String,
    /// API token used for basic auth.
    pub api_token: String,
    /// Default project key; a roadmap document or CLI flag may override it.
    pub project_key: Option<String>,
}

/// Optional `roadsync.toml` file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Connection settings section (optional).
    pub jira: Option<FileJiraConfig>,
}

/// The `[jira]` section of `roadsync.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileJiraConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub project_key: Option<String>,
}

impl JiraConfig {
    /// Load settings from an optional config file plus the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SyncError> {
        let file = match config_path {
            Some(path) => Some(FileConfig::read(path)?),
            None => None,
        };
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Resolve settings from file values and an environment lookup.
    ///
    /// Split out from [`JiraConfig::load`] so tests can inject the
    /// environment instead of mutating process state.
    pub fn resolve(
        file: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let jira = file.and_then(|f| f.jira).unwrap_or_default();

        let env_first = |primary: &str, fallback: &str| {
            env(primary)
                .or_else(|| env(fallback))
                .filter(|v| !v.trim().is_empty())
        };

        let base_url = env_first("JIRA_URL", "JIRA_INSTANCE").or(jira.base_url);
        let email = env_first("JIRA_USER", "EMAIL").or(jira.email);
        let api_token = env_first("JIRA_TOKEN", "API_TOKEN").or(jira.api_token);
        let project_key = env("PROJECT_KEY")
            .filter(|v| !v.trim().is_empty())
            .or(jira.project_key);

        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push("JIRA_URL/JIRA_INSTANCE");
        }
        if email.is_none() {
            missing.push("JIRA_USER/EMAIL");
        }
        if api_token.is_none() {
            missing.push("JIRA_TOKEN/API_TOKEN");
        }
        if !missing.is_empty() {
            return Err(SyncError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let base_url = base_url.unwrap();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(SyncError::Configuration(format!(
                "base URL must start with http:// or https:// (got '{}')",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            email: email.unwrap(),
            api_token: api_token.unwrap(),
            project_key,
        })
    }
}

impl FileConfig {
    /// Read and parse a `roadsync.toml` file.
    pub fn read(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            SyncError::Configuration(format!("cannot parse {}: {}", path.display(), e))
        })
    }
}
