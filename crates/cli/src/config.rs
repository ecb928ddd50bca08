//! CLI configuration: JSON file, then environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use stepwise_progress::{AdminAllowList, ServiceConfig, UnlockPolicy};
use tracing::{info, warn};

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON documents under `storage_path`
    #[default]
    Json,
    /// SQLite database file at `storage_path`
    Sqlite,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage root (json) or database file (sqlite)
    pub storage_path: PathBuf,
    /// Storage backend
    pub backend: Backend,
    /// Admin allow-list
    pub admin_emails: Vec<String>,
    /// Unlock mode
    pub unlock_policy: UnlockPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(".stepwise"),
            backend: Backend::Json,
            admin_emails: Vec::new(),
            unlock_policy: UnlockPolicy::Tiered,
        }
    }
}

impl Config {
    /// Load `path` if it exists, then apply `STEPWISE_*` environment variables.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read the JSON config file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                Config::default()
            }
            Err(e) => return Err(e).with_context(|| format!("cannot read {}", path.display())),
        };
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("STEPWISE_STORAGE") {
            self.storage_path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("STEPWISE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.backend = b,
                Err(e) => warn!("Invalid STEPWISE_BACKEND value: {e}"),
            }
        }
        if let Some(emails) = lookup("STEPWISE_ADMIN_EMAILS") {
            self.admin_emails = emails
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(policy) = lookup("STEPWISE_UNLOCK_POLICY") {
            match policy.parse() {
                Ok(p) => self.unlock_policy = p,
                Err(e) => warn!("Invalid STEPWISE_UNLOCK_POLICY value: {e}"),
            }
        }
    }

    /// Service configuration derived from this config.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            admins: AdminAllowList::new(&self.admin_emails),
            unlock_policy: self.unlock_policy,
        }
    }
}
