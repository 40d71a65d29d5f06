use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants::DEFAULT_API_VERSION;
use crate::api::resilience::PollConfig;
use crate::copier::renamer::{MAX_API_NAME_LEN, RenamePolicy};

/// Tuning values read once at startup.
///
/// Sources, later wins: built-in defaults, the TOML file, environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_version: String,
    pub log_level: String,
    /// Write logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
    pub copy: CopySettings,
    pub deploy: DeploySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CopySettings {
    pub label_suffix: String,
    pub api_suffix: String,
    pub max_api_name_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeploySettings {
    pub poll_interval_secs: u64,
    pub max_poll_interval_secs: u64,
    pub backoff_multiplier: f64,
    pub max_wait_secs: u64,
    pub rollback_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            log_level: "info".to_string(),
            log_file: None,
            copy: CopySettings::default(),
            deploy: DeploySettings::default(),
        }
    }
}

impl Default for CopySettings {
    fn default() -> Self {
        let policy = RenamePolicy::default();
        Self {
            label_suffix: policy.label_suffix,
            api_suffix: policy.api_suffix,
            max_api_name_length: MAX_API_NAME_LEN,
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_poll_interval_secs: 15,
            backoff_multiplier: 1.5,
            max_wait_secs: 600,
            rollback_on_error: false,
        }
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("sf-copier")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".sf-copier")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (or the default location when `None`), then apply
    /// environment overrides. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::get_config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply overrides from a variable lookup, normally the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(version) = var("SF_API_VERSION") {
            self.api_version = version.trim().to_string();
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.trim().to_lowercase();
        }
        if let Some(path) = var("LOG_FILE") {
            self.log_file = Some(PathBuf::from(path.trim()));
        }
        if let Some(suffix) = var("SF_COPY_LABEL_SUFFIX") {
            self.copy.label_suffix = suffix;
        }
        if let Some(suffix) = var("SF_COPY_API_SUFFIX") {
            self.copy.api_suffix = suffix.trim().to_string();
        }
        if let Some(secs) = var("SF_DEPLOY_MAX_WAIT_SECS") {
            self.deploy.max_wait_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("SF_DEPLOY_MAX_WAIT_SECS is not a number: {}", secs))?;
        }
        if let Some(rollback) = var("SF_ROLLBACK_ON_ERROR") {
            self.deploy.rollback_on_error = rollback.trim().eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_version.parse::<f32>().is_err() {
            anyhow::bail!("Invalid API version: {}", self.api_version);
        }
        self.rename_policy()
            .check()
            .context("Invalid [copy] settings")?;
        if self.deploy.poll_interval_secs == 0 {
            anyhow::bail!("deploy.poll_interval_secs must be at least 1");
        }
        if self.deploy.backoff_multiplier < 1.0 {
            anyhow::bail!("deploy.backoff_multiplier must be >= 1.0");
        }
        Ok(())
    }

    pub fn rename_policy(&self) -> RenamePolicy {
        RenamePolicy {
            label_suffix: self.copy.label_suffix.clone(),
            api_suffix: self.copy.api_suffix.clone(),
            max_api_len: self.copy.max_api_name_length,
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        let interval = Duration::from_secs(self.deploy.poll_interval_secs);
        PollConfig {
            interval,
            max_interval: Duration::from_secs(self.deploy.max_poll_interval_secs).max(interval),
            backoff_multiplier: self.deploy.backoff_multiplier,
            max_wait: Duration::from_secs(self.deploy.max_wait_secs),
            jitter: true,
        }
    }
}
