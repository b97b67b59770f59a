use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::trace;

use crate::util;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Outcomes older than this many days are deleted; kept forever when unset
        #[serde(default)]
        retention_days: Option<u32>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: None,
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/monitor.db")
}

/// Where transition notifications go
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationConfig {
    /// Only log notifications
    #[default]
    Log,

    Telegram {
        bot_token: String,

        /// Bot API base URL, for self-hosted API servers
        #[serde(default)]
        api_base: Option<String>,
    },

    Webhook {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Global cap on simultaneous probes
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Interval in seconds for targets added without one
    #[serde(default = "default_interval")]
    pub default_interval: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: default_max_concurrent_checks(),
            default_interval: default_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }
}

fn default_max_concurrent_checks() -> usize {
    10
}

fn default_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub api: ApiSettings,
}

impl Config {
    /// Override file values with the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override file values with variables resolved through `lookup`
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let scheduler = &mut self.scheduler;
        scheduler.max_concurrent_checks = util::parse_or(
            &lookup,
            util::MAX_CONCURRENT_CHECKS,
            scheduler.max_concurrent_checks,
        );
        scheduler.default_interval =
            util::parse_or(&lookup, util::DEFAULT_INTERVAL, scheduler.default_interval);
        scheduler.probe_timeout =
            util::parse_or(&lookup, util::PROBE_TIMEOUT, scheduler.probe_timeout);

        if let Some(path) = util::non_empty(&lookup, util::DATABASE_PATH) {
            let retention_days = match &self.storage {
                StorageConfig::Sqlite { retention_days, .. } => *retention_days,
                StorageConfig::None => None,
            };
            self.storage = StorageConfig::Sqlite {
                path: PathBuf::from(path),
                retention_days,
            };
        }

        if let Some(bot_token) = util::non_empty(&lookup, util::TELEGRAM_BOT_TOKEN) {
            let api_base = match &self.notifications {
                NotificationConfig::Telegram { api_base, .. } => api_base.clone(),
                _ => None,
            };
            self.notifications = NotificationConfig::Telegram {
                bot_token,
                api_base,
            };
        }

        if let Some(bind) = util::non_empty(&lookup, util::API_BIND) {
            self.api.bind = bind;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.max_concurrent_checks == 0 {
            bail!("scheduler.max_concurrent_checks must be at least 1");
        }
        if !(1..=crate::MAX_INTERVAL_SECS).contains(&self.scheduler.default_interval) {
            bail!(
                "scheduler.default_interval must be between 1 and {} seconds",
                crate::MAX_INTERVAL_SECS
            );
        }
        if self.scheduler.probe_timeout == 0 {
            bail!("scheduler.probe_timeout must be at least 1 second");
        }
        if let NotificationConfig::Telegram { bot_token, .. } = &self.notifications {
            if bot_token.trim().is_empty() {
                bail!("notifications.bot_token must not be empty");
            }
        }
        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file provided: {path}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
