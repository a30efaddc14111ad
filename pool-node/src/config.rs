use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level configuration for `pool-node`: sectioned TOML, a `from_file`
/// loader, and a `development` convenience constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool: PoolSection,
    pub upstream: UpstreamSection,
    pub server: ServerSection,
    #[serde(default)]
    pub shares: SharesSection,
    #[serde(default)]
    pub webhooks: WebhooksSection,
    #[serde(default)]
    pub operational: OperationalSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    pub name: String,
    pub difficulty: u64,
    /// Seconds; `<= 0` disables the status timer.
    pub status_notification_interval_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSection {
    pub rpc_url: String,
    /// 5s retry interval by default; configurable so tests and alternate
    /// deployments aren't stuck with the production value.
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesSection {
    pub rate_window_secs: u64,
}

impl Default for SharesSection {
    fn default() -> Self {
        Self {
            rate_window_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksSection {
    pub url: Option<String>,
    pub enabled: bool,
}

impl Default for WebhooksSection {
    fn default() -> Self {
        Self {
            url: None,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalSection {
    pub log_level: String,
    pub structured_logging: bool,
}

impl Default for OperationalSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl PoolConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// A convenience configuration for running against a local upstream and
    /// server without a config file on disk.
    pub fn development() -> Self {
        Self {
            pool: PoolSection {
                name: "dev-pool".to_string(),
                difficulty: 1,
                status_notification_interval_secs: 30,
            },
            upstream: UpstreamSection {
                rpc_url: "ws://127.0.0.1:9988".to_string(),
                retry_interval_secs: 5,
            },
            server: ServerSection {
                listen_addr: "127.0.0.1:3001".to_string(),
            },
            shares: SharesSection::default(),
            webhooks: WebhooksSection::default(),
            operational: OperationalSection::default(),
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.upstream.retry_interval_secs)
    }

    pub fn status_interval(&self) -> Option<Duration> {
        if self.pool.status_notification_interval_secs <= 0 {
            None
        } else {
            Some(Duration::from_secs(
                self.pool.status_notification_interval_secs as u64,
            ))
        }
    }
}
