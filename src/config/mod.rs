//! Configuration for the adforge engine and CLI.
//!
//! Settings load from a TOML file in the platform config directory, with
//! environment-variable overrides for the gateway URL and API key so CI and
//! scripts can point at a different backend without touching the file.

use crate::error::{Error, Result};
use crate::poller::PollPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "ADFORGE_API_URL";
pub const ENV_API_KEY: &str = "ADFORGE_API_KEY";

/// Get the global adforge directory for storing configuration and session data
pub fn get_global_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "adforge", "adforge")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
}

fn default_config_path() -> Result<PathBuf> {
    ProjectDirs::from("dev", "adforge", "adforge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub poll: PollConfig,
    pub references: ReferenceCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the remote generation gateway
    pub base_url: String,
    /// API key sent as a bearer token; usually supplied via ADFORGE_API_KEY
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.adforge.dev".to_string(),
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Polling budgets for long-running generation jobs.
///
/// Images settle within about a minute; video renders can take several, so
/// the video policy carries a ten-minute budget at the same interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub image: PollPolicyConfig,
    pub video: PollPolicyConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            image: PollPolicyConfig {
                initial_delay_secs: 10,
                interval_secs: 10,
                max_attempts: 7,
            },
            video: PollPolicyConfig {
                initial_delay_secs: 10,
                interval_secs: 10,
                max_attempts: 60,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPolicyConfig {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl From<&PollPolicyConfig> for PollPolicy {
    fn from(cfg: &PollPolicyConfig) -> Self {
        PollPolicy {
            initial_delay: Duration::from_secs(cfg.initial_delay_secs),
            interval: Duration::from_secs(cfg.interval_secs),
            max_attempts: cfg.max_attempts,
        }
    }
}

/// Style-reference images the autopilot samples from when the user has not
/// selected one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReferenceCatalog {
    pub urls: Vec<String>,
}

impl ReferenceCatalog {
    pub fn pick_random(&self) -> Option<&str> {
        use rand::prelude::IndexedRandom;
        self.urls.choose(&mut rand::rng()).map(|s| s.as_str())
    }
}

impl Config {
    /// Load configuration from the given path, or the default location when
    /// `None`. A missing file yields defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.is_empty() {
                self.gateway.base_url = url;
            }
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.is_empty() {
                self.gateway.api_key = Some(key);
            }
        }
    }
}
