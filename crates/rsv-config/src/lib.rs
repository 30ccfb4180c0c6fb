//! Environment-driven configuration for the reconciliation engine.
//!
//! Loading never fails on a malformed polling interval: the default is used
//! and the problem is returned in [`LoadedConfig::warnings`] so the binary
//! can log it once tracing is up.

use anyhow::{Context, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_URL: &str = "RSV_DATABASE_URL";
pub const ENV_POLLING_INTERVAL: &str = "RSV_POLLING_INTERVAL_MINUTES";
pub const ENV_MOUNT_PATH: &str = "RSV_MOUNT_PATH";
pub const ENV_SITE_CONTROLLER: &str = "RSV_SITE_CONTROLLER";
pub const ENV_UPLOAD_DIR: &str = "RSV_UPLOAD_DIR";
pub const ENV_DAEMON_ADDR: &str = "RSV_DAEMON_ADDR";

const DEFAULT_POLLING_MINUTES: u64 = 1;
/// One day.
pub const MAX_POLLING_MINUTES: u64 = 24 * 60;
const DEFAULT_MOUNT_PATH: &str = "/mnt/windows";
const DEFAULT_SITE_CONTROLLER: &str = "lincoln";
const DEFAULT_UPLOAD_DIR: &str = "/var/lib/rsv/uploads";
const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8080";

/// File-discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchConfig {
    pub polling_interval_minutes: u64,
    pub mount_path: PathBuf,
    /// Site controller whose export format the watched files use.
    pub site_controller: String,
}

impl WatchConfig {
    /// Clamped to [`MAX_POLLING_MINUTES`] for hand-built configs.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_minutes.min(MAX_POLLING_MINUTES) * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub watch: WatchConfig,
    pub upload_dir: PathBuf,
    pub daemon_addr: SocketAddr,
    /// `None` when unset; only commands that touch the DB require it.
    #[serde(skip)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub warnings: Vec<String>,
}

impl EngineConfig {
    /// Load `.env.local` if present, then read the process environment.
    pub fn from_env() -> Result<LoadedConfig> {
        // Silent if the file does not exist; deployments inject env vars directly.
        let _ = dotenvy::from_filename(".env.local");
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<LoadedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        let polling_interval_minutes = match get(ENV_POLLING_INTERVAL) {
            None => DEFAULT_POLLING_MINUTES,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    warnings.push(format!(
                        "{ENV_POLLING_INTERVAL} must be > 0; using {DEFAULT_POLLING_MINUTES}"
                    ));
                    DEFAULT_POLLING_MINUTES
                }
                Ok(n) if n > MAX_POLLING_MINUTES => {
                    warnings.push(format!(
                        "{ENV_POLLING_INTERVAL} must be <= {MAX_POLLING_MINUTES} ('{raw}'); using {DEFAULT_POLLING_MINUTES}"
                    ));
                    DEFAULT_POLLING_MINUTES
                }
                Ok(n) => n,
                Err(e) => {
                    warnings.push(format!(
                        "{ENV_POLLING_INTERVAL} should be an integer ('{raw}': {e}); using {DEFAULT_POLLING_MINUTES}"
                    ));
                    DEFAULT_POLLING_MINUTES
                }
            },
        };

        let addr_raw = get(ENV_DAEMON_ADDR).unwrap_or_else(|| DEFAULT_DAEMON_ADDR.to_string());
        let daemon_addr: SocketAddr = addr_raw
            .parse()
            .with_context(|| format!("invalid {ENV_DAEMON_ADDR}: {addr_raw}"))?;

        let config = EngineConfig {
            watch: WatchConfig {
                polling_interval_minutes,
                mount_path: PathBuf::from(
                    get(ENV_MOUNT_PATH).unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
                ),
                site_controller: get(ENV_SITE_CONTROLLER)
                    .unwrap_or_else(|| DEFAULT_SITE_CONTROLLER.to_string()),
            },
            upload_dir: PathBuf::from(
                get(ENV_UPLOAD_DIR).unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            daemon_addr,
            database_url: get(ENV_DB_URL),
        };

        Ok(LoadedConfig { config, warnings })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("missing env var {ENV_DB_URL}"))
    }
}
