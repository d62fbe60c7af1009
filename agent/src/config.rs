//! Configuration management for the agent.

use outbox_engine::EngineConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Where the outbox lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite database at a connection URL
    Sqlite(String),
    /// Single JSON snapshot file
    Snapshot(PathBuf),
}

impl StoreBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite(_) => "sqlite",
            StoreBackend::Snapshot(_) => "snapshot",
        }
    }
}

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local surface host address
    pub host: String,
    /// Local surface port
    pub port: u16,
    pub store: StoreBackend,
    /// Base URL of the remote persistence API
    pub remote_url: String,
    /// Bearer token sent to the remote API
    pub remote_token: Option<String>,
    /// Bearer token required from local clients
    pub auth_token: Option<String>,
    /// Periodic drain interval; `None` disables the timer
    pub sync_interval: Option<Duration>,
    /// Synced records older than this are pruned on each tick; `None` keeps them
    pub retention: Option<Duration>,
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "4100".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let store = match var("OUTBOX_SNAPSHOT_PATH") {
            Some(path) => StoreBackend::Snapshot(PathBuf::from(path)),
            None => StoreBackend::Sqlite(
                var("DATABASE_URL").unwrap_or_else(|| "sqlite://outbox.db".to_string()),
            ),
        };

        let remote_url = var("REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;
        if !remote_url.starts_with("http://") && !remote_url.starts_with("https://") {
            return Err(ConfigError::InvalidRemoteUrl(remote_url));
        }

        let interval_secs: u64 = var("SYNC_INTERVAL_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidSyncInterval)?;
        let sync_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        let retention = match var("OUTBOX_RETENTION_HOURS") {
            Some(raw) => {
                let hours: u64 = raw.parse().map_err(|_| ConfigError::InvalidRetention)?;
                Some(Duration::from_secs(hours.saturating_mul(3600)))
            }
            None => None,
        };

        let engine = match var("OUTBOX_MAX_ATTEMPTS") {
            Some(raw) => {
                let max: u32 = raw.parse().map_err(|_| ConfigError::InvalidMaxAttempts)?;
                EngineConfig::default().with_max_attempts(max)
            }
            None => EngineConfig::default(),
        };

        Ok(Self {
            host,
            port,
            store,
            remote_url,
            remote_token: var("REMOTE_TOKEN"),
            auth_token: var("AUTH_TOKEN"),
            sync_interval,
            retention,
            engine,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("REMOTE_URL must be an http(s) URL, got '{0}'")]
    InvalidRemoteUrl(String),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid SYNC_INTERVAL_SECS value")]
    InvalidSyncInterval,

    #[error("Invalid OUTBOX_MAX_ATTEMPTS value")]
    InvalidMaxAttempts,

    #[error("Invalid OUTBOX_RETENTION_HOURS value")]
    InvalidRetention,
}
