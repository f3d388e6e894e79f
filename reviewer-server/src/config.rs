use anyhow::{bail, Context, Result};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// File name of the SQLite database inside `state_dir`.
pub const DATABASE_FILE: &str = "pr-reviewer.db";

/// Where reviewer state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    /// Lost on restart; intended for tests and local experiments.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("unknown storage backend '{}' (expected 'sqlite' or 'memory')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_address: IpAddr,
    pub storage_backend: StorageBackend,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub log_level: Level,
    /// How long in-flight requests get to finish after a shutdown signal.
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let bind_address = var("BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("BIND_ADDRESS must be an IP address")?;

        let storage_backend = var("STORAGE_BACKEND")
            .map(|v| v.parse::<StorageBackend>())
            .transpose()
            .context("STORAGE_BACKEND is invalid")?
            .unwrap_or(StorageBackend::Sqlite);

        let state_dir = var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let log_level = var("LOG_LEVEL")
            .map(|v| v.parse::<Level>())
            .transpose()
            .context("LOG_LEVEL must be one of trace, debug, info, warn, error")?
            .unwrap_or(Level::INFO);

        let shutdown_grace = var("SHUTDOWN_GRACE_SECS")
            .unwrap_or_else(|| "5".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("SHUTDOWN_GRACE_SECS must be a whole number of seconds")?;

        Ok(Config {
            port,
            bind_address,
            storage_backend,
            state_dir,
            log_level,
            shutdown_grace,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE)
    }
}
