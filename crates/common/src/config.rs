use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Seconds between notification cycles (default: 30)
    pub notifier_interval_secs: u64,

    /// Maximum notifications in flight at once (default: 10)
    pub notifier_parallelism: usize,

    /// Grace period for closing network connections on shutdown (default: 1000)
    pub shutdown_grace_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            notifier_interval_secs: lookup("NOTIFIER_INTERVAL_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFIER_INTERVAL_SECS must be a valid u64"))?,
            notifier_parallelism: lookup("NOTIFIER_PARALLELISM")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFIER_PARALLELISM must be a valid usize"))?,
            shutdown_grace_ms: lookup("SHUTDOWN_GRACE_MS")
                .unwrap_or_else(|| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SHUTDOWN_GRACE_MS must be a valid u64"))?,
        };

        if config.notifier_interval_secs == 0 {
            anyhow::bail!("NOTIFIER_INTERVAL_SECS must be greater than zero");
        }
        if config.notifier_parallelism == 0 {
            anyhow::bail!("NOTIFIER_PARALLELISM must be greater than zero");
        }
        // Each in-flight dispatch holds a pooled connection for its transaction.
        if config.notifier_parallelism > config.db_max_connections as usize {
            anyhow::bail!(
                "NOTIFIER_PARALLELISM ({}) must not exceed DB_MAX_CONNECTIONS ({})",
                config.notifier_parallelism,
                config.db_max_connections
            );
        }

        Ok(config)
    }

    pub fn notifier_interval(&self) -> Duration {
        Duration::from_secs(self.notifier_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
