//! Configuration management
//!
//! Everything comes from the environment (optionally seeded from `.env`).
//! Unset variables fall back to the defaults below; set but unparsable
//! variables are an error rather than silently defaulted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::IngestSettings;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/odp";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Ingestion Constants
// ============================================================================

/// Collector passes per ingestion task, including the first.
pub const DEFAULT_INGEST_MAX_FETCH_ATTEMPTS: u32 = 3;

/// First retry delay in milliseconds; doubles on every further retry.
pub const DEFAULT_INGEST_BACKOFF_BASE_MS: u64 = 500;

/// Upper bound on a single retry delay in milliseconds.
pub const DEFAULT_INGEST_BACKOFF_MAX_MS: u64 = 30_000;

/// Longest wait for the next collector record in seconds.
pub const DEFAULT_INGEST_FETCH_TIMEOUT_SECS: u64 = 60;

/// Age after which a `running` run is reported as stale (6 hours).
pub const DEFAULT_INGEST_STALE_RUN_THRESHOLD_SECS: u64 = 21_600;

/// Directory scanned for `<SOURCE>.jsonl` provider dumps.
pub const DEFAULT_INGEST_COLLECTOR_DIR: &str = "data/collectors";

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_fetch_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub fetch_timeout_secs: u64,
    pub stale_run_threshold_secs: u64,
    pub collector_dir: PathBuf,
}

impl IngestConfig {
    pub fn stale_run_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_run_threshold_secs)
    }
}

impl From<&IngestConfig> for IngestSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_fetch_attempts: config.max_fetch_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Parse an environment variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {name} ({raw:?}): {e}")),
        _ => Ok(default),
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read the environment without touching `.env` or validating
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server: ServerConfig {
                host: env_string("ODP_HOST", DEFAULT_SERVER_HOST),
                port: env_or("ODP_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: env_or("ODP_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?,
            },
            database: DatabaseConfig {
                url: env_string("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS)?,
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
                idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS)?,
            },
            ingest: IngestConfig {
                max_fetch_attempts: env_or(
                    "INGEST_MAX_FETCH_ATTEMPTS",
                    DEFAULT_INGEST_MAX_FETCH_ATTEMPTS,
                )?,
                backoff_base_ms: env_or("INGEST_BACKOFF_BASE_MS", DEFAULT_INGEST_BACKOFF_BASE_MS)?,
                backoff_max_ms: env_or("INGEST_BACKOFF_MAX_MS", DEFAULT_INGEST_BACKOFF_MAX_MS)?,
                fetch_timeout_secs: env_or(
                    "INGEST_FETCH_TIMEOUT_SECS",
                    DEFAULT_INGEST_FETCH_TIMEOUT_SECS,
                )?,
                stale_run_threshold_secs: env_or(
                    "INGEST_STALE_RUN_THRESHOLD_SECS",
                    DEFAULT_INGEST_STALE_RUN_THRESHOLD_SECS,
                )?,
                collector_dir: PathBuf::from(env_string(
                    "INGEST_COLLECTOR_DIR",
                    DEFAULT_INGEST_COLLECTOR_DIR,
                )),
            },
            cors: CorsConfig {
                allowed_origins: env_string("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false)?,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.ingest.max_fetch_attempts == 0 {
            anyhow::bail!("INGEST_MAX_FETCH_ATTEMPTS must be at least 1");
        }

        if self.ingest.fetch_timeout_secs == 0 {
            anyhow::bail!("INGEST_FETCH_TIMEOUT_SECS must be greater than 0");
        }

        if self.ingest.stale_run_threshold_secs == 0 {
            anyhow::bail!("INGEST_STALE_RUN_THRESHOLD_SECS must be greater than 0");
        }

        if self.ingest.backoff_base_ms > self.ingest.backoff_max_ms {
            anyhow::bail!(
                "INGEST_BACKOFF_BASE_MS ({}) cannot exceed INGEST_BACKOFF_MAX_MS ({})",
                self.ingest.backoff_base_ms,
                self.ingest.backoff_max_ms
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        if self.cors.allow_credentials
            && (self.cors.allowed_origins.is_empty()
                || self.cors.allowed_origins.iter().any(|o| o == "*"))
        {
            anyhow::bail!("CORS_ALLOW_CREDENTIALS requires explicit CORS_ALLOWED_ORIGINS");
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            ingest: IngestConfig {
                max_fetch_attempts: DEFAULT_INGEST_MAX_FETCH_ATTEMPTS,
                backoff_base_ms: DEFAULT_INGEST_BACKOFF_BASE_MS,
                backoff_max_ms: DEFAULT_INGEST_BACKOFF_MAX_MS,
                fetch_timeout_secs: DEFAULT_INGEST_FETCH_TIMEOUT_SECS,
                stale_run_threshold_secs: DEFAULT_INGEST_STALE_RUN_THRESHOLD_SECS,
                collector_dir: PathBuf::from(DEFAULT_INGEST_COLLECTOR_DIR),
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
        }
    }
}
