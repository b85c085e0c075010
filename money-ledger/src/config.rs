//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RPC listen address
    pub listen_addr: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Transfer engine configuration
    pub transfer: TransferConfig,

    /// Query service configuration
    pub query: QueryConfig,

    /// Startup fixture accounts
    pub seed: SeedConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "money-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:50051".to_string(),
            rocksdb: RocksDBConfig::default(),
            transfer: TransferConfig::default(),
            query: QueryConfig::default(),
            seed: SeedConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// How long a transaction waits for a row lock (milliseconds)
    pub lock_timeout_ms: i64,

    /// fsync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            lock_timeout_ms: 1_000,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Transfer engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Retries after a lock timeout or write conflict (nothing committed yet)
    pub max_conflict_retries: u32,

    /// Base backoff between conflict retries (milliseconds, multiplied by attempt)
    pub conflict_backoff_ms: u64,

    /// Deadline applied when the caller supplies none (milliseconds)
    pub default_timeout_ms: u64,
}

impl TransferConfig {
    /// Default deadline as a duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.conflict_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            conflict_backoff_ms: 5,
            default_timeout_ms: 5_000,
        }
    }
}

/// Query service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when the caller sends none
    pub default_page_size: usize,

    /// Upper bound applied to any requested page size
    pub max_page_size: usize,

    /// Read timeout (milliseconds)
    pub timeout_ms: u64,
}

impl QueryConfig {
    /// Read timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
            timeout_ms: 2_000,
        }
    }
}

/// Startup fixture accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Load fixtures before serving
    pub enabled: bool,

    /// Accounts to provision
    pub accounts: Vec<SeedAccount>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            accounts: crate::seed::default_fixtures(),
        }
    }
}

/// One fixture account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    /// Display name
    pub name: String,
    /// Unique email
    pub email: String,
    /// Opening balance as decimal text
    pub balance: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    ///
    /// `LEDGER_CONFIG` names a TOML file used as the base; the remaining
    /// variables override individual fields.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = match std::env::var("LEDGER_CONFIG") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("LEDGER_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(seed) = std::env::var("LEDGER_SEED") {
            config.seed.enabled = parse_flag(&seed)?;
        }

        if let Ok(json) = std::env::var("LEDGER_LOG_JSON") {
            config.log.json = parse_flag(&json)?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!("Invalid boolean flag: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "money-ledger");
        assert_eq!(config.listen_addr, "0.0.0.0:50051");
        assert!(!config.seed.enabled);
        assert_eq!(config.seed.accounts.len(), 4);
        assert_eq!(config.transfer.max_conflict_retries, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            listen_addr = "127.0.0.1:7000"

            [transfer]
            max_conflict_retries = 7

            [seed]
            enabled = true
            accounts = [{ name = "Eve", email = "eve@example.com", balance = "12.34" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(config.transfer.max_conflict_retries, 7);
        assert_eq!(config.transfer.default_timeout_ms, 5_000);
        assert_eq!(config.query.max_page_size, 500);
        assert!(config.seed.enabled);
        assert_eq!(config.seed.accounts.len(), 1);
        assert_eq!(config.seed.accounts[0].balance, "12.34");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("listen_addr = [").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_backoff_grows_with_attempt() {
        let transfer = TransferConfig::default();
        assert_eq!(transfer.backoff(1), Duration::from_millis(5));
        assert_eq!(transfer.backoff(3), Duration::from_millis(15));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
