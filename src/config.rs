use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub notifier: NotifierConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Ethereum JSON-RPC endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds; expiry counts as a transport failure
    pub timeout_seconds: u64,
    /// Retries for transport failures. 0 keeps the stop-on-first-failure policy.
    pub max_retries: u32,
    /// Initial retry delay in seconds
    pub retry_delay_seconds: u64,
    /// Maximum retry delay in seconds
    pub max_retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            _ => Err(invalid("storage.backend", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite database file path, used by the sqlite backend
    pub path: String,
}

/// Block processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Sleep between polling cycles, in seconds
    pub poll_interval_seconds: u64,
    /// Cursor value when storage holds none; the first block processed is this + 1
    pub start_block: u64,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
    pub host: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Log,
    None,
}

impl FromStr for NotifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(NotifierKind::Log),
            "none" => Ok(NotifierKind::None),
            _ => Err(invalid("notifier.kind", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ethereum-rpc.publicnode.com".to_string(),
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_seconds: 2,
            max_retry_delay_seconds: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: "./indexer.db".to_string(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            start_block: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
        }
    }
}

/// Upper bound for `rpc.max_retry_delay_seconds`
pub const MAX_RETRY_DELAY_SECONDS: u64 = 3600;

fn parse_env<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Same as [`AppConfig::load`] with an explicit file path
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("ETH_RPC_URL") {
            self.rpc.endpoint = endpoint;
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = parse_env("RPC_TIMEOUT_SECONDS", timeout)?;
        }
        if let Ok(retries) = env::var("RPC_MAX_RETRIES") {
            self.rpc.max_retries = parse_env("RPC_MAX_RETRIES", retries)?;
        }

        if let Ok(backend) = env::var("STORAGE") {
            self.storage.backend = backend.parse()?;
        }
        if let Ok(path) = env::var("DATABASE_PATH") {
            self.storage.path = path;
        }

        if let Ok(interval) = env::var("BLOCK_POLL_INTERVAL") {
            self.processing.poll_interval_seconds = parse_env("BLOCK_POLL_INTERVAL", interval)?;
        }
        if let Ok(start) = env::var("START_BLOCK") {
            self.processing.start_block = parse_env("START_BLOCK", start)?;
        }

        if let Ok(enabled) = env::var("API_ENABLED") {
            self.api.enabled = parse_env("API_ENABLED", enabled)?;
        }
        if let Ok(port) = env::var("API_PORT") {
            self.api.port = parse_env("API_PORT", port)?;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(kind) = env::var("NOTIFIER") {
            self.notifier.kind = kind.parse()?;
        }

        Ok(())
    }

    /// Reject values the indexer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rpc = &self.rpc;
        if !rpc.endpoint.starts_with("http://") && !rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(rpc.endpoint.clone()));
        }

        ensure((1..=300).contains(&rpc.timeout_seconds), "rpc.timeout_seconds", rpc.timeout_seconds)?;
        ensure(rpc.max_retries <= 20, "rpc.max_retries", rpc.max_retries)?;
        ensure(
            rpc.max_retry_delay_seconds <= MAX_RETRY_DELAY_SECONDS,
            "rpc.max_retry_delay_seconds",
            rpc.max_retry_delay_seconds,
        )?;
        ensure(
            rpc.retry_delay_seconds <= rpc.max_retry_delay_seconds,
            "rpc.retry_delay_seconds",
            rpc.retry_delay_seconds,
        )?;

        let interval = self.processing.poll_interval_seconds;
        ensure((1..=300).contains(&interval), "processing.poll_interval_seconds", interval)?;

        let needs_path = self.storage.backend == StorageBackend::Sqlite;
        ensure(
            !needs_path || !self.storage.path.trim().is_empty(),
            "storage.path",
            &self.storage.path,
        )?;

        ensure(self.api.port != 0, "api.port", self.api.port)?;

        let level = self.logging.level.as_str();
        ensure(
            matches!(level, "error" | "warn" | "info" | "debug" | "trace"),
            "logging.level",
            level,
        )?;

        let format = self.logging.format.as_str();
        ensure(matches!(format, "json" | "pretty"), "logging.format", format)
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn ensure(ok: bool, key: &str, value: impl ToString) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rpc.endpoint, "https://ethereum-rpc.publicnode.com");
        assert_eq!(config.rpc.max_retries, 0);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.processing.poll_interval_seconds, 5);
        assert_eq!(config.processing.start_block, 0);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.notifier.kind, NotifierKind::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.rpc.endpoint = "ws://node".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        config = AppConfig::default();
        config.rpc.timeout_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.processing.poll_interval_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = "  ".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_is_bounded() {
        let mut config = AppConfig::default();
        config.rpc.max_retry_delay_seconds = MAX_RETRY_DELAY_SECONDS;
        assert!(config.validate().is_ok());

        config.rpc.max_retry_delay_seconds = MAX_RETRY_DELAY_SECONDS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "rpc.max_retry_delay_seconds"
        ));

        config.rpc.retry_delay_seconds = u64::MAX;
        config.rpc.max_retry_delay_seconds = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert!("postgres".parse::<StorageBackend>().is_err());
        assert_eq!("none".parse::<NotifierKind>().unwrap(), NotifierKind::None);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("ETH_RPC_URL", "http://localhost:8545");
        env::set_var("STORAGE", "sqlite");
        env::set_var("BLOCK_POLL_INTERVAL", "12");
        env::set_var("START_BLOCK", "19000000");
        env::set_var("RPC_MAX_RETRIES", "3");

        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.rpc.endpoint, "http://localhost:8545");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.processing.poll_interval_seconds, 12);
        assert_eq!(config.processing.start_block, 19_000_000);
        assert_eq!(config.rpc.max_retries, 3);

        env::remove_var("ETH_RPC_URL");
        env::remove_var("STORAGE");
        env::remove_var("BLOCK_POLL_INTERVAL");
        env::remove_var("START_BLOCK");
        env::remove_var("RPC_MAX_RETRIES");
    }

    #[test]
    #[serial]
    fn test_invalid_env_values() {
        env::set_var("RPC_TIMEOUT_SECONDS", "soon");

        let mut config = AppConfig::default();
        let result = config.apply_env_overrides();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        env::remove_var("RPC_TIMEOUT_SECONDS");
    }

    #[test]
    fn test_config_file_loading() {
        let config_content = r#"
[rpc]
endpoint = "https://custom-rpc.example/"
timeout_seconds = 45

[storage]
backend = "sqlite"
path = "/tmp/custom.db"

[processing]
poll_interval_seconds = 3
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = AppConfig::load_from_file(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.rpc.endpoint, "https://custom-rpc.example/");
        assert_eq!(config.rpc.timeout_seconds, 45);
        // unspecified keys keep their defaults
        assert_eq!(config.rpc.max_retries, 0);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path, "/tmp/custom.db");
        assert_eq!(config.processing.poll_interval_seconds, 3);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load_from_file("/definitely/not/here.toml").unwrap();
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_malformed_file_is_parsing_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[rpc\nendpoint = ").unwrap();

        let result = AppConfig::load_from_file(temp_file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Parsing(_))));
    }
}
