use thiserror::Error;

/// Main error type for the address indexer
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Server error: {0}")]
    Server(String),
}

/// Failures talking to the chain node.
///
/// The first group are transport failures: the node could not be reached or
/// did not answer in time. The second group are protocol failures: the node
/// answered, but not with something we can use.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Response body is not valid JSON-RPC: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },
}

impl RpcError {
    /// True for transport failures, false for protocol failures.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcError::Http(_) | RpcError::Timeout { .. } | RpcError::Status { .. }
        )
    }
}

/// Backing store failures for the registry, ledger and cursor.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Reasons the ingestion loop stops.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MonitorError {
    pub fn is_transient(&self) -> bool {
        match self {
            MonitorError::Rpc(e) => e.is_transient(),
            MonitorError::Storage(_) => false,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl IndexerError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IndexerError::Config(_) => ErrorSeverity::Critical,
            IndexerError::Storage(StorageError::Sqlite(_)) => ErrorSeverity::Critical,
            IndexerError::Server(_) => ErrorSeverity::Critical,

            IndexerError::Monitor(MonitorError::Storage(_)) => ErrorSeverity::High,
            IndexerError::Storage(_) => ErrorSeverity::High,

            IndexerError::Rpc(e) | IndexerError::Monitor(MonitorError::Rpc(e)) => {
                if e.is_transient() {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
        }
    }

    /// Whether retrying the same operation could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(e) => e.is_transient(),
            IndexerError::Monitor(e) => e.is_transient(),
            IndexerError::Storage(StorageError::Lock(_)) => true,
            _ => false,
        }
    }
}
