pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod retry;
pub mod shutdown;
pub mod storage;

pub use blockchain::{BlockMonitor, BlockMonitorConfig, CursorHandle, RpcClient};
pub use config::{AppConfig, NotifierKind, StorageBackend};
pub use error::{IndexerError, MonitorError, Result, RpcError, StorageError};
pub use models::{Direction, Transaction};
pub use notifier::{LogNotifier, NoopNotifier, Notifier, NotifierBackend, RecordingNotifier};
pub use shutdown::ShutdownHandle;
pub use storage::{AddressRegistry, CursorStore, MemoryStorage, SqliteStorage, Storage, TransactionLedger};
