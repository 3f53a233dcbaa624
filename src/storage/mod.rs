//! Storage contracts for subscriptions, matched transactions and the
//! ingestion cursor, plus the in-memory and SQLite backends.
//!
//! All methods are synchronous and hold their locks only for the duration of
//! a single map or statement operation, so they are safe to call from async
//! code without ever being held across an RPC await.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use crate::error::StorageError;
pub use memory::MemoryStorage;
pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;

use crate::models::Transaction;

pub type StorageResult<T> = Result<T, StorageError>;

/// Set of subscribed addresses. Keys are compared after normalization.
pub trait AddressRegistry: Send + Sync {
    fn subscribe(&self, address: &str) -> StorageResult<()>;
    fn is_subscribed(&self, address: &str) -> StorageResult<bool>;
}

/// Append-only, per-address list of matched transactions.
pub trait TransactionLedger: Send + Sync {
    fn record(&self, address: &str, transaction: &Transaction) -> StorageResult<()>;

    /// Records for `address` in insertion order; empty when unknown.
    fn list(&self, address: &str) -> StorageResult<Vec<Transaction>>;
}

/// Highest fully processed block height, kept across restarts.
pub trait CursorStore: Send + Sync {
    fn load_cursor(&self) -> StorageResult<Option<u64>>;
    fn save_cursor(&self, height: u64) -> StorageResult<()>;
}

/// Everything the ingestion loop and the API need from a backend.
pub trait Storage: AddressRegistry + TransactionLedger + CursorStore {}

impl<T> Storage for T where T: AddressRegistry + TransactionLedger + CursorStore {}
