use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{normalize_address, Transaction};
use crate::storage::schema::initialize_schema;
use crate::storage::{AddressRegistry, CursorStore, StorageError, StorageResult, TransactionLedger};

/// SQLite-backed storage; subscriptions, matches and the cursor survive restarts.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file and initialize the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Lock("Failed to acquire lock".to_string()))
    }

    pub fn subscription_count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn transaction_count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl AddressRegistry for SqliteStorage {
    fn subscribe(&self, address: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO subscriptions (address) VALUES (?1)",
            params![normalize_address(address)],
        )?;
        Ok(())
    }

    fn is_subscribed(&self, address: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM subscriptions WHERE address = ?1",
                params![normalize_address(address)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl TransactionLedger for SqliteStorage {
    fn record(&self, address: &str, transaction: &Transaction) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO transactions (address, hash, from_address, to_address, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                normalize_address(address),
                transaction.hash,
                transaction.from,
                transaction.to,
                transaction.value
            ],
        )?;
        Ok(())
    }

    fn list(&self, address: &str) -> StorageResult<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT hash, from_address, to_address, value
             FROM transactions WHERE address = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![normalize_address(address)], |row| {
            Ok(Transaction {
                hash: row.get(0)?,
                from: row.get(1)?,
                to: row.get(2)?,
                value: row.get(3)?,
            })
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?);
        }
        Ok(transactions)
    }
}

impl CursorStore for SqliteStorage {
    fn load_cursor(&self) -> StorageResult<Option<u64>> {
        let conn = self.conn()?;
        let height: Option<i64> = conn
            .query_row(
                "SELECT last_processed_block FROM cursor WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        height
            .map(|h| u64::try_from(h).map_err(|_| StorageError::OutOfRange(h.to_string())))
            .transpose()
    }

    fn save_cursor(&self, height: u64) -> StorageResult<()> {
        let height = i64::try_from(height).map_err(|_| StorageError::OutOfRange(height.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cursor (id, last_processed_block) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET
                last_processed_block = excluded.last_processed_block,
                updated_at = strftime('%s', 'now')",
            params![height],
        )?;
        Ok(())
    }
}
