use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::models::{normalize_address, Transaction};
use crate::storage::{AddressRegistry, CursorStore, StorageError, StorageResult, TransactionLedger};

/// Process-lifetime storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    subscribers: Mutex<HashSet<String>>,
    transactions: Mutex<HashMap<String, Vec<Transaction>>>,
    cursor: Mutex<Option<u64>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StorageError::Lock(e.to_string()))
}

impl AddressRegistry for MemoryStorage {
    fn subscribe(&self, address: &str) -> StorageResult<()> {
        lock(&self.subscribers)?.insert(normalize_address(address));
        Ok(())
    }

    fn is_subscribed(&self, address: &str) -> StorageResult<bool> {
        Ok(lock(&self.subscribers)?.contains(&normalize_address(address)))
    }
}

impl TransactionLedger for MemoryStorage {
    fn record(&self, address: &str, transaction: &Transaction) -> StorageResult<()> {
        lock(&self.transactions)?
            .entry(normalize_address(address))
            .or_default()
            .push(transaction.clone());
        Ok(())
    }

    fn list(&self, address: &str) -> StorageResult<Vec<Transaction>> {
        Ok(lock(&self.transactions)?
            .get(&normalize_address(address))
            .cloned()
            .unwrap_or_default())
    }
}

impl CursorStore for MemoryStorage {
    fn load_cursor(&self) -> StorageResult<Option<u64>> {
        Ok(*lock(&self.cursor)?)
    }

    fn save_cursor(&self, height: u64) -> StorageResult<()> {
        *lock(&self.cursor)? = Some(height);
        Ok(())
    }
}
