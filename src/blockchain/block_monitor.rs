use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::blockchain::RpcClient;
use crate::config::AppConfig;
use crate::error::MonitorError;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{Block, Direction, Transaction};
use crate::notifier::Notifier;
use crate::retry::{RetryConfig, RetryManager};
use crate::shutdown::ShutdownHandle;
use crate::storage::Storage;

/// Read handle on the highest fully processed block height.
///
/// Only the ingestion loop writes it, and only after a whole block has been
/// recorded, so any reader sees either the previous height or the new one.
#[derive(Debug, Clone, Default)]
pub struct CursorHandle(Arc<AtomicU64>);

impl CursorHandle {
    pub fn new(height: u64) -> Self {
        Self(Arc::new(AtomicU64::new(height)))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn advance(&self, height: u64) {
        self.0.store(height, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct BlockMonitorConfig {
    /// Sleep between polling cycles
    pub poll_interval: Duration,
    /// Cursor value used when storage has none persisted
    pub start_block: u64,
    pub retry: RetryConfig,
}

impl Default for BlockMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            start_block: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl From<&AppConfig> for BlockMonitorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.processing.poll_interval_seconds),
            start_block: config.processing.start_block,
            retry: RetryConfig::from(&config.rpc),
        }
    }
}

/// The ingestion loop: polls the head, walks every unseen height in order,
/// records matches and notifies, then advances the cursor.
pub struct BlockMonitor<S, N> {
    rpc_client: RpcClient,
    storage: Arc<S>,
    notifier: N,
    retry: RetryManager,
    poll_interval: Duration,
    cursor: CursorHandle,
    shutdown: ShutdownHandle,
}

impl<S, N> BlockMonitor<S, N>
where
    S: Storage,
    N: Notifier,
{
    /// Seeds the cursor from storage, falling back to `config.start_block`
    pub fn new(
        rpc_client: RpcClient,
        storage: Arc<S>,
        notifier: N,
        config: BlockMonitorConfig,
    ) -> Result<Self, MonitorError> {
        let cursor = match storage.load_cursor()? {
            Some(height) => {
                LogContext::new("block_monitor", "initialization")
                    .with_block_number(height)
                    .info(&format!("Resuming from persisted cursor {}", height));
                height
            }
            None => config.start_block,
        };

        Ok(Self {
            rpc_client,
            storage,
            notifier,
            retry: RetryManager::new(config.retry),
            poll_interval: config.poll_interval,
            cursor: CursorHandle::new(cursor),
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn cursor(&self) -> CursorHandle {
        self.cursor.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Request a stop; honoured at the next sleep boundary
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run until shutdown is requested or an RPC/storage failure occurs.
    ///
    /// Failures end the loop; with `retry.max_retries > 0` transport failures
    /// are retried first.
    pub async fn run(&self) -> Result<(), MonitorError> {
        LogContext::new("block_monitor", "start")
            .with_block_number(self.cursor.get())
            .with_metadata("poll_interval_ms", json!(self.poll_interval.as_millis() as u64))
            .info("Starting block monitor");

        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                LogContext::new("block_monitor", "shutdown")
                    .with_block_number(self.cursor.get())
                    .info("Shutdown requested, stopping block monitor");
                return Ok(());
            }

            if let Err(e) = self.poll_once().await {
                LogContext::new("block_monitor", "poll")
                    .with_block_number(self.cursor.get())
                    .with_metadata("transient", json!(e.is_transient()))
                    .error(&format!("Block monitor stopped: {}", e));
                return Err(e);
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// One cycle without the sleep: process every height in `cursor+1..=head`.
    /// Returns the number of blocks processed.
    pub async fn poll_once(&self) -> Result<u64, MonitorError> {
        let head = self.fetch_head().await?;
        let start = self.cursor.get().saturating_add(1);

        let mut processed = 0;
        for height in start..=head {
            self.process_block(height).await?;
            processed += 1;
        }

        if processed > 0 {
            LogContext::new("block_monitor", "poll")
                .with_block_number(head)
                .with_metadata("processed", json!(processed))
                .debug(&format!("Caught up to head {}", head));
        }

        Ok(processed)
    }

    /// Fetch, match and record a single height, then advance the cursor to it.
    /// Returns the number of ledger records written.
    pub async fn process_block(&self, height: u64) -> Result<usize, MonitorError> {
        let block = self.fetch_block(height).await?;
        let matches = self.record_matches(&block)?;

        self.storage.save_cursor(height)?;
        self.cursor.advance(height);

        MetricsLogger::log_block_processed(height, block.transactions.len(), matches);
        Ok(matches)
    }

    fn record_matches(&self, block: &Block) -> Result<usize, MonitorError> {
        let mut matches = 0;

        for transaction in &block.transactions {
            if self.is_subscribed(&transaction.from) {
                self.record(&transaction.from, Direction::Outgoing, transaction)?;
                matches += 1;
            }
            if self.is_subscribed(&transaction.to) {
                self.record(&transaction.to, Direction::Incoming, transaction)?;
                matches += 1;
            }
        }

        Ok(matches)
    }

    fn record(&self, address: &str, direction: Direction, transaction: &Transaction) -> Result<(), MonitorError> {
        self.storage.record(address, transaction)?;
        self.notifier.notify(direction, transaction);
        Ok(())
    }

    /// A failed lookup counts as "not subscribed"; the match is missed, never invented.
    fn is_subscribed(&self, address: &str) -> bool {
        match self.storage.is_subscribed(address) {
            Ok(subscribed) => subscribed,
            Err(e) => {
                LogContext::new("block_monitor", "is_subscribed")
                    .with_address(address)
                    .warn(&format!("Subscription lookup failed, treating as unsubscribed: {}", e));
                false
            }
        }
    }

    async fn fetch_head(&self) -> Result<u64, MonitorError> {
        let client = &self.rpc_client;
        Ok(self.retry.execute("eth_blockNumber", || client.head_height()).await?)
    }

    async fn fetch_block(&self, height: u64) -> Result<Block, MonitorError> {
        let client = &self.rpc_client;
        Ok(self.retry.execute("eth_getBlockByNumber", || client.block(height)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NoopNotifier;
    use crate::storage::{CursorStore, MemoryStorage};

    fn monitor_with(storage: Arc<MemoryStorage>, config: BlockMonitorConfig) -> BlockMonitor<MemoryStorage, NoopNotifier> {
        let rpc_client = RpcClient::new("http://127.0.0.1:9".to_string()).unwrap();
        BlockMonitor::new(rpc_client, storage, NoopNotifier, config).unwrap()
    }

    #[test]
    fn test_block_monitor_config_default() {
        let config = BlockMonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.start_block, 0);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_config_from_app_config() {
        let mut app = AppConfig::default();
        app.processing.poll_interval_seconds = 12;
        app.processing.start_block = 500;
        app.rpc.max_retries = 4;

        let config = BlockMonitorConfig::from(&app);
        assert_eq!(config.poll_interval, Duration::from_secs(12));
        assert_eq!(config.start_block, 500);
        assert_eq!(config.retry.max_retries, 4);
    }

    #[test]
    fn test_cursor_starts_at_zero() {
        let monitor = monitor_with(Arc::new(MemoryStorage::new()), BlockMonitorConfig::default());
        assert_eq!(monitor.cursor().get(), 0);
    }

    #[test]
    fn test_cursor_uses_start_block_without_persisted_state() {
        let config = BlockMonitorConfig {
            start_block: 1_000,
            ..BlockMonitorConfig::default()
        };
        let monitor = monitor_with(Arc::new(MemoryStorage::new()), config);
        assert_eq!(monitor.cursor().get(), 1_000);
    }

    #[test]
    fn test_persisted_cursor_wins_over_start_block() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save_cursor(42).unwrap();

        let config = BlockMonitorConfig {
            start_block: 1_000,
            ..BlockMonitorConfig::default()
        };
        let monitor = monitor_with(storage, config);
        assert_eq!(monitor.cursor().get(), 42);
    }

    #[test]
    fn test_cursor_handle_is_shared() {
        let cursor = CursorHandle::new(7);
        let reader = cursor.clone();
        cursor.advance(8);
        assert_eq!(reader.get(), 8);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_ok() {
        let monitor = monitor_with(Arc::new(MemoryStorage::new()), BlockMonitorConfig::default());
        monitor.shutdown();
        assert!(monitor.run().await.is_ok());
        assert_eq!(monitor.cursor().get(), 0);
    }
}
