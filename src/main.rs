use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use eth_address_indexer::api::{ApiServer, AppState};
use eth_address_indexer::config::{AppConfig, StorageBackend};
use eth_address_indexer::logging::init_logging;
use eth_address_indexer::{
    BlockMonitor, BlockMonitorConfig, IndexerError, MemoryStorage, NotifierBackend, RpcClient,
    SqliteStorage, Storage,
};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Watches an Ethereum node for transactions touching subscribed addresses")]
#[command(version)]
struct Args {
    /// Path to a TOML config file (defaults to $CONFIG_FILE or ./config.toml)
    #[arg(long)]
    config: Option<String>,

    /// API server port, overrides the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_logging(&config.logging);
    info!(
        "Starting address indexer against {} with {:?} storage",
        config.rpc.endpoint, config.storage.backend
    );

    let result = match config.storage.backend {
        StorageBackend::Memory => run(config, Arc::new(MemoryStorage::new())).await,
        StorageBackend::Sqlite => {
            let storage = SqliteStorage::new(&config.storage.path)?;
            run(config, Arc::new(storage)).await
        }
    };

    if let Err(e) = &result {
        error!(
            "Indexer exited with {:?} error (recoverable on restart: {}): {}",
            e.severity(),
            e.is_recoverable(),
            e
        );
    }
    Ok(result?)
}

async fn run<S: Storage + 'static>(config: AppConfig, storage: Arc<S>) -> Result<(), IndexerError> {
    let rpc_client = RpcClient::with_timeout(config.rpc.endpoint.clone(), config.rpc.timeout_seconds)?;
    let notifier = NotifierBackend::from(config.notifier.kind);
    let monitor = BlockMonitor::new(
        rpc_client,
        Arc::clone(&storage),
        notifier,
        BlockMonitorConfig::from(&config),
    )?;

    let shutdown = monitor.shutdown_handle();
    let cursor = monitor.cursor();

    let mut monitor_task = tokio::spawn(async move { monitor.run().await });

    let api_task = if config.api.enabled {
        let server = ApiServer::new(AppState::new(storage, cursor), &config.api.host, config.api.port);
        let server_shutdown = shutdown.clone();
        Some(tokio::spawn(async move { server.start(server_shutdown).await }))
    } else {
        None
    };

    let outcome = tokio::select! {
        joined = &mut monitor_task => joined,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal, finishing current cycle"),
                Err(e) => error!("Failed to listen for shutdown signal, stopping: {}", e),
            }
            shutdown.shutdown();
            monitor_task.await
        }
    };

    // the API goes down with the ingestion loop either way
    shutdown.shutdown();
    if let Some(task) = api_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("API server failed: {}", e),
            Err(e) => error!("API server task panicked: {}", e),
        }
    }

    match outcome {
        Ok(Ok(())) => {
            info!("Indexer stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(IndexerError::Server(format!("Ingestion task panicked: {}", e))),
    }
}
