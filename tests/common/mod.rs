//! Mock JSON-RPC node helpers shared by the integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eth_address_indexer::retry::RetryConfig;
use eth_address_indexer::{BlockMonitor, BlockMonitorConfig, Notifier, RpcClient, Storage};

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

pub fn head_request() -> impl wiremock::Match {
    body_partial_json(json!({"method": "eth_blockNumber"}))
}

pub fn block_request(height: u64) -> impl wiremock::Match {
    body_partial_json(json!({
        "method": "eth_getBlockByNumber",
        "params": [format!("0x{:x}", height), true]
    }))
}

pub async fn mount_head(server: &MockServer, height: u64) {
    Mock::given(method("POST"))
        .and(head_request())
        .respond_with(rpc_result(json!(format!("0x{:x}", height))))
        .mount(server)
        .await;
}

pub async fn mount_block(server: &MockServer, height: u64, transactions: Value) {
    Mock::given(method("POST"))
        .and(block_request(height))
        .respond_with(rpc_result(json!({
            "number": format!("0x{:x}", height),
            "hash": format!("0xblock{:x}", height),
            "transactions": transactions
        })))
        .mount(server)
        .await;
}

pub fn tx(hash: &str, from: &str, to: &str, value: &str) -> Value {
    json!({
        "hash": hash,
        "from": from,
        "to": to,
        "value": value,
        "gas": "0x5208",
        "nonce": "0x1"
    })
}

pub fn fast_config(start_block: u64) -> BlockMonitorConfig {
    BlockMonitorConfig {
        poll_interval: Duration::from_millis(20),
        start_block,
        retry: RetryConfig {
            max_retries: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

pub fn monitor<S: Storage, N: Notifier>(
    server: &MockServer,
    storage: Arc<S>,
    notifier: N,
    config: BlockMonitorConfig,
) -> BlockMonitor<S, N> {
    let rpc_client = RpcClient::with_timeout(server.uri(), 5).expect("Failed to build RPC client");
    BlockMonitor::new(rpc_client, storage, notifier, config).expect("Failed to build monitor")
}
