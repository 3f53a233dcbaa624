use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Block, Transaction};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    // absent and `null` both land here as Value::Null
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC client for the two calls the indexer needs: head height and
/// full block by number. One POST per call, no batching.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
}

impl RpcClient {
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    pub fn new(endpoint: String) -> Result<Self, RpcError> {
        Self::with_timeout(endpoint, Self::DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn with_timeout(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds))
            .info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let monitor = PerformanceMonitor::new(method);
        let result = self.send(method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let rpc_response: JsonRpcResponse = serde_json::from_slice(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    fn classify(&self, error: reqwest::Error) -> RpcError {
        if error.is_timeout() {
            RpcError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else {
            RpcError::Http(error)
        }
    }

    /// Current chain head via `eth_blockNumber`
    pub async fn head_height(&self) -> Result<u64, RpcError> {
        let result = self.make_request("eth_blockNumber", vec![]).await?;
        let height = parse_head_height(&result)?;

        LogContext::new("rpc_client", "head_height")
            .with_block_number(height)
            .trace("Retrieved head height");

        Ok(height)
    }

    /// Block with full transaction objects via `eth_getBlockByNumber`
    pub async fn block(&self, height: u64) -> Result<Block, RpcError> {
        let params = vec![
            Value::String(format!("0x{:x}", height)),
            Value::Bool(true),
        ];

        let result = self.make_request("eth_getBlockByNumber", params).await?;
        let block = parse_block(height, &result)?;

        let context = LogContext::new("rpc_client", "block")
            .with_block_number(height)
            .with_metadata("transaction_count", json!(block.transactions.len()))
            .with_metadata("skipped", json!(block.skipped));
        if block.skipped > 0 {
            context.warn(&format!(
                "Skipped {} malformed transactions in block {}",
                block.skipped, height
            ));
        } else {
            context.trace("Retrieved block");
        }

        Ok(block)
    }
}

/// Parse a `0x`-prefixed hex quantity; anything else is a protocol error
pub fn parse_hex_quantity(hex_str: &str) -> Result<u64, RpcError> {
    let invalid = |reason: &str| RpcError::InvalidResponse(format!("Invalid hex quantity '{}': {}", hex_str, reason));

    let digits = hex_str
        .strip_prefix("0x")
        .ok_or_else(|| invalid("missing 0x prefix"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("expected hex digits"));
    }

    u64::from_str_radix(digits, 16).map_err(|e| invalid(&e.to_string()))
}

fn parse_head_height(result: &Value) -> Result<u64, RpcError> {
    let hex_string = result
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse("Block number is missing or not a string".to_string()))?;
    parse_hex_quantity(hex_string)
}

fn parse_block(height: u64, result: &Value) -> Result<Block, RpcError> {
    if result.is_null() {
        return Err(RpcError::BlockNotFound { block_number: height });
    }

    let entries = result
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            RpcError::InvalidResponse(format!("Block {} transactions missing or not an array", height))
        })?;

    let mut transactions = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for (index, entry) in entries.iter().enumerate() {
        match parse_transaction(entry) {
            Some(transaction) => transactions.push(transaction),
            None => {
                skipped += 1;
                LogContext::new("rpc_client", "parse_transaction")
                    .with_block_number(height)
                    .with_metadata("index", json!(index))
                    .debug("Skipping transaction without hash/from/to/value strings");
            }
        }
    }

    Ok(Block {
        number: height,
        transactions,
        skipped,
    })
}

/// Extract the four string fields; anything else on the object is ignored.
/// Contract creations (`to: null`) do not qualify.
fn parse_transaction(entry: &Value) -> Option<Transaction> {
    let field = |name: &str| entry.get(name).and_then(Value::as_str).map(str::to_string);

    Some(Transaction {
        hash: field("hash")?,
        from: field("from")?,
        to: field("to")?,
        value: field("value")?,
    })
}
