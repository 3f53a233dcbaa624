use log::{Level, LevelFilter};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::LoggingConfig;

/// Structured logging context; every entry is emitted as one JSON line
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: BTreeMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: Level, message: &str) -> String {
        let mut entry = Map::new();
        entry.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
        entry.insert("level".into(), json!(level.as_str()));
        entry.insert("component".into(), json!(self.component));
        entry.insert("operation".into(), json!(self.operation));
        entry.insert("message".into(), json!(message));
        entry.extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        Value::Object(entry).to_string()
    }

    fn emit(&self, level: Level, message: &str) {
        if log::log_enabled!(level) {
            log::log!(level, "{}", self.format_message(level, message));
        }
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::Trace, message);
    }
}

/// Times an operation and logs the outcome at debug level
pub struct PerformanceMonitor {
    start_time: Instant,
    operation: String,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.start_time.elapsed().as_millis() as u64;
        let context = LogContext::new("performance", &self.operation).with_duration_ms(duration);

        match result {
            Ok(_) => context.trace(&format!("Operation completed in {}ms", duration)),
            Err(e) => context
                .with_metadata("error", json!(e.to_string()))
                .debug(&format!("Operation failed after {}ms: {}", duration, e)),
        }

        duration
    }
}

pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_processed(block_number: u64, transaction_count: usize, match_count: usize) {
        let context = LogContext::new("metrics", "block_processed")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("match_count", json!(match_count));

        if match_count > 0 {
            context.info(&format!("Block {} processed with {} matches", block_number, match_count));
        } else {
            context.debug(&format!("Block {} processed, no matches", block_number));
        }
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }
}

fn parse_level(level: &str) -> LevelFilter {
    match level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize env_logger from the logging config. `RUST_LOG` still wins.
pub fn init_logging(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(parse_level(&config.level));
    builder.parse_default_env();

    let json_format = config.format == "json";
    builder.format(move |buf, record| {
        use std::io::Write;

        let message = record.args().to_string();
        let structured = serde_json::from_str::<Value>(&message).is_ok_and(|v| v.is_object());

        if json_format {
            if structured {
                writeln!(buf, "{}", message)
            } else {
                let entry = json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "message": message,
                });
                writeln!(buf, "{}", entry)
            }
        } else {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            )
        }
    });

    // A second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("test", "test")
            .with_block_number(12345)
            .with_transaction_hash("0xabc123")
            .with_address("0xdef");

        assert_eq!(context.metadata.get("block_number"), Some(&json!(12345)));
        assert_eq!(context.metadata.get("transaction_hash"), Some(&json!("0xabc123")));
        assert_eq!(context.metadata.get("address"), Some(&json!("0xdef")));
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("notifier", "notify").with_metadata("direction", json!("Outgoing"));

        let message = context.format_message(Level::Info, "match");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["component"], "notifier");
        assert_eq!(parsed["operation"], "notify");
        assert_eq!(parsed["message"], "match");
        assert_eq!(parsed["direction"], "Outgoing");
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("error"), LevelFilter::Error);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
