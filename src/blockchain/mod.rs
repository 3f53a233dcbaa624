pub mod block_monitor;
pub mod rpc_client;

pub use block_monitor::{BlockMonitor, BlockMonitorConfig, CursorHandle};
pub use rpc_client::{parse_hex_quantity, RpcClient};
