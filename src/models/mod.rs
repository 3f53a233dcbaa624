pub mod address;
pub mod transaction;

pub use address::normalize_address;
pub use transaction::{Block, Direction, Transaction};
