use serde::{Deserialize, Serialize};
use std::fmt;

/// A matched transaction as stored in the ledger.
///
/// `value` stays the chain's own string (usually `0x`-hex wei); values can
/// exceed any native integer width.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
}

/// Which side of a transaction the subscribed address was on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    /// Matched on `from`
    Outgoing,
    /// Matched on `to`
    Incoming,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "Outgoing",
            Direction::Incoming => "Incoming",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched block, reduced to its height and well-formed transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<Transaction>,
    /// Entries dropped because they lacked one of the four string fields
    pub skipped: usize,
}
