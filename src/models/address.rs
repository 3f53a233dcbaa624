/// Canonical form used for every registry and ledger key.
///
/// Hex addresses are case-insensitive, and RPC responses and client input
/// routinely disagree on casing (EIP-55 checksums vs lowercase).
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
