//! Wallet address parsing and comparison.
//!
//! Ethereum addresses are case-insensitive. Parsed [`Address`] values compare
//! by bytes; raw strings are compared with ASCII case folding.

use ethers::types::Address;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Wallet address '{0}' is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("Wallet address '{0}' is not 20 bytes of hex")]
    Malformed(String),
}

/// Parse a `0x`-prefixed wallet address
pub fn parse_wallet(input: &str) -> Result<Address, AddressError> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| AddressError::MissingPrefix(trimmed.to_string()))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::Malformed(trimmed.to_string()));
    }

    Address::from_str(hex).map_err(|_| AddressError::Malformed(trimmed.to_string()))
}

/// Case-insensitive wallet equality on raw strings
pub fn same_wallet(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Lower-case, full-length `0x` form used as a storage key and in logs
pub fn format_wallet(address: &Address) -> String {
    format!("{:#x}", address)
}
