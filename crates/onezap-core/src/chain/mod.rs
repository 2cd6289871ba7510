//! ============================================================================
//! Chain Module - Access to the OneZap contracts on an EVM network
//! ============================================================================
//! - `ChainClient`: async trait every on-chain read and write goes through
//! - `EthersChainClient`: JSON-RPC implementation (ethers)
//! - `FakeChain`: in-memory double (tests / `test-util` feature)
//! ============================================================================

pub mod abi;
mod address;
mod client;
mod ethers_client;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod types;

pub use address::{format_wallet, parse_wallet, same_wallet, AddressError};
pub use client::{ChainClient, ChainError};
pub use ethers_client::{decode_revert_reason, EthersChainClient};
#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeChain;
pub use types::{
    ContractWrite, CreatorRecord, EventKind, LogPage, ReceiptStatus, SubscriptionRecord,
    SubscriptionStatus, TxHash, UnknownDiscriminant, WithdrawalType,
};
