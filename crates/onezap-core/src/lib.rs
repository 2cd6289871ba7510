//! ============================================================================
//! ONEZAP-CORE: Subscription-gated publishing
//! ============================================================================
//! Backend logic shared by the OneZap server and CLI:
//! - Chain client seam over the registry, subscription and token contracts
//! - Access resolution and premium content gating (fail closed)
//! - Subscription action submission with confirmation tracking
//! - Contract event watchers and bounded live feeds
//! - Embedded content store, wallet sessions and sign-in
//! ============================================================================

pub mod access;
pub mod auth;
pub mod chain;
pub mod config;
pub mod db;
pub mod events;
pub mod submit;

pub use access::{AccessResolver, ContentGate};
pub use chain::{ChainClient, ChainError, EthersChainClient};
pub use config::OneZapConfig;
pub use db::ContentDb;
pub use ethers::types::{Address, H256, U256};
