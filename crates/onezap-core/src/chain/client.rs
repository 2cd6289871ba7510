//! The seam between OneZap and the EVM contracts.
//!
//! Everything above this trait (access resolution, submission, event feeds)
//! is written against [`ChainClient`] so it can run against a live RPC node or
//! an in-memory double.

use super::types::{
    ContractWrite, CreatorRecord, EventKind, LogPage, ReceiptStatus, SubscriptionRecord, TxHash,
};
use async_trait::async_trait;
use ethers::types::{Address, U256};

/// Chain-level failures. Reverts carry the decoded reason when available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Execution reverted: {0}")]
    Revert(String),
    #[error("Malformed chain response: {0}")]
    Decode(String),
    #[error("No signer configured for contract writes")]
    NoSigner,
}

impl ChainError {
    /// Revert reason, if this error is a revert
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Revert(reason) => Some(reason),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the subscription contract (the token spender)
    fn subscription_contract(&self) -> Address;

    /// Address that signs writes, if a signer is configured
    fn sender(&self) -> Option<Address>;

    // ---- creator registry ----

    async fn is_creator(&self, wallet: Address) -> Result<bool, ChainError>;

    async fn get_creator(&self, wallet: Address) -> Result<CreatorRecord, ChainError>;

    async fn get_creator_count(&self) -> Result<U256, ChainError>;

    // ---- subscription contract ----

    /// Contract-side access check, evaluated as if called by `caller`
    async fn has_access_to_creator(
        &self,
        caller: Address,
        creator: Address,
    ) -> Result<bool, ChainError>;

    /// Ids the contract lists as active for `subscriber`. The list can
    /// include subscriptions whose withdrawal is already pending.
    async fn get_active_subscriptions(&self, subscriber: Address) -> Result<Vec<U256>, ChainError>;

    async fn get_subscription(&self, subscription_id: U256)
        -> Result<SubscriptionRecord, ChainError>;

    // ---- payment token ----

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError>;

    async fn token_decimals(&self) -> Result<u8, ChainError>;

    // ---- transactions & logs ----

    /// Sign and broadcast a write. Returns once the node has accepted it.
    async fn send_transaction(&self, write: ContractWrite) -> Result<TxHash, ChainError>;

    /// `None` while the transaction is not yet mined
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptStatus>, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Logs of `kind` emitted by the subscription contract from `from_block`
    /// up to the current head
    async fn logs(&self, kind: EventKind, from_block: u64) -> Result<LogPage, ChainError>;
}
