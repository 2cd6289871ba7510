//! Subscription action submitter.
//!
//! Every write is fire-and-confirm: [`SubscriptionSubmitter::submit`] returns
//! the hash as soon as the node accepts the transaction and
//! [`SubscriptionSubmitter::wait_for_confirmation`] is a separate wait.

use super::retry::{self, retry_read, Confirmation, RetryConfig};
use crate::access::subscription_price;
use crate::chain::{ChainClient, ChainError, ContractWrite, TxHash, WithdrawalType};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// User-facing transaction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("No wallet connected for signing")]
    NotConnected,
    #[error("Transaction was rejected in the wallet")]
    UserRejected,
    #[error("Creator is not registered")]
    CreatorNotRegistered,
    #[error("Insufficient token allowance for the subscription contract")]
    InsufficientAllowance,
    #[error("Cannot subscribe to yourself")]
    SelfSubscription,
    #[error("Already subscribed to this creator")]
    AlreadySubscribed,
    #[error("A withdrawal has already been requested for this subscription")]
    WithdrawalAlreadyRequested,
    #[error("You do not own this subscription")]
    NotSubscriptionOwner,
    #[error("Subscription is not active")]
    SubscriptionNotActive,
    #[error("Token approval failed")]
    ApprovalFailed,
    #[error("Transaction {0:#x} reverted")]
    Reverted(TxHash),
    #[error("Transaction {0:#x} was not confirmed in time")]
    ConfirmationTimeout(TxHash),
    #[error("Could not reach the chain: {0}")]
    Unavailable(String),
    #[error("Transaction failed: {0}")]
    Failed(String),
}

impl TxError {
    /// Map a chain error onto a user-facing failure
    pub fn from_chain(error: &ChainError) -> Self {
        match error {
            ChainError::NoSigner => Self::NotConnected,
            ChainError::Revert(reason) => translate_reason(reason),
            ChainError::Rpc(message) => {
                let translated = translate_reason(message);
                match translated {
                    Self::Failed(_) => Self::Unavailable(message.clone()),
                    known => known,
                }
            }
            ChainError::Decode(message) => Self::Failed(message.clone()),
        }
    }
}

impl From<ChainError> for TxError {
    fn from(error: ChainError) -> Self {
        Self::from_chain(&error)
    }
}

/// Pattern-match a revert reason or wallet error message
pub fn translate_reason(reason: &str) -> TxError {
    let lower = reason.to_lowercase();

    if lower.contains("user rejected") || lower.contains("user denied") {
        TxError::UserRejected
    } else if lower.contains("creatornotregistered") || lower.contains("creator not registered")
    {
        TxError::CreatorNotRegistered
    } else if lower.contains("insufficientallowance") || lower.contains("insufficient allowance")
    {
        TxError::InsufficientAllowance
    } else if lower.contains("cannotsubscribetoself") || lower.contains("subscribe to yourself") {
        TxError::SelfSubscription
    } else if lower.contains("alreadysubscribed") || lower.contains("already subscribed") {
        TxError::AlreadySubscribed
    } else if lower.contains("withdrawalalreadyrequested") {
        TxError::WithdrawalAlreadyRequested
    } else if lower.contains("notsubscriptionowner") {
        TxError::NotSubscriptionOwner
    } else if lower.contains("subscriptionnotactive") {
        TxError::SubscriptionNotActive
    } else {
        TxError::Failed(reason.to_string())
    }
}

/// Whether `subscribe` waits for the approval receipt before submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    #[default]
    WaitForConfirmation,
    /// Submit the approval and the subscribe back to back
    FireAndForget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub approval: ApprovalMode,
    /// Check the registry before spending gas on a doomed transaction
    pub check_registry: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            approval: ApprovalMode::WaitForConfirmation,
            check_registry: true,
        }
    }
}

/// Hashes produced by a subscribe flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeSubmission {
    /// Present when an allowance top-up was needed
    pub approval: Option<TxHash>,
    pub subscribe: TxHash,
}

#[derive(Clone)]
pub struct SubscriptionSubmitter {
    chain: Arc<dyn ChainClient>,
    config: RetryConfig,
}

impl SubscriptionSubmitter {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self::with_config(chain, RetryConfig::default())
    }

    pub fn with_config(chain: Arc<dyn ChainClient>, config: RetryConfig) -> Self {
        Self { chain, config }
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    fn sender(&self) -> Result<Address, TxError> {
        self.chain.sender().ok_or(TxError::NotConnected)
    }

    /// Broadcast a write and return its hash without waiting for a receipt
    pub async fn submit(&self, write: ContractWrite) -> Result<TxHash, TxError> {
        let label = write.label();
        match self.chain.send_transaction(write).await {
            Ok(hash) => {
                info!("Submitted {}: {:#x}", label, hash);
                Ok(hash)
            }
            Err(e) => {
                warn!("Failed to submit {}: {}", label, e);
                Err(TxError::from_chain(&e))
            }
        }
    }

    pub async fn wait_for_confirmation(&self, hash: TxHash) -> Confirmation {
        retry::wait_for_confirmation(self.chain.as_ref(), hash, &self.config).await
    }

    /// Submit and wait, turning reverts and timeouts into errors
    pub async fn submit_and_confirm(&self, write: ContractWrite) -> Result<TxHash, TxError> {
        let hash = self.submit(write).await?;
        confirmation_result(self.wait_for_confirmation(hash).await)
    }

    /// Make sure the subscription contract may pull `required` tokens from
    /// the sender. Returns the approval hash when one was submitted.
    pub async fn ensure_allowance(
        &self,
        required: U256,
        mode: ApprovalMode,
    ) -> Result<Option<TxHash>, TxError> {
        let owner = self.sender()?;
        let spender = self.chain.subscription_contract();

        let current = retry_read(&self.config, || self.chain.allowance(owner, spender)).await?;
        if current >= required {
            debug!("Allowance {} covers {}, no approval needed", current, required);
            return Ok(None);
        }

        info!("Allowance {} below {}, requesting approval", current, required);
        let hash = self
            .submit(ContractWrite::Approve {
                spender,
                amount: required,
            })
            .await?;

        match mode {
            ApprovalMode::FireAndForget => Ok(Some(hash)),
            ApprovalMode::WaitForConfirmation => match self.wait_for_confirmation(hash).await {
                Confirmation::Confirmed { .. } => Ok(Some(hash)),
                Confirmation::Reverted(_) => Err(TxError::ApprovalFailed),
                Confirmation::TimedOut(hash) => Err(TxError::ConfirmationTimeout(hash)),
            },
        }
    }

    /// Approve if needed, then submit `subscribe(creator)`
    pub async fn subscribe(
        &self,
        creator: Address,
        options: SubscribeOptions,
    ) -> Result<SubscribeSubmission, TxError> {
        let subscriber = self.sender()?;
        if subscriber == creator {
            return Err(TxError::SelfSubscription);
        }

        if options.check_registry {
            let registered =
                retry_read(&self.config, || self.chain.is_creator(creator)).await?;
            if !registered {
                return Err(TxError::CreatorNotRegistered);
            }
        }

        let decimals = retry_read(&self.config, || self.chain.token_decimals()).await?;
        let price = subscription_price(decimals)?;

        let approval = self.ensure_allowance(price, options.approval).await?;
        let subscribe = self.submit(ContractWrite::Subscribe { creator }).await?;

        Ok(SubscribeSubmission {
            approval,
            subscribe,
        })
    }

    pub async fn request_withdrawal(
        &self,
        subscription_id: U256,
        withdrawal_type: WithdrawalType,
    ) -> Result<TxHash, TxError> {
        if withdrawal_type.incurs_penalty() {
            debug!("Immediate withdrawal of {} will incur a penalty", subscription_id);
        }
        self.submit(ContractWrite::RequestWithdrawal {
            subscription_id,
            withdrawal_type,
        })
        .await
    }

    pub async fn register_creator(&self, username: &str, wallet: Address) -> Result<TxHash, TxError> {
        self.submit(ContractWrite::RegisterCreator {
            username: username.to_string(),
            wallet,
        })
        .await
    }

    pub async fn update_creator(&self, username: &str, wallet: Address) -> Result<TxHash, TxError> {
        self.submit(ContractWrite::UpdateCreator {
            username: username.to_string(),
            wallet,
        })
        .await
    }
}

/// Collapse a confirmation into success or a user-facing error
pub fn confirmation_result(confirmation: Confirmation) -> Result<TxHash, TxError> {
    match confirmation {
        Confirmation::Confirmed { hash, .. } => Ok(hash),
        Confirmation::Reverted(hash) => Err(TxError::Reverted(hash)),
        Confirmation::TimedOut(hash) => Err(TxError::ConfirmationTimeout(hash)),
    }
}
