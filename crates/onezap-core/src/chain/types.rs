//! ============================================================================
//! Chain Types - Subscription and creator records read from the contracts
//! ============================================================================
//! Status and withdrawal type are closed enumerations on the contract side;
//! they are decoded into enums here so status gating is an exhaustive match.
//! ============================================================================

use ethers::types::{Address, Log, H256, U256};
use serde::{Deserialize, Serialize};

/// Transaction hash returned by a write submission
pub type TxHash = H256;

/// Subscription lifecycle status (matches the contract's enum discriminants)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active = 0,
    WithdrawalRequested = 1,
    WithdrawalProcessed = 2,
}

impl SubscriptionStatus {
    pub fn from_u8(value: u8) -> Result<Self, UnknownDiscriminant> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::WithdrawalRequested),
            2 => Ok(Self::WithdrawalProcessed),
            _ => Err(UnknownDiscriminant {
                kind: "subscription status",
                value,
            }),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Only an active subscription unlocks premium content. A record that is
    /// still indexed as "active" by the contract but has a withdrawal pending
    /// or processed does not.
    pub fn grants_access(&self) -> bool {
        match self {
            Self::Active => true,
            Self::WithdrawalRequested | Self::WithdrawalProcessed => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::WithdrawalRequested => "withdrawal_requested",
            Self::WithdrawalProcessed => "withdrawal_processed",
        }
    }
}

impl TryFrom<u8> for SubscriptionStatus {
    type Error = UnknownDiscriminant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

/// How a subscriber exits a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalType {
    /// Wait for the lock period to end, full amount returned
    CompleteEpoch = 0,
    /// Exit now, a penalty is paid to the creator
    Immediate = 1,
}

impl WithdrawalType {
    pub fn from_u8(value: u8) -> Result<Self, UnknownDiscriminant> {
        match value {
            0 => Ok(Self::CompleteEpoch),
            1 => Ok(Self::Immediate),
            _ => Err(UnknownDiscriminant {
                kind: "withdrawal type",
                value,
            }),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn incurs_penalty(&self) -> bool {
        matches!(self, Self::Immediate)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CompleteEpoch => "complete_epoch",
            Self::Immediate => "immediate",
        }
    }
}

impl TryFrom<u8> for WithdrawalType {
    type Error = UnknownDiscriminant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownDiscriminant {
    pub kind: &'static str,
    pub value: u8,
}

/// Subscription record as returned by `getSubscription`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub subscription_id: U256,
    pub subscriber: Address,
    pub creator: Address,
    /// Payment amount in the token's smallest unit
    pub amount: U256,
    pub status: SubscriptionStatus,
}

/// Creator registration as returned by `getCreator`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRecord {
    pub username: String,
    pub wallet: Address,
    pub total_earnings: U256,
    pub exists: bool,
}

/// Contract events the watchers can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Subscribed,
    WithdrawalRequested,
    WithdrawalProcessed,
    PenaltyDistributed,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribed => "Subscribed",
            Self::WithdrawalRequested => "WithdrawalRequested",
            Self::WithdrawalProcessed => "WithdrawalProcessed",
            Self::PenaltyDistributed => "PenaltyDistributed",
        }
    }
}

/// One poll worth of raw logs for an event kind
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub logs: Vec<Log>,
    /// First block the next poll should start from
    pub next_block: u64,
}

/// Mined transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

/// State-changing contract calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractWrite {
    RegisterCreator { username: String, wallet: Address },
    UpdateCreator { username: String, wallet: Address },
    Subscribe { creator: Address },
    RequestWithdrawal {
        subscription_id: U256,
        withdrawal_type: WithdrawalType,
    },
    /// ERC-20 allowance for `spender`
    Approve { spender: Address, amount: U256 },
}

impl ContractWrite {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RegisterCreator { .. } => "registerCreator",
            Self::UpdateCreator { .. } => "updateCreator",
            Self::Subscribe { .. } => "subscribe",
            Self::RequestWithdrawal { .. } => "requestWithdrawal",
            Self::Approve { .. } => "approve",
        }
    }
}
