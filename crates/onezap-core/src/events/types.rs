//! Decoded subscription contract events.

use crate::chain::abi::subscription::{
    PenaltyDistributedFilter, SubscribedFilter, WithdrawalProcessedFilter,
    WithdrawalRequestedFilter,
};
use crate::chain::{ChainError, EventKind, WithdrawalType};
use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::types::{Address, Log, U256};
use serde::{Deserialize, Serialize};

/// An event type a watcher can follow
pub trait ContractEvent: Clone + Send + Sync + 'static {
    const KIND: EventKind;

    fn decode(log: &Log) -> Result<Self, ChainError>;

    fn creator(&self) -> Option<Address> {
        None
    }

    fn subscriber(&self) -> Option<Address> {
        None
    }
}

fn decode_log<E: EthEvent>(log: &Log) -> Result<E, ChainError> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    <E as EthEvent>::decode_log(&raw).map_err(|e| ChainError::Decode(e.to_string()))
}

fn withdrawal_type(value: u8) -> Result<WithdrawalType, ChainError> {
    WithdrawalType::from_u8(value).map_err(|e| ChainError::Decode(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedEvent {
    pub subscription_id: U256,
    pub subscriber: Address,
    pub creator: Address,
    pub amount: U256,
}

impl ContractEvent for SubscribedEvent {
    const KIND: EventKind = EventKind::Subscribed;

    fn decode(log: &Log) -> Result<Self, ChainError> {
        let event: SubscribedFilter = decode_log(log)?;
        Ok(Self {
            subscription_id: event.subscription_id,
            subscriber: event.subscriber,
            creator: event.creator,
            amount: event.amount,
        })
    }

    fn creator(&self) -> Option<Address> {
        Some(self.creator)
    }

    fn subscriber(&self) -> Option<Address> {
        Some(self.subscriber)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestedEvent {
    pub subscription_id: U256,
    pub subscriber: Address,
    pub withdrawal_type: WithdrawalType,
    pub penalty: U256,
}

impl ContractEvent for WithdrawalRequestedEvent {
    const KIND: EventKind = EventKind::WithdrawalRequested;

    fn decode(log: &Log) -> Result<Self, ChainError> {
        let event: WithdrawalRequestedFilter = decode_log(log)?;
        Ok(Self {
            subscription_id: event.subscription_id,
            subscriber: event.subscriber,
            withdrawal_type: withdrawal_type(event.withdrawal_type)?,
            penalty: event.penalty,
        })
    }

    fn subscriber(&self) -> Option<Address> {
        Some(self.subscriber)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProcessedEvent {
    pub subscription_id: U256,
    pub subscriber: Address,
    pub amount_returned: U256,
}

impl ContractEvent for WithdrawalProcessedEvent {
    const KIND: EventKind = EventKind::WithdrawalProcessed;

    fn decode(log: &Log) -> Result<Self, ChainError> {
        let event: WithdrawalProcessedFilter = decode_log(log)?;
        Ok(Self {
            subscription_id: event.subscription_id,
            subscriber: event.subscriber,
            amount_returned: event.amount_returned,
        })
    }

    fn subscriber(&self) -> Option<Address> {
        Some(self.subscriber)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyDistributedEvent {
    pub creator: Address,
    pub amount: U256,
    pub withdrawal_type: WithdrawalType,
}

impl ContractEvent for PenaltyDistributedEvent {
    const KIND: EventKind = EventKind::PenaltyDistributed;

    fn decode(log: &Log) -> Result<Self, ChainError> {
        let event: PenaltyDistributedFilter = decode_log(log)?;
        Ok(Self {
            creator: event.creator,
            amount: event.amount,
            withdrawal_type: withdrawal_type(event.withdrawal_type)?,
        })
    }

    fn creator(&self) -> Option<Address> {
        Some(self.creator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::{
        penalty_distributed_log, subscribed_log, truncated_subscribed_log,
        withdrawal_requested_log,
    };

    #[test]
    fn test_decode_subscribed() {
        let subscriber = Address::from_low_u64_be(1);
        let creator = Address::from_low_u64_be(2);
        let log = subscribed_log(7, subscriber, creator, U256::from(100_000_000u64));

        let event = SubscribedEvent::decode(&log).unwrap();
        assert_eq!(event.subscription_id, U256::from(7u64));
        assert_eq!(event.subscriber, subscriber);
        assert_eq!(event.creator(), Some(creator));
        assert_eq!(event.amount, U256::from(100_000_000u64));
    }

    #[test]
    fn test_decode_withdrawal_type() {
        let log = withdrawal_requested_log(
            3,
            Address::from_low_u64_be(1),
            WithdrawalType::Immediate,
            U256::from(5u64),
        );
        let event = WithdrawalRequestedEvent::decode(&log).unwrap();
        assert_eq!(event.withdrawal_type, WithdrawalType::Immediate);
        assert_eq!(event.penalty, U256::from(5u64));

        let log = penalty_distributed_log(
            Address::from_low_u64_be(2),
            U256::from(5u64),
            WithdrawalType::Immediate,
        );
        let event = PenaltyDistributedEvent::decode(&log).unwrap();
        assert_eq!(event.subscriber(), None);
        assert_eq!(event.creator(), Some(Address::from_low_u64_be(2)));
    }

    #[test]
    fn test_decode_rejects_truncated_log() {
        assert!(matches!(
            SubscribedEvent::decode(&truncated_subscribed_log()),
            Err(ChainError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_event() {
        let log = subscribed_log(
            1,
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            U256::one(),
        );
        assert!(WithdrawalProcessedEvent::decode(&log).is_err());
    }
}
