//! In-memory ChainClient for tests.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `test-util` feature.

use super::abi::event_signature;
use super::client::{ChainClient, ChainError};
use super::types::{
    ContractWrite, CreatorRecord, EventKind, LogPage, ReceiptStatus, SubscriptionRecord,
    SubscriptionStatus, TxHash, WithdrawalType,
};
use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Address, Log, H256, U256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Per-method call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub is_creator: usize,
    pub get_creator: usize,
    pub get_creator_count: usize,
    pub has_access_to_creator: usize,
    pub get_active_subscriptions: usize,
    pub get_subscription: usize,
    pub allowance: usize,
    pub token_decimals: usize,
    pub send_transaction: usize,
    pub transaction_receipt: usize,
    pub block_number: usize,
    pub logs: usize,
}

impl CallCounts {
    /// Contract reads only (excludes receipts, head and logs)
    pub fn contract_reads(&self) -> usize {
        self.is_creator
            + self.get_creator
            + self.get_creator_count
            + self.has_access_to_creator
            + self.get_active_subscriptions
            + self.get_subscription
            + self.allowance
            + self.token_decimals
    }
}

#[derive(Default)]
struct FakeState {
    sender: Option<Address>,
    subscription_contract: Address,
    decimals: u8,
    creators: HashMap<Address, CreatorRecord>,
    subscriptions: HashMap<U256, SubscriptionRecord>,
    active: HashMap<Address, Vec<U256>>,
    allowances: HashMap<(Address, Address), U256>,
    /// Remaining reads that fail before reads succeed again
    failing_reads: usize,
    read_failure: String,
    fail_head: bool,
    /// Remaining `logs` polls that fail
    failing_logs: usize,
    revert_next: Option<String>,
    hold_receipts: bool,
    sent: Vec<ContractWrite>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    head: u64,
    logs: Vec<(EventKind, u64, Log)>,
    calls: CallCounts,
}

pub struct FakeChain {
    state: Mutex<FakeState>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                subscription_contract: Address::from_low_u64_be(0x5b5c),
                decimals: 6,
                head: 100,
                ..FakeState::default()
            }),
        }
    }

    pub fn with_sender(self, sender: Address) -> Self {
        self.lock().sender = Some(sender);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_creator(&self, wallet: Address, username: &str) {
        self.lock().creators.insert(
            wallet,
            CreatorRecord {
                username: username.to_string(),
                wallet,
                total_earnings: U256::zero(),
                exists: true,
            },
        );
    }

    /// Store a subscription and list its id under the subscriber's active ids
    pub fn add_subscription(
        &self,
        id: u64,
        subscriber: Address,
        creator: Address,
        status: SubscriptionStatus,
    ) {
        let id = U256::from(id);
        let mut state = self.lock();
        state.subscriptions.insert(
            id,
            SubscriptionRecord {
                subscription_id: id,
                subscriber,
                creator,
                amount: U256::from(100_000_000u64),
                status,
            },
        );
        state.active.entry(subscriber).or_default().push(id);
    }

    pub fn set_status(&self, id: u64, status: SubscriptionStatus) {
        if let Some(record) = self.lock().subscriptions.get_mut(&U256::from(id)) {
            record.status = status;
        }
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((owner, spender), amount);
    }

    pub fn set_decimals(&self, decimals: u8) {
        self.lock().decimals = decimals;
    }

    /// Make the next `count` contract reads fail with an RPC error
    pub fn fail_reads(&self, count: usize, reason: &str) {
        let mut state = self.lock();
        state.failing_reads = count;
        state.read_failure = reason.to_string();
    }

    pub fn fail_block_number(&self, fail: bool) {
        self.lock().fail_head = fail;
    }

    /// Make the next `count` log polls fail with an RPC error
    pub fn fail_logs(&self, count: usize) {
        self.lock().failing_logs = count;
    }

    pub fn revert_next(&self, reason: &str) {
        self.lock().revert_next = Some(reason.to_string());
    }

    /// Leave new transactions unmined until `mine` is called
    pub fn hold_receipts(&self, hold: bool) {
        self.lock().hold_receipts = hold;
    }

    pub fn mine(&self, hash: TxHash, success: bool) {
        let mut state = self.lock();
        state.head += 1;
        let block = state.head;
        state.receipts.insert(
            hash,
            ReceiptStatus {
                success,
                block_number: Some(block),
            },
        );
    }

    /// Append a log in a fresh block
    pub fn emit(&self, kind: EventKind, log: Log) {
        let mut state = self.lock();
        state.head += 1;
        let block = state.head;
        state.logs.push((kind, block, log));
    }

    pub fn sent(&self) -> Vec<ContractWrite> {
        self.lock().sent.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    fn read<T>(
        &self,
        count: impl FnOnce(&mut CallCounts),
        value: impl FnOnce(&FakeState) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let mut state = self.lock();
        count(&mut state.calls);
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(ChainError::Rpc(state.read_failure.clone()));
        }
        value(&*state)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn subscription_contract(&self) -> Address {
        self.lock().subscription_contract
    }

    fn sender(&self) -> Option<Address> {
        self.lock().sender
    }

    async fn is_creator(&self, wallet: Address) -> Result<bool, ChainError> {
        self.read(
            |c| c.is_creator += 1,
            |s| Ok(s.creators.contains_key(&wallet)),
        )
    }

    async fn get_creator(&self, wallet: Address) -> Result<CreatorRecord, ChainError> {
        self.read(
            |c| c.get_creator += 1,
            |s| {
                Ok(s.creators.get(&wallet).cloned().unwrap_or(CreatorRecord {
                    username: String::new(),
                    wallet: Address::zero(),
                    total_earnings: U256::zero(),
                    exists: false,
                }))
            },
        )
    }

    async fn get_creator_count(&self) -> Result<U256, ChainError> {
        self.read(
            |c| c.get_creator_count += 1,
            |s| Ok(U256::from(s.creators.len())),
        )
    }

    async fn has_access_to_creator(
        &self,
        caller: Address,
        creator: Address,
    ) -> Result<bool, ChainError> {
        self.read(
            |c| c.has_access_to_creator += 1,
            |s| {
                let ids = s.active.get(&caller).cloned().unwrap_or_default();
                Ok(ids.iter().filter_map(|id| s.subscriptions.get(id)).any(|r| {
                    r.creator == creator && r.status == SubscriptionStatus::Active
                }))
            },
        )
    }

    async fn get_active_subscriptions(&self, subscriber: Address) -> Result<Vec<U256>, ChainError> {
        self.read(
            |c| c.get_active_subscriptions += 1,
            |s| Ok(s.active.get(&subscriber).cloned().unwrap_or_default()),
        )
    }

    async fn get_subscription(
        &self,
        subscription_id: U256,
    ) -> Result<SubscriptionRecord, ChainError> {
        self.read(
            |c| c.get_subscription += 1,
            |s| {
                s.subscriptions.get(&subscription_id).cloned().ok_or_else(|| {
                    ChainError::Decode(format!("No subscription {}", subscription_id))
                })
            },
        )
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError> {
        self.read(
            |c| c.allowance += 1,
            |s| Ok(s.allowances.get(&(owner, spender)).copied().unwrap_or_default()),
        )
    }

    async fn token_decimals(&self) -> Result<u8, ChainError> {
        self.read(|c| c.token_decimals += 1, |s| Ok(s.decimals))
    }

    async fn send_transaction(&self, write: ContractWrite) -> Result<TxHash, ChainError> {
        let mut state = self.lock();
        state.calls.send_transaction += 1;

        let sender = state.sender.ok_or(ChainError::NoSigner)?;
        if let Some(reason) = state.revert_next.take() {
            return Err(ChainError::Revert(reason));
        }

        if let ContractWrite::Approve { spender, amount } = &write {
            state.allowances.insert((sender, *spender), *amount);
        }

        state.sent.push(write);
        let hash = H256::from_low_u64_be(state.sent.len() as u64);

        if !state.hold_receipts {
            state.head += 1;
            let block = state.head;
            state.receipts.insert(
                hash,
                ReceiptStatus {
                    success: true,
                    block_number: Some(block),
                },
            );
        }

        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptStatus>, ChainError> {
        let mut state = self.lock();
        state.calls.transaction_receipt += 1;
        Ok(state.receipts.get(&hash).copied())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let mut state = self.lock();
        state.calls.block_number += 1;
        if state.fail_head {
            return Err(ChainError::Rpc("connection refused".to_string()));
        }
        Ok(state.head)
    }

    async fn logs(&self, kind: EventKind, from_block: u64) -> Result<LogPage, ChainError> {
        let mut state = self.lock();
        state.calls.logs += 1;
        if state.failing_logs > 0 {
            state.failing_logs -= 1;
            return Err(ChainError::Rpc("eth_getLogs timed out".to_string()));
        }
        let logs = state
            .logs
            .iter()
            .filter(|(k, block, _)| *k == kind && *block >= from_block)
            .map(|(_, _, log)| log.clone())
            .collect();
        Ok(LogPage {
            logs,
            next_block: state.head.max(from_block.saturating_sub(1)) + 1,
        })
    }
}

// ---- log builders ----

fn topic_u256(value: u64) -> H256 {
    let mut bytes = [0u8; 32];
    U256::from(value).to_big_endian(&mut bytes);
    H256::from(bytes)
}

fn topic_address(address: Address) -> H256 {
    H256::from(address)
}

pub fn subscribed_log(id: u64, subscriber: Address, creator: Address, amount: U256) -> Log {
    Log {
        topics: vec![
            event_signature(EventKind::Subscribed),
            topic_u256(id),
            topic_address(subscriber),
            topic_address(creator),
        ],
        data: encode(&[Token::Uint(amount)]).into(),
        ..Default::default()
    }
}

pub fn withdrawal_requested_log(
    id: u64,
    subscriber: Address,
    withdrawal_type: WithdrawalType,
    penalty: U256,
) -> Log {
    Log {
        topics: vec![
            event_signature(EventKind::WithdrawalRequested),
            topic_u256(id),
            topic_address(subscriber),
        ],
        data: encode(&[
            Token::Uint(U256::from(withdrawal_type.as_u8())),
            Token::Uint(penalty),
        ])
        .into(),
        ..Default::default()
    }
}

pub fn withdrawal_processed_log(id: u64, subscriber: Address, amount_returned: U256) -> Log {
    Log {
        topics: vec![
            event_signature(EventKind::WithdrawalProcessed),
            topic_u256(id),
            topic_address(subscriber),
        ],
        data: encode(&[Token::Uint(amount_returned)]).into(),
        ..Default::default()
    }
}

pub fn penalty_distributed_log(
    creator: Address,
    amount: U256,
    withdrawal_type: WithdrawalType,
) -> Log {
    Log {
        topics: vec![
            event_signature(EventKind::PenaltyDistributed),
            topic_address(creator),
        ],
        data: encode(&[
            Token::Uint(amount),
            Token::Uint(U256::from(withdrawal_type.as_u8())),
        ])
        .into(),
        ..Default::default()
    }
}

/// A Subscribed log with its indexed topics missing
pub fn truncated_subscribed_log() -> Log {
    Log {
        topics: vec![event_signature(EventKind::Subscribed)],
        data: encode(&[Token::Uint(U256::one())]).into(),
        ..Default::default()
    }
}
