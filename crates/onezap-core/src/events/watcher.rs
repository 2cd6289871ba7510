//! ============================================================================
//! Event Watcher - Polling subscriptions to subscription contract events
//! ============================================================================
//! - One background task per watcher, polling logs for a single event kind
//! - Malformed logs are skipped; the rest of the batch is still delivered
//! - `WatchHandle` cancels the task; unwatch is idempotent and runs on drop
//! ============================================================================

use super::feed::{FeedBuffer, PLATFORM_FEED_CAPACITY, USER_FEED_CAPACITY};
use super::types::{
    ContractEvent, PenaltyDistributedEvent, SubscribedEvent, WithdrawalProcessedEvent,
    WithdrawalRequestedEvent,
};
use crate::chain::{format_wallet, ChainClient, ChainError};
use ethers::types::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Client-side filter applied after decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Creator(Address),
    Subscriber(Address),
}

impl EventFilter {
    /// Events without the filtered field never match a non-`All` filter
    pub fn matches<E: ContractEvent>(&self, event: &E) -> bool {
        match self {
            Self::All => true,
            Self::Creator(creator) => event.creator() == Some(*creator),
            Self::Subscriber(subscriber) => event.subscriber() == Some(*subscriber),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Creator(a) => format!("creator {}", format_wallet(a)),
            Self::Subscriber(a) => format!("subscriber {}", format_wallet(a)),
        }
    }
}

/// Cancellation handle for a running watcher
pub struct WatchHandle {
    stopped: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WatchHandle {
    /// Stop the watcher. Returns true only for the call that stopped it.
    pub fn unwatch(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
        debug!("Watcher stopped");
        true
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.unwatch();
    }
}

/// Start watching `E` events emitted after the current head block.
///
/// The head is read before anything is spawned, so a setup failure leaves
/// nothing running.
pub async fn watch<E, F>(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll_interval: Duration,
    on_event: F,
) -> Result<WatchHandle, ChainError>
where
    E: ContractEvent,
    F: FnMut(E) + Send + 'static,
{
    let head = chain.block_number().await?;
    let stopped = Arc::new(AtomicBool::new(false));

    info!(
        "Watching {} events ({}) from block {}",
        E::KIND.name(),
        filter.describe(),
        head + 1
    );

    let task = tokio::spawn(poll_events::<E, F>(
        chain,
        filter,
        poll_interval,
        head + 1,
        stopped.clone(),
        on_event,
    ));

    Ok(WatchHandle {
        stopped,
        task: Mutex::new(Some(task)),
    })
}

async fn poll_events<E, F>(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll_interval: Duration,
    mut cursor: u64,
    stopped: Arc<AtomicBool>,
    mut on_event: F,
) where
    E: ContractEvent,
    F: FnMut(E) + Send + 'static,
{
    while !stopped.load(Ordering::SeqCst) {
        tokio::time::sleep(poll_interval).await;

        let page = match chain.logs(E::KIND, cursor).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to poll {} logs: {}", E::KIND.name(), e);
                continue;
            }
        };

        for log in &page.logs {
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            match E::decode(log) {
                Ok(event) if filter.matches(&event) => on_event(event),
                Ok(_) => {}
                Err(e) => warn!("Skipping malformed {} log: {}", E::KIND.name(), e),
            }
        }

        cursor = page.next_block;
    }
}

/// A watcher feeding a bounded, newest-first buffer
pub struct LiveFeed<E: ContractEvent> {
    handle: WatchHandle,
    events: tokio::sync::watch::Receiver<Vec<E>>,
    capacity: usize,
}

impl<E: ContractEvent> LiveFeed<E> {
    pub async fn start(
        chain: Arc<dyn ChainClient>,
        filter: EventFilter,
        capacity: usize,
        poll_interval: Duration,
    ) -> Result<Self, ChainError> {
        let (tx, rx) = tokio::sync::watch::channel(Vec::new());
        let mut buffer = FeedBuffer::new(capacity);

        let handle = watch(chain, filter, poll_interval, move |event: E| {
            buffer.push(event);
            tx.send_replace(buffer.snapshot());
        })
        .await?;

        Ok(Self {
            handle,
            events: rx,
            capacity,
        })
    }

    /// Newest first, at most `capacity` entries
    pub fn snapshot(&self) -> Vec<E> {
        self.events.borrow().clone()
    }

    /// Receiver that is notified on every new event
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Vec<E>> {
        self.events.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.handle.is_active()
    }

    pub fn stop(&self) -> bool {
        self.handle.unwatch()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---- presets ----

/// New subscribers of one creator
pub async fn creator_subscriptions(
    chain: Arc<dyn ChainClient>,
    creator: Address,
    poll_interval: Duration,
) -> Result<LiveFeed<SubscribedEvent>, ChainError> {
    LiveFeed::start(
        chain,
        EventFilter::Creator(creator),
        USER_FEED_CAPACITY,
        poll_interval,
    )
    .await
}

/// Subscriptions made by one wallet
pub async fn user_subscriptions(
    chain: Arc<dyn ChainClient>,
    subscriber: Address,
    poll_interval: Duration,
) -> Result<LiveFeed<SubscribedEvent>, ChainError> {
    LiveFeed::start(
        chain,
        EventFilter::Subscriber(subscriber),
        USER_FEED_CAPACITY,
        poll_interval,
    )
    .await
}

/// Every new subscription on the platform
pub async fn platform_subscriptions(
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
) -> Result<LiveFeed<SubscribedEvent>, ChainError> {
    LiveFeed::start(chain, EventFilter::All, PLATFORM_FEED_CAPACITY, poll_interval).await
}

pub async fn withdrawal_requests(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll_interval: Duration,
) -> Result<LiveFeed<WithdrawalRequestedEvent>, ChainError> {
    LiveFeed::start(chain, filter, USER_FEED_CAPACITY, poll_interval).await
}

pub async fn withdrawals_processed(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll_interval: Duration,
) -> Result<LiveFeed<WithdrawalProcessedEvent>, ChainError> {
    LiveFeed::start(chain, filter, USER_FEED_CAPACITY, poll_interval).await
}

pub async fn penalty_distributions(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll_interval: Duration,
) -> Result<LiveFeed<PenaltyDistributedEvent>, ChainError> {
    LiveFeed::start(chain, filter, USER_FEED_CAPACITY, poll_interval).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::{
        penalty_distributed_log, subscribed_log, truncated_subscribed_log,
        withdrawal_processed_log, withdrawal_requested_log,
    };
    use crate::chain::{EventKind, FakeChain, WithdrawalType};
    use ethers::types::U256;
    use std::sync::atomic::AtomicUsize;

    const TICK: Duration = Duration::from_millis(5);

    fn wallet(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    fn emit_subscribed(chain: &FakeChain, id: u64, subscriber: u64, creator: u64) {
        chain.emit(
            EventKind::Subscribed,
            subscribed_log(id, wallet(subscriber), wallet(creator), U256::from(100u64)),
        );
    }

    #[tokio::test]
    async fn test_only_events_after_setup_are_delivered() {
        let chain = Arc::new(FakeChain::new());
        emit_subscribed(&chain, 1, 10, 20);

        let feed: LiveFeed<SubscribedEvent> =
            LiveFeed::start(chain.clone(), EventFilter::All, 10, TICK).await.unwrap();
        emit_subscribed(&chain, 2, 10, 20);
        settle().await;

        let ids: Vec<u64> = feed
            .snapshot()
            .iter()
            .map(|e| e.subscription_id.as_u64())
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_filter_by_creator() {
        let chain = Arc::new(FakeChain::new());
        let feed = creator_subscriptions(chain.clone(), wallet(20), TICK)
            .await
            .unwrap();

        emit_subscribed(&chain, 1, 10, 20);
        emit_subscribed(&chain, 2, 11, 21);
        emit_subscribed(&chain, 3, 12, 20);
        settle().await;

        let ids: Vec<u64> = feed
            .snapshot()
            .iter()
            .map(|e| e.subscription_id.as_u64())
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_malformed_log_is_skipped() {
        let chain = Arc::new(FakeChain::new());
        let feed = platform_subscriptions(chain.clone(), TICK).await.unwrap();

        emit_subscribed(&chain, 1, 10, 20);
        chain.emit(EventKind::Subscribed, truncated_subscribed_log());
        emit_subscribed(&chain, 2, 10, 20);
        settle().await;

        assert_eq!(feed.snapshot().len(), 2);
        assert!(feed.is_listening());
    }

    #[tokio::test]
    async fn test_feed_is_bounded_newest_first() {
        let chain = Arc::new(FakeChain::new());
        let feed = user_subscriptions(chain.clone(), wallet(10), TICK)
            .await
            .unwrap();

        for id in 1..=15 {
            emit_subscribed(&chain, id, 10, 20);
        }
        settle().await;

        let ids: Vec<u64> = feed
            .snapshot()
            .iter()
            .map(|e| e.subscription_id.as_u64())
            .collect();
        assert_eq!(ids, (6..=15).rev().collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_unwatch_is_idempotent() {
        let chain = Arc::new(FakeChain::new());
        let handle = watch(chain.clone(), EventFilter::All, TICK, |_: SubscribedEvent| {})
            .await
            .unwrap();

        assert!(handle.unwatch());
        assert!(!handle.unwatch());
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_no_callbacks_after_unwatch() {
        let chain = Arc::new(FakeChain::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let handle = watch(chain.clone(), EventFilter::All, TICK, move |_: WithdrawalProcessedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        chain.emit(
            EventKind::WithdrawalProcessed,
            withdrawal_processed_log(1, wallet(10), U256::from(100u64)),
        );
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        handle.unwatch();
        chain.emit(
            EventKind::WithdrawalProcessed,
            withdrawal_processed_log(2, wallet(10), U256::from(100u64)),
        );
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_watcher() {
        let chain = Arc::new(FakeChain::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let handle = watch(chain.clone(), EventFilter::All, TICK, move |_: SubscribedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        drop(handle);

        emit_subscribed(&chain, 1, 10, 20);
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_withdrawal_and_penalty_feeds() {
        let chain = Arc::new(FakeChain::new());
        let requests = withdrawal_requests(chain.clone(), EventFilter::Subscriber(wallet(10)), TICK)
            .await
            .unwrap();
        let processed = withdrawals_processed(chain.clone(), EventFilter::All, TICK)
            .await
            .unwrap();
        let penalties = penalty_distributions(chain.clone(), EventFilter::Creator(wallet(20)), TICK)
            .await
            .unwrap();

        chain.emit(
            EventKind::WithdrawalRequested,
            withdrawal_requested_log(1, wallet(10), WithdrawalType::Immediate, U256::from(5u64)),
        );
        chain.emit(
            EventKind::WithdrawalRequested,
            withdrawal_requested_log(2, wallet(11), WithdrawalType::CompleteEpoch, U256::zero()),
        );
        chain.emit(
            EventKind::WithdrawalProcessed,
            withdrawal_processed_log(1, wallet(10), U256::from(95u64)),
        );
        chain.emit(
            EventKind::PenaltyDistributed,
            penalty_distributed_log(wallet(20), U256::from(5u64), WithdrawalType::Immediate),
        );
        chain.emit(
            EventKind::PenaltyDistributed,
            penalty_distributed_log(wallet(21), U256::from(5u64), WithdrawalType::Immediate),
        );
        settle().await;

        let requested = requests.snapshot();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].withdrawal_type, WithdrawalType::Immediate);
        assert_eq!(processed.snapshot().len(), 1);
        assert_eq!(penalties.snapshot().len(), 1);
        assert_eq!(requests.capacity(), USER_FEED_CAPACITY);
    }

    #[tokio::test]
    async fn test_failed_polls_keep_cursor() {
        let chain = Arc::new(FakeChain::new());
        chain.fail_logs(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _handle = watch(chain.clone(), EventFilter::All, TICK, move |e: SubscribedEvent| {
            sink.lock().unwrap().push(e.subscription_id.as_u64());
        })
        .await
        .unwrap();

        emit_subscribed(&chain, 1, 10, 20);
        settle().await;
        assert!(chain.calls().logs >= 3);
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        emit_subscribed(&chain, 2, 10, 20);
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_setup_failure_returns_error() {
        let chain = Arc::new(FakeChain::new());
        chain.fail_block_number(true);

        let result = platform_subscriptions(chain.clone(), TICK).await;
        assert!(result.is_err());
        assert_eq!(chain.calls().logs, 0);
    }
}
