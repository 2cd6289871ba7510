//! Platform-wide live feeds kept by the server for dashboards.
//!
//! A feed that cannot start at boot is retried lazily on its next snapshot.

use onezap_core::chain::ChainClient;
use onezap_core::events::{
    ContractEvent, EventFilter, LiveFeed, PenaltyDistributedEvent, SubscribedEvent,
    WithdrawalProcessedEvent, WithdrawalRequestedEvent, PLATFORM_FEED_CAPACITY,
    USER_FEED_CAPACITY,
};
use onezap_core::submit::{retry_read, RetryConfig};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Names accepted by `GET /api/events/{feed}`
pub const FEED_NAMES: [&str; 4] = ["subscriptions", "withdrawals", "processed", "penalties"];

/// Serialized view of one feed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub feed: String,
    pub listening: bool,
    pub capacity: usize,
    pub events: Value,
}

struct FeedSource {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
}

impl FeedSource {
    async fn launch<E: ContractEvent>(
        &self,
        name: &str,
        capacity: usize,
        retry: &RetryConfig,
    ) -> Option<LiveFeed<E>> {
        let result = retry_read(retry, || {
            LiveFeed::<E>::start(self.chain.clone(), EventFilter::All, capacity, self.poll_interval)
        })
        .await;

        match result {
            Ok(feed) => {
                info!("Watching {} feed", name);
                Some(feed)
            }
            Err(e) => {
                warn!("Could not start {} feed: {}", name, e);
                None
            }
        }
    }
}

struct Slot<E: ContractEvent> {
    name: &'static str,
    capacity: usize,
    feed: Mutex<Option<LiveFeed<E>>>,
}

impl<E: ContractEvent + Serialize> Slot<E> {
    fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            feed: Mutex::new(None),
        }
    }

    async fn start(&self, source: &FeedSource, retry: &RetryConfig) {
        let mut feed = self.feed.lock().await;
        if feed.is_none() {
            *feed = source.launch(self.name, self.capacity, retry).await;
        }
    }

    async fn snapshot(&self, source: Option<&FeedSource>) -> Option<FeedSnapshot> {
        let mut feed = self.feed.lock().await;
        if feed.is_none() {
            if let Some(source) = source {
                let once = RetryConfig {
                    max_read_retries: 0,
                    ..RetryConfig::default()
                };
                *feed = source.launch(self.name, self.capacity, &once).await;
            }
        }

        feed.as_ref().map(|f| FeedSnapshot {
            feed: self.name.to_string(),
            listening: f.is_listening(),
            capacity: f.capacity(),
            events: serde_json::to_value(f.snapshot()).unwrap_or(Value::Null),
        })
    }

    async fn stop(&self) -> bool {
        self.feed.lock().await.as_ref().map_or(false, |f| f.stop())
    }
}

pub struct PlatformFeeds {
    /// `None` when feeds are disabled
    source: Option<FeedSource>,
    shut_down: AtomicBool,
    subscriptions: Slot<SubscribedEvent>,
    withdrawals: Slot<WithdrawalRequestedEvent>,
    processed: Slot<WithdrawalProcessedEvent>,
    penalties: Slot<PenaltyDistributedEvent>,
}

impl PlatformFeeds {
    fn with_source(source: Option<FeedSource>) -> Self {
        Self {
            source,
            shut_down: AtomicBool::new(false),
            subscriptions: Slot::new("subscriptions", PLATFORM_FEED_CAPACITY),
            withdrawals: Slot::new("withdrawals", USER_FEED_CAPACITY),
            processed: Slot::new("processed", USER_FEED_CAPACITY),
            penalties: Slot::new("penalties", USER_FEED_CAPACITY),
        }
    }

    /// Start every feed, retrying transient failures. A feed that still
    /// fails is logged and started on a later snapshot.
    pub async fn start(chain: Arc<dyn ChainClient>, poll_interval: Duration, retry: &RetryConfig) -> Self {
        let feeds = Self::with_source(Some(FeedSource {
            chain,
            poll_interval,
        }));
        if let Some(source) = &feeds.source {
            feeds.subscriptions.start(source, retry).await;
            feeds.withdrawals.start(source, retry).await;
            feeds.processed.start(source, retry).await;
            feeds.penalties.start(source, retry).await;
        }
        feeds
    }

    pub fn disabled() -> Self {
        Self::with_source(None)
    }

    /// `None` for an unknown name, `Some(None)` for a feed that is not running
    pub async fn snapshot(&self, name: &str) -> Option<Option<FeedSnapshot>> {
        let source = if self.shut_down.load(Ordering::SeqCst) {
            None
        } else {
            self.source.as_ref()
        };

        let snapshot = match name {
            "subscriptions" => self.subscriptions.snapshot(source).await,
            "withdrawals" => self.withdrawals.snapshot(source).await,
            "processed" => self.processed.snapshot(source).await,
            "penalties" => self.penalties.snapshot(source).await,
            _ => return None,
        };
        Some(snapshot)
    }

    /// Unwatch everything; returns how many feeds were still live
    pub async fn stop_all(&self) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);
        [
            self.subscriptions.stop().await,
            self.withdrawals.stop().await,
            self.processed.stop().await,
            self.penalties.stop().await,
        ]
        .into_iter()
        .filter(|stopped| *stopped)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onezap_core::chain::fake::subscribed_log;
    use onezap_core::chain::{EventKind, FakeChain};
    use onezap_core::{Address, U256};

    #[tokio::test]
    async fn test_feeds_collect_and_stop() {
        let chain = Arc::new(FakeChain::new());
        let feeds =
            PlatformFeeds::start(chain.clone(), Duration::from_millis(5), &RetryConfig::default()).await;

        chain.emit(
            EventKind::Subscribed,
            subscribed_log(
                1,
                Address::from_low_u64_be(1),
                Address::from_low_u64_be(2),
                U256::from(100u64),
            ),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = feeds.snapshot("subscriptions").await.unwrap().unwrap();
        assert!(snapshot.listening);
        assert_eq!(snapshot.capacity, PLATFORM_FEED_CAPACITY);
        assert_eq!(snapshot.events.as_array().map(Vec::len), Some(1));
        assert!(feeds.snapshot("nope").await.is_none());

        assert_eq!(feeds.stop_all().await, FEED_NAMES.len());
        assert_eq!(feeds.stop_all().await, 0);
    }

    #[tokio::test]
    async fn test_feed_that_failed_at_boot_starts_on_snapshot() {
        let chain = Arc::new(FakeChain::new());
        chain.fail_block_number(true);
        let no_retry = RetryConfig {
            max_read_retries: 0,
            ..RetryConfig::default()
        };
        let feeds = PlatformFeeds::start(chain.clone(), Duration::from_millis(5), &no_retry).await;

        assert!(matches!(feeds.snapshot("withdrawals").await, Some(None)));

        chain.fail_block_number(false);
        let snapshot = feeds.snapshot("withdrawals").await.unwrap().unwrap();
        assert!(snapshot.listening);
        assert_eq!(snapshot.capacity, USER_FEED_CAPACITY);

        assert_eq!(feeds.stop_all().await, 1);
    }

    #[tokio::test]
    async fn test_no_restart_after_shutdown() {
        let chain = Arc::new(FakeChain::new());
        chain.fail_block_number(true);
        let no_retry = RetryConfig {
            max_read_retries: 0,
            ..RetryConfig::default()
        };
        let feeds = PlatformFeeds::start(chain.clone(), Duration::from_millis(5), &no_retry).await;
        feeds.stop_all().await;

        chain.fail_block_number(false);
        assert!(matches!(feeds.snapshot("penalties").await, Some(None)));
    }

    #[tokio::test]
    async fn test_disabled_feeds_report_not_running() {
        let feeds = PlatformFeeds::disabled();
        for name in FEED_NAMES {
            assert!(matches!(feeds.snapshot(name).await, Some(None)));
        }
    }
}
