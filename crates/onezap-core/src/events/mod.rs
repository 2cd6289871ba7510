//! ============================================================================
//! Events Module - Live feeds of subscription contract events
//! ============================================================================
//! Feeds for dashboards and the CLI, decoupled from the content access path:
//! - `watch`: callback per decoded event, cancelled through `WatchHandle`
//! - `LiveFeed`: bounded newest-first buffer on top of a watcher
//! ============================================================================

mod feed;
mod types;
mod watcher;

pub use feed::{FeedBuffer, PLATFORM_FEED_CAPACITY, USER_FEED_CAPACITY};
pub use types::{
    ContractEvent, PenaltyDistributedEvent, SubscribedEvent, WithdrawalProcessedEvent,
    WithdrawalRequestedEvent,
};
pub use watcher::{
    creator_subscriptions, penalty_distributions, platform_subscriptions, user_subscriptions,
    watch, withdrawal_requests, withdrawals_processed, EventFilter, LiveFeed, WatchHandle,
};
