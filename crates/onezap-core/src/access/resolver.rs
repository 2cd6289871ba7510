//! ============================================================================
//! Access Resolver - Subscription lookups against the subscription contract
//! ============================================================================
//! Scans the subscriber's active subscription ids in chain order and grants
//! access on the first record for the creator whose status is ACTIVE.
//! Any chain failure resolves to "no access".
//! ============================================================================

use crate::chain::{format_wallet, ChainClient, ChainError, SubscriptionRecord};
use crate::submit::{retry_read, RetryConfig};
use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AccessResolver {
    chain: Arc<dyn ChainClient>,
    retry: RetryConfig,
}

impl AccessResolver {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self::with_retry(chain, RetryConfig::default())
    }

    pub fn with_retry(chain: Arc<dyn ChainClient>, retry: RetryConfig) -> Self {
        Self { chain, retry }
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Fail-closed access check. An absent subscriber never reaches the chain.
    pub async fn has_access(&self, subscriber: Option<Address>, creator: Address) -> bool {
        let Some(subscriber) = subscriber else {
            debug!("No subscriber wallet, denying access to {}", format_wallet(&creator));
            return false;
        };

        match self.find_active_subscription(subscriber, creator).await {
            Ok(Some(record)) => {
                debug!(
                    "{} has access to {} via subscription {}",
                    format_wallet(&subscriber),
                    format_wallet(&creator),
                    record.subscription_id
                );
                true
            }
            Ok(None) => {
                debug!(
                    "{} has no active subscription to {}",
                    format_wallet(&subscriber),
                    format_wallet(&creator)
                );
                false
            }
            Err(e) => {
                warn!(
                    "Access check for {} -> {} failed: {} - denying",
                    format_wallet(&subscriber),
                    format_wallet(&creator),
                    e
                );
                false
            }
        }
    }

    /// The subscription that currently grants `subscriber` access to
    /// `creator`, if any. Errors are returned, not swallowed.
    pub async fn find_active_subscription(
        &self,
        subscriber: Address,
        creator: Address,
    ) -> Result<Option<SubscriptionRecord>, ChainError> {
        let ids = retry_read(&self.retry, || self.chain.get_active_subscriptions(subscriber)).await?;
        if ids.is_empty() {
            return Ok(None);
        }

        for id in ids {
            let record = retry_read(&self.retry, || self.chain.get_subscription(id)).await?;

            // Address equality is byte equality, so casing never matters here
            if record.creator != creator {
                continue;
            }
            if record.status.grants_access() {
                return Ok(Some(record));
            }
            debug!(
                "Subscription {} to {} is {}, not counted",
                id,
                format_wallet(&creator),
                record.status.label()
            );
        }

        Ok(None)
    }

    /// The contract's own `hasAccessToCreator`, evaluated for `caller`.
    /// Fail-closed like [`AccessResolver::has_access`].
    pub async fn contract_has_access(&self, caller: Address, creator: Address) -> bool {
        match retry_read(&self.retry, || self.chain.has_access_to_creator(caller, creator)).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("hasAccessToCreator failed: {} - denying", e);
                false
            }
        }
    }
}
