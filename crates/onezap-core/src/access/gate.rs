//! ============================================================================
//! Content Gate - Decides whether a content read gets the premium body
//! ============================================================================
//! Order of checks:
//! 1. Free content is always readable, no chain call
//! 2. Owners always read their own content by user id
//! 3. The creator wallet must be a well-formed 0x address
//! 4. Owners always read their own content by wallet
//! 5. Otherwise the AccessResolver decides
//! ============================================================================

use super::resolver::AccessResolver;
use super::types::{AccessRequest, ContentAccess, GateError};
use crate::chain::parse_wallet;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ContentGate {
    resolver: AccessResolver,
}

impl ContentGate {
    pub fn new(resolver: AccessResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    pub async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<ContentAccess, GateError> {
        if !request.is_premium {
            return Ok(ContentAccess::Free);
        }

        if request.requester_user_id == Some(request.owner_user_id) {
            debug!("Requester owns content (user {})", request.owner_user_id);
            return Ok(ContentAccess::Owner);
        }

        let Some(creator_wallet) = request.creator_wallet else {
            warn!(
                "Premium content owner {} has no linked wallet, denying",
                request.owner_user_id
            );
            return Ok(ContentAccess::Denied);
        };

        let creator = parse_wallet(creator_wallet).map_err(|e| GateError::InvalidCreatorWallet {
            wallet: creator_wallet.to_string(),
            reason: e.to_string(),
        })?;

        // A malformed requester wallet is treated like no wallet at all
        let requester = request
            .requester_wallet
            .and_then(|w| parse_wallet(w).ok());

        // Parsed addresses compare as bytes, so casing never matters
        if requester == Some(creator) {
            debug!("Requester wallet matches creator wallet");
            return Ok(ContentAccess::Owner);
        }

        if self.resolver.has_access(requester, creator).await {
            Ok(ContentAccess::Subscriber)
        } else {
            Ok(ContentAccess::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{FakeChain, SubscriptionStatus};
    use crate::submit::RetryConfig;
    use std::sync::Arc;

    const CREATOR: &str = "0xC0FFEE0000000000000000000000000000000001";
    const READER: &str = "0x00000000000000000000000000000000000a11ce";

    fn gate(chain: &Arc<FakeChain>) -> ContentGate {
        let retry = RetryConfig {
            max_read_retries: 0,
            jitter: false,
            ..RetryConfig::default()
        };
        ContentGate::new(AccessResolver::with_retry(chain.clone(), retry))
    }

    fn premium<'a>() -> AccessRequest<'a> {
        AccessRequest {
            is_premium: true,
            owner_user_id: "owner-1",
            creator_wallet: Some(CREATOR),
            requester_user_id: None,
            requester_wallet: None,
        }
    }

    #[tokio::test]
    async fn test_free_content_skips_chain() {
        let chain = Arc::new(FakeChain::new());
        let request = AccessRequest {
            is_premium: false,
            creator_wallet: Some("garbage"),
            ..premium()
        };

        assert_eq!(gate(&chain).evaluate(&request).await, Ok(ContentAccess::Free));
        assert_eq!(chain.calls().contract_reads(), 0);
    }

    #[tokio::test]
    async fn test_owner_by_wallet_any_case() {
        let chain = Arc::new(FakeChain::new());
        let lower = CREATOR.to_lowercase();
        let request = AccessRequest {
            requester_wallet: Some(&lower),
            ..premium()
        };

        assert_eq!(gate(&chain).evaluate(&request).await, Ok(ContentAccess::Owner));
        assert_eq!(chain.calls().contract_reads(), 0);
    }

    #[tokio::test]
    async fn test_owner_by_user_id() {
        let chain = Arc::new(FakeChain::new());
        let request = AccessRequest {
            requester_user_id: Some("owner-1"),
            creator_wallet: None,
            ..premium()
        };

        assert_eq!(gate(&chain).evaluate(&request).await, Ok(ContentAccess::Owner));
    }

    #[tokio::test]
    async fn test_subscriber_gets_access() {
        let chain = Arc::new(FakeChain::new());
        chain.add_subscription(
            9,
            parse_wallet(READER).unwrap(),
            parse_wallet(CREATOR).unwrap(),
            SubscriptionStatus::Active,
        );
        let request = AccessRequest {
            requester_wallet: Some(READER),
            ..premium()
        };

        assert_eq!(
            gate(&chain).evaluate(&request).await,
            Ok(ContentAccess::Subscriber)
        );
    }

    #[tokio::test]
    async fn test_anonymous_reader_denied_without_chain_call() {
        let chain = Arc::new(FakeChain::new());
        assert_eq!(gate(&chain).evaluate(&premium()).await, Ok(ContentAccess::Denied));
        assert_eq!(chain.calls().contract_reads(), 0);
    }

    #[tokio::test]
    async fn test_malformed_creator_wallet_is_config_error() {
        let chain = Arc::new(FakeChain::new());
        let request = AccessRequest {
            creator_wallet: Some("c0ffee"),
            requester_wallet: Some(READER),
            ..premium()
        };

        let result = gate(&chain).evaluate(&request).await;
        assert!(matches!(result, Err(GateError::InvalidCreatorWallet { .. })));
        assert_eq!(chain.calls().contract_reads(), 0);
    }

    #[tokio::test]
    async fn test_malformed_creator_wallet_is_error_even_for_same_string() {
        let chain = Arc::new(FakeChain::new());
        let request = AccessRequest {
            creator_wallet: Some("c0ffee"),
            requester_wallet: Some("c0ffee"),
            ..premium()
        };

        let result = gate(&chain).evaluate(&request).await;
        assert!(matches!(result, Err(GateError::InvalidCreatorWallet { .. })));
    }

    #[tokio::test]
    async fn test_chain_outage_denies() {
        let chain = Arc::new(FakeChain::new());
        chain.add_subscription(
            9,
            parse_wallet(READER).unwrap(),
            parse_wallet(CREATOR).unwrap(),
            SubscriptionStatus::Active,
        );
        chain.fail_reads(usize::MAX, "connection refused");
        let request = AccessRequest {
            requester_wallet: Some(READER),
            ..premium()
        };

        assert_eq!(gate(&chain).evaluate(&request).await, Ok(ContentAccess::Denied));
    }

    #[tokio::test]
    async fn test_missing_creator_wallet_denies() {
        let chain = Arc::new(FakeChain::new());
        let request = AccessRequest {
            creator_wallet: None,
            requester_wallet: Some(READER),
            ..premium()
        };

        assert_eq!(gate(&chain).evaluate(&request).await, Ok(ContentAccess::Denied));
    }
}
