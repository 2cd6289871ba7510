//! Contract bindings for the creator registry, subscription contract and the
//! payment token. Only the functions and events OneZap touches are declared.

use super::types::EventKind;
use ethers::contract::EthEvent;
use ethers::types::H256;

pub mod registry {
    use ethers::contract::abigen;

    abigen!(
        CreatorRegistry,
        r#"[
            function registerCreator(string username, address wallet) external
            function updateCreator(string username, address wallet) external
            function isCreator(address wallet) external view returns (bool)
            function getCreator(address wallet) external view returns (string, address, uint256, bool)
            function getCreatorCount() external view returns (uint256)
        ]"#
    );
}

pub mod subscription {
    use ethers::contract::abigen;

    abigen!(
        SubscriptionContract,
        r#"[
            function subscribe(address creator) external
            function requestWithdrawal(uint256 subscriptionId, uint8 withdrawalType) external
            function hasAccessToCreator(address creator) external view returns (bool)
            function getActiveSubscriptions(address subscriber) external view returns (uint256[])
            function getSubscription(uint256 subscriptionId) external view returns (uint256, address, address, uint256, uint256, uint256, uint256, uint256, uint8)
            event Subscribed(uint256 indexed subscriptionId, address indexed subscriber, address indexed creator, uint256 amount)
            event WithdrawalRequested(uint256 indexed subscriptionId, address indexed subscriber, uint8 withdrawalType, uint256 penalty)
            event WithdrawalProcessed(uint256 indexed subscriptionId, address indexed subscriber, uint256 amountReturned)
            event PenaltyDistributed(address indexed creator, uint256 amount, uint8 withdrawalType)
        ]"#
    );
}

pub mod token {
    use ethers::contract::abigen;

    abigen!(
        PaymentToken,
        r#"[
            function approve(address spender, uint256 amount) external returns (bool)
            function allowance(address owner, address spender) external view returns (uint256)
            function decimals() external view returns (uint8)
        ]"#
    );
}

/// topic0 for an event kind
pub fn event_signature(kind: EventKind) -> H256 {
    match kind {
        EventKind::Subscribed => subscription::SubscribedFilter::signature(),
        EventKind::WithdrawalRequested => subscription::WithdrawalRequestedFilter::signature(),
        EventKind::WithdrawalProcessed => subscription::WithdrawalProcessedFilter::signature(),
        EventKind::PenaltyDistributed => subscription::PenaltyDistributedFilter::signature(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;

    #[test]
    fn test_event_signatures_match_abi() {
        let expected = H256::from(keccak256(
            "Subscribed(uint256,address,address,uint256)".as_bytes(),
        ));
        assert_eq!(event_signature(EventKind::Subscribed), expected);

        let expected = H256::from(keccak256(
            "PenaltyDistributed(address,uint256,uint8)".as_bytes(),
        ));
        assert_eq!(event_signature(EventKind::PenaltyDistributed), expected);
    }

    #[test]
    fn test_event_signatures_are_distinct() {
        let all = [
            EventKind::Subscribed,
            EventKind::WithdrawalRequested,
            EventKind::WithdrawalProcessed,
            EventKind::PenaltyDistributed,
        ];
        let sigs: std::collections::HashSet<_> = all.iter().map(|k| event_signature(*k)).collect();
        assert_eq!(sigs.len(), all.len());
    }
}
