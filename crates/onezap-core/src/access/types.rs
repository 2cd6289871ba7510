//! ============================================================================
//! Access Types - Gating outcomes and subscription pricing
//! ============================================================================

use crate::chain::ChainError;
use ethers::types::U256;
use ethers::utils::format_units;
use serde::{Deserialize, Serialize};

/// Subscription price in whole tokens
pub const SUBSCRIPTION_PRICE_UNITS: u64 = 100;

/// Decimals of the Mantle Sepolia payment token
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// `100 * 10^decimals` base units. `decimals` comes from the token
/// contract, so values that overflow a U256 are a decode error.
pub fn subscription_price(decimals: u8) -> Result<U256, ChainError> {
    U256::from(10)
        .checked_pow(U256::from(decimals))
        .and_then(|scale| scale.checked_mul(U256::from(SUBSCRIPTION_PRICE_UNITS)))
        .ok_or_else(|| ChainError::Decode(format!("token decimals {} out of range", decimals)))
}

/// Human-readable token amount (e.g. `100.000000`)
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals as u32).unwrap_or_else(|_| amount.to_string())
}

/// Why a request was (or was not) given the premium body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAccess {
    /// Content is not premium
    Free,
    /// Requester owns the content
    Owner,
    /// Requester holds an active subscription to the creator
    Subscriber,
    /// Premium content without proof of access
    Denied,
}

impl ContentAccess {
    pub fn grants_body(&self) -> bool {
        match self {
            Self::Free | Self::Owner | Self::Subscriber => true,
            Self::Denied => false,
        }
    }
}

/// Everything the gate needs to decide on one content read
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessRequest<'a> {
    pub is_premium: bool,
    /// Local user id owning the content
    pub owner_user_id: &'a str,
    /// Wallet linked to the owner's profile, the join key to the chain
    pub creator_wallet: Option<&'a str>,
    pub requester_user_id: Option<&'a str>,
    pub requester_wallet: Option<&'a str>,
}

/// Raised when gating cannot be evaluated because stored data is broken
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Creator wallet '{wallet}' is misconfigured: {reason}")]
    InvalidCreatorWallet { wallet: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_price() {
        assert_eq!(subscription_price(6), Ok(U256::from(100_000_000u64)));
        assert_eq!(subscription_price(0), Ok(U256::from(100u64)));
    }

    #[test]
    fn test_subscription_price_rejects_oversized_decimals() {
        // U256::MAX is about 1.16e77
        assert!(subscription_price(75).is_ok());
        assert!(matches!(subscription_price(77), Err(ChainError::Decode(_))));
        assert!(matches!(subscription_price(200), Err(ChainError::Decode(_))));
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount(U256::from(100_000_000u64), 6), "100.000000");
        assert_eq!(format_token_amount(U256::from(1_500_000u64), 6), "1.500000");
    }

    #[test]
    fn test_grants_body() {
        assert!(ContentAccess::Free.grants_body());
        assert!(ContentAccess::Owner.grants_body());
        assert!(ContentAccess::Subscriber.grants_body());
        assert!(!ContentAccess::Denied.grants_body());
    }
}
