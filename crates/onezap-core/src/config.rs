//! ============================================================================
//! Configuration - environment-backed settings for server and CLI
//! ============================================================================
//! Every field has a default; `ONEZAP_*` environment variables override them.
//! Contract defaults point at the Mantle Sepolia deployment.
//! ============================================================================

use crate::chain::{parse_wallet, AddressError};
use crate::submit::RetryConfig;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_RPC_URL: &str = "https://rpc.sepolia.mantle.xyz";
pub const DEFAULT_CHAIN_ID: u64 = 5003;
pub const DEFAULT_SUBSCRIPTION_ADDRESS: &str = "0x9F48FE79885150794BccF4e82Ae872e6c771C4b1";
pub const DEFAULT_REGISTRY_ADDRESS: &str = "0x834c337c430066341F9B7cdf0a939AFd8DC54d33";
pub const DEFAULT_TOKEN_ADDRESS: &str = "0x7F36F9e0c204483DC0655b805a3a7AbbfA8b32D1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// 7 days
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// 15 minutes
pub const DEFAULT_NONCE_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_EVENT_POLL_MS: u64 = 2000;
pub const DEFAULT_READ_RETRIES: u32 = 3;

/// RPC endpoint, contract addresses and the optional write key
#[derive(Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub subscription_address: String,
    pub registry_address: String,
    pub token_address: String,
    /// Hex private key used for writes. Never serialized.
    #[serde(skip)]
    pub signer_key: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: env_string("ONEZAP_RPC_URL", DEFAULT_RPC_URL),
            chain_id: env_parse("ONEZAP_CHAIN_ID", DEFAULT_CHAIN_ID),
            subscription_address: env_string(
                "ONEZAP_SUBSCRIPTION_ADDRESS",
                DEFAULT_SUBSCRIPTION_ADDRESS,
            ),
            registry_address: env_string("ONEZAP_REGISTRY_ADDRESS", DEFAULT_REGISTRY_ADDRESS),
            token_address: env_string("ONEZAP_TOKEN_ADDRESS", DEFAULT_TOKEN_ADDRESS),
            signer_key: std::env::var("ONEZAP_SIGNER_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("subscription_address", &self.subscription_address)
            .field("registry_address", &self.registry_address)
            .field("token_address", &self.token_address)
            .field("signer_key", &self.signer_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Parsed contract addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub subscription: Address,
    pub registry: Address,
    pub token: Address,
}

impl ChainConfig {
    pub fn contract_addresses(&self) -> Result<ContractAddresses, AddressError> {
        Ok(ContractAddresses {
            subscription: parse_wallet(&self.subscription_address)?,
            registry: parse_wallet(&self.registry_address)?,
            token: parse_wallet(&self.token_address)?,
        })
    }
}

/// Top-level configuration shared by the server and the CLI
#[derive(Debug, Clone)]
pub struct OneZapConfig {
    pub chain: ChainConfig,
    /// Database path override, `~/.onezap/onezap.redb` when unset
    pub db_path: Option<String>,
    pub bind_addr: String,
    /// Accept `x-wallet-address` as an identity source for reads
    pub trust_wallet_header: bool,
    pub session_ttl_secs: i64,
    pub nonce_ttl_secs: i64,
    pub event_poll_ms: u64,
    pub retry: RetryConfig,
}

impl Default for OneZapConfig {
    fn default() -> Self {
        let mut retry = RetryConfig::default();
        retry.confirm_timeout_secs =
            env_parse("ONEZAP_CONFIRM_TIMEOUT_SECS", retry.confirm_timeout_secs);
        retry.max_read_retries = env_parse("ONEZAP_READ_RETRIES", DEFAULT_READ_RETRIES);

        Self {
            chain: ChainConfig::default(),
            db_path: std::env::var("ONEZAP_DB_PATH").ok().filter(|p| !p.is_empty()),
            bind_addr: env_string("ONEZAP_BIND_ADDR", DEFAULT_BIND_ADDR),
            trust_wallet_header: env_parse("ONEZAP_TRUST_WALLET_HEADER", false),
            session_ttl_secs: env_parse("ONEZAP_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            nonce_ttl_secs: env_parse("ONEZAP_NONCE_TTL_SECS", DEFAULT_NONCE_TTL_SECS),
            event_poll_ms: env_parse("ONEZAP_EVENT_POLL_MS", DEFAULT_EVENT_POLL_MS),
            retry,
        }
    }
}

impl OneZapConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contracts_parse() {
        let chain = ChainConfig {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            subscription_address: DEFAULT_SUBSCRIPTION_ADDRESS.to_string(),
            registry_address: DEFAULT_REGISTRY_ADDRESS.to_string(),
            token_address: DEFAULT_TOKEN_ADDRESS.to_string(),
            signer_key: None,
        };
        let addresses = chain.contract_addresses().unwrap();
        assert_ne!(addresses.subscription, addresses.registry);
        assert_ne!(addresses.registry, addresses.token);
    }

    #[test]
    fn test_debug_redacts_signer_key() {
        let chain = ChainConfig {
            signer_key: Some("deadbeef".to_string()),
            ..ChainConfig::default()
        };
        let printed = format!("{:?}", chain);
        assert!(!printed.contains("deadbeef"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_invalid_contract_address_is_reported() {
        let chain = ChainConfig {
            token_address: "not-an-address".to_string(),
            ..ChainConfig::default()
        };
        assert!(chain.contract_addresses().is_err());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("ONEZAP_TEST_GARBAGE_U64", "twelve");
        assert_eq!(env_parse("ONEZAP_TEST_GARBAGE_U64", 7u64), 7);
        std::env::set_var("ONEZAP_TEST_GOOD_U64", " 42 ");
        assert_eq!(env_parse("ONEZAP_TEST_GOOD_U64", 7u64), 42);
    }
}
