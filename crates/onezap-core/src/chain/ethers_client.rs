//! ============================================================================
//! Ethers Chain Client - JSON-RPC implementation of ChainClient
//! ============================================================================
//! - Reads go through the plain HTTP provider
//! - Writes need ONEZAP_SIGNER_KEY and go through a SignerMiddleware
//! - Reverts are decoded into Error(string) reasons or known custom error
//!   names so callers can translate them
//! ============================================================================

use super::abi::{
    event_signature, registry::CreatorRegistry, subscription::SubscriptionContract,
    token::PaymentToken,
};
use super::client::{ChainClient, ChainError};
use super::types::{
    ContractWrite, CreatorRecord, EventKind, LogPage, ReceiptStatus, SubscriptionRecord,
    SubscriptionStatus, TxHash,
};
use crate::config::{ChainConfig, ContractAddresses};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::abi::{self, Detokenize, ParamType, Token};
use ethers::contract::{ContractCall, ContractError};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Filter, U256};
use ethers::utils::{hex, id};
use std::sync::Arc;
use tracing::{debug, info};

type HttpProvider = Provider<Http>;
type SignedClient = SignerMiddleware<HttpProvider, LocalWallet>;

/// Selector of the standard `Error(string)` revert payload
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Custom errors the OneZap contracts revert with
const KNOWN_CUSTOM_ERRORS: &[&str] = &[
    "CreatorNotRegistered",
    "CreatorAlreadyRegistered",
    "CannotSubscribeToSelf",
    "AlreadySubscribed",
    "InsufficientAllowance",
    "InsufficientBalance",
    "WithdrawalAlreadyRequested",
    "NotSubscriptionOwner",
    "SubscriptionNotActive",
    "InvalidWithdrawalType",
];

pub struct EthersChainClient {
    provider: Arc<HttpProvider>,
    signer: Option<Arc<SignedClient>>,
    addresses: ContractAddresses,
}

impl EthersChainClient {
    /// Build a client from config. No network round-trip happens here.
    pub fn connect(config: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| anyhow!("Failed to create RPC provider for {}: {}", config.rpc_url, e))?;

        let addresses = config
            .contract_addresses()
            .map_err(|e| anyhow!("Invalid contract address in config: {}", e))?;

        let signer = match &config.signer_key {
            Some(key) => {
                let wallet = key
                    .trim()
                    .trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .map_err(|e| anyhow!("Failed to parse signer key: {}", e))?
                    .with_chain_id(config.chain_id);
                info!("Chain writes enabled for {:#x}", wallet.address());
                Some(Arc::new(SignerMiddleware::new(provider.clone(), wallet)))
            }
            None => {
                debug!("No signer key configured, chain client is read-only");
                None
            }
        };

        info!(
            "Chain client ready (chain {}, subscription contract {:#x})",
            config.chain_id, addresses.subscription
        );

        Ok(Self {
            provider: Arc::new(provider),
            signer,
            addresses,
        })
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    fn subscription(&self) -> SubscriptionContract<HttpProvider> {
        SubscriptionContract::new(self.addresses.subscription, self.provider.clone())
    }

    fn registry(&self) -> CreatorRegistry<HttpProvider> {
        CreatorRegistry::new(self.addresses.registry, self.provider.clone())
    }

    fn token(&self) -> PaymentToken<HttpProvider> {
        PaymentToken::new(self.addresses.token, self.provider.clone())
    }

    fn signer(&self) -> Result<Arc<SignedClient>, ChainError> {
        self.signer.clone().ok_or(ChainError::NoSigner)
    }

    async fn dispatch<D: Detokenize>(
        call: ContractCall<SignedClient, D>,
    ) -> Result<TxHash, ChainError> {
        let pending = call.send().await.map_err(contract_error)?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn subscription_contract(&self) -> Address {
        self.addresses.subscription
    }

    fn sender(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn is_creator(&self, wallet: Address) -> Result<bool, ChainError> {
        self.registry()
            .is_creator(wallet)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn get_creator(&self, wallet: Address) -> Result<CreatorRecord, ChainError> {
        let (username, wallet, total_earnings, exists) = self
            .registry()
            .get_creator(wallet)
            .call()
            .await
            .map_err(contract_error)?;

        Ok(CreatorRecord {
            username,
            wallet,
            total_earnings,
            exists,
        })
    }

    async fn get_creator_count(&self) -> Result<U256, ChainError> {
        self.registry()
            .get_creator_count()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn has_access_to_creator(
        &self,
        caller: Address,
        creator: Address,
    ) -> Result<bool, ChainError> {
        self.subscription()
            .has_access_to_creator(creator)
            .from(caller)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn get_active_subscriptions(&self, subscriber: Address) -> Result<Vec<U256>, ChainError> {
        self.subscription()
            .get_active_subscriptions(subscriber)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn get_subscription(
        &self,
        subscription_id: U256,
    ) -> Result<SubscriptionRecord, ChainError> {
        // Fields 4-7 are timing/penalty bookkeeping OneZap does not read
        let (record_id, subscriber, creator, amount, _, _, _, _, status) = self
            .subscription()
            .get_subscription(subscription_id)
            .call()
            .await
            .map_err(contract_error)?;

        let status =
            SubscriptionStatus::from_u8(status).map_err(|e| ChainError::Decode(e.to_string()))?;

        Ok(SubscriptionRecord {
            subscription_id: record_id,
            subscriber,
            creator,
            amount,
            status,
        })
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ChainError> {
        self.token()
            .allowance(owner, spender)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn token_decimals(&self) -> Result<u8, ChainError> {
        self.token().decimals().call().await.map_err(contract_error)
    }

    async fn send_transaction(&self, write: ContractWrite) -> Result<TxHash, ChainError> {
        let signer = self.signer()?;
        debug!("Submitting {} from {:#x}", write.label(), signer.address());

        match write {
            ContractWrite::RegisterCreator { username, wallet } => {
                let registry = CreatorRegistry::new(self.addresses.registry, signer);
                Self::dispatch(registry.register_creator(username, wallet)).await
            }
            ContractWrite::UpdateCreator { username, wallet } => {
                let registry = CreatorRegistry::new(self.addresses.registry, signer);
                Self::dispatch(registry.update_creator(username, wallet)).await
            }
            ContractWrite::Subscribe { creator } => {
                let contract = SubscriptionContract::new(self.addresses.subscription, signer);
                Self::dispatch(contract.subscribe(creator)).await
            }
            ContractWrite::RequestWithdrawal {
                subscription_id,
                withdrawal_type,
            } => {
                let contract = SubscriptionContract::new(self.addresses.subscription, signer);
                Self::dispatch(contract.request_withdrawal(subscription_id, withdrawal_type.as_u8()))
                    .await
            }
            ContractWrite::Approve { spender, amount } => {
                let token = PaymentToken::new(self.addresses.token, signer);
                Self::dispatch(token.approve(spender, amount)).await
            }
        }
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptStatus>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(receipt.map(|r| ReceiptStatus {
            // Pre-Byzantium receipts have no status field
            success: r.status.map(|s| s.as_u64() == 1).unwrap_or(true),
            block_number: r.block_number.map(|b| b.as_u64()),
        }))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn logs(&self, kind: EventKind, from_block: u64) -> Result<LogPage, ChainError> {
        let head = self.block_number().await?;
        if from_block > head {
            return Ok(LogPage {
                logs: Vec::new(),
                next_block: from_block,
            });
        }

        let filter = Filter::new()
            .address(self.addresses.subscription)
            .topic0(event_signature(kind))
            .from_block(from_block)
            .to_block(head);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        debug!(
            "Fetched {} {} logs in blocks {}..={}",
            logs.len(),
            kind.name(),
            from_block,
            head
        );

        Ok(LogPage {
            logs,
            next_block: head + 1,
        })
    }
}

fn contract_error<M: Middleware>(err: ContractError<M>) -> ChainError {
    if let Some(data) = err.as_revert() {
        return ChainError::Revert(decode_revert_reason(data.as_ref()));
    }
    match err {
        ContractError::DetokenizationError(e) => ChainError::Decode(e.to_string()),
        ContractError::AbiError(e) => ChainError::Decode(e.to_string()),
        other => ChainError::Rpc(other.to_string()),
    }
}

/// Turn raw revert data into a readable reason
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.len() < 4 {
        return if data.is_empty() {
            "execution reverted".to_string()
        } else {
            format!("0x{}", hex::encode(data))
        };
    }

    let (selector, payload) = data.split_at(4);

    if selector == ERROR_STRING_SELECTOR {
        if let Ok(tokens) = abi::decode(&[ParamType::String], payload) {
            if let Some(Token::String(reason)) = tokens.into_iter().next() {
                return reason;
            }
        }
    }

    for name in KNOWN_CUSTOM_ERRORS {
        if selector == id(format!("{}()", name)) {
            return (*name).to_string();
        }
    }

    format!("0x{}", hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_string() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String(
            "ERC20: insufficient allowance".to_string(),
        )]));
        assert_eq!(decode_revert_reason(&data), "ERC20: insufficient allowance");
    }

    #[test]
    fn test_decode_custom_error() {
        let data = id("WithdrawalAlreadyRequested()").to_vec();
        assert_eq!(decode_revert_reason(&data), "WithdrawalAlreadyRequested");

        let data = id("NotSubscriptionOwner()").to_vec();
        assert_eq!(decode_revert_reason(&data), "NotSubscriptionOwner");
    }

    #[test]
    fn test_decode_unknown_selector_falls_back_to_hex() {
        let data = [0xde, 0xad, 0xbe, 0xef, 0x01];
        assert_eq!(decode_revert_reason(&data), "0xdeadbeef01");
        assert_eq!(decode_revert_reason(&[]), "execution reverted");
    }

    #[test]
    fn test_connect_without_signer_is_read_only() {
        let config = ChainConfig {
            signer_key: None,
            ..ChainConfig::default()
        };
        let client = EthersChainClient::connect(&config).unwrap();
        assert!(client.sender().is_none());
    }

    #[test]
    fn test_connect_with_signer_exposes_sender() {
        let config = ChainConfig {
            // Well-known throwaway key (hardhat account #0)
            signer_key: Some(
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            ..ChainConfig::default()
        };
        let client = EthersChainClient::connect(&config).unwrap();
        let sender = client.sender().unwrap();
        assert_eq!(
            format!("{:#x}", sender),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
