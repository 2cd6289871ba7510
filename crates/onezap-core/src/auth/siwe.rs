//! ============================================================================
//! Wallet Sign-In - Nonce issuance and signed-message verification
//! ============================================================================
//! 1. Client asks for a nonce for its wallet
//! 2. Client signs a message embedding that nonce (personal_sign)
//! 3. Server consumes the nonce, recovers the signer, opens a session
//! ============================================================================

use crate::chain::{format_wallet, parse_wallet};
use crate::db::{ContentDb, SessionRecord, UserRecord};
use ethers::types::Signature;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NONCE_LENGTH: usize = 32;

/// Random alphanumeric sign-in nonce
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Value of the first `Key: value` line in a sign-in message
fn message_field<'a>(message: &'a str, key: &str) -> Option<&'a str> {
    message
        .lines()
        .find_map(|line| line.trim().strip_prefix(key)?.strip_prefix(':'))
        .map(str::trim)
}

/// EIP-4361 style message for a wallet to sign
pub fn sign_in_message(domain: &str, wallet: &str, chain_id: u64, nonce: &str) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {wallet}\n\
         \n\
         Sign in to OneZap\n\
         \n\
         URI: https://{domain}\n\
         Version: 1\n\
         Chain ID: {chain_id}\n\
         Nonce: {nonce}\n\
         Issued At: {issued}",
        issued = chrono::Utc::now().to_rfc3339(),
    )
}

#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),
    #[error("No pending nonce for this wallet")]
    NonceMissing,
    #[error("Message does not carry the issued nonce")]
    NonceMismatch,
    #[error("Message expired at {0}")]
    Expired(String),
    #[error("Message was signed for chain {found}, expected {expected}")]
    WrongChain { expected: u64, found: String },
    #[error("Malformed signature: {0}")]
    InvalidSignature(String),
    #[error("Signature does not match wallet")]
    SignatureMismatch,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct SignIn {
    db: Arc<ContentDb>,
    chain_id: u64,
    nonce_ttl_secs: i64,
    session_ttl_secs: i64,
}

impl SignIn {
    pub fn new(db: Arc<ContentDb>, chain_id: u64, nonce_ttl_secs: i64, session_ttl_secs: i64) -> Self {
        Self {
            db,
            chain_id,
            nonce_ttl_secs,
            session_ttl_secs,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }

    /// Issue a fresh nonce, replacing any outstanding one for the wallet
    pub fn issue_nonce(&self, wallet: &str) -> Result<String, SignInError> {
        let address = parse_wallet(wallet).map_err(|e| SignInError::InvalidWallet(e.to_string()))?;
        let nonce = generate_nonce();
        self.db
            .store_nonce(&format_wallet(&address), &nonce, self.nonce_ttl_secs)?;
        debug!("Issued sign-in nonce for {}", format_wallet(&address));
        Ok(nonce)
    }

    /// Verify a signed message and open a session.
    /// The nonce is consumed whether or not verification succeeds.
    pub fn verify(
        &self,
        message: &str,
        signature: &str,
        wallet: &str,
    ) -> Result<(SessionRecord, UserRecord), SignInError> {
        let address = parse_wallet(wallet).map_err(|e| SignInError::InvalidWallet(e.to_string()))?;
        let canonical = format_wallet(&address);

        let nonce = self
            .db
            .take_nonce(&canonical)?
            .ok_or(SignInError::NonceMissing)?;
        if message_field(message, "Nonce") != Some(nonce.nonce.as_str()) {
            return Err(SignInError::NonceMismatch);
        }

        if let Some(expires) = message_field(message, "Expiration Time") {
            let expired = chrono::DateTime::parse_from_rfc3339(expires)
                .map(|at| at <= chrono::Utc::now())
                .unwrap_or(true);
            if expired {
                return Err(SignInError::Expired(expires.to_string()));
            }
        }

        if let Some(found) = message_field(message, "Chain ID") {
            if found != self.chain_id.to_string() {
                return Err(SignInError::WrongChain {
                    expected: self.chain_id,
                    found: found.to_string(),
                });
            }
        }

        let signature = Signature::from_str(signature.trim())
            .map_err(|e| SignInError::InvalidSignature(e.to_string()))?;
        if let Err(e) = signature.verify(message, address) {
            warn!("Sign-in signature rejected for {}: {}", canonical, e);
            return Err(SignInError::SignatureMismatch);
        }

        let user = self.db.upsert_wallet_user(&canonical)?;
        let session = self
            .db
            .create_session(&user.id, &canonical, self.session_ttl_secs)?;

        info!("Wallet {} signed in as user {}", canonical, user.id);
        Ok((session, user))
    }

    /// End a session. Returns false if it was already gone.
    pub fn sign_out(&self, token: &str) -> Result<bool, SignInError> {
        Ok(self.db.delete_session(token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};

    const CHAIN_ID: u64 = 5003;

    fn sign_in() -> SignIn {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        SignIn::new(db, CHAIN_ID, 600, 3600)
    }

    fn signer() -> (LocalWallet, String) {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let address = format_wallet(&wallet.address());
        (wallet, address)
    }

    #[test]
    fn test_nonce_shape() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LENGTH);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(nonce, generate_nonce());
    }

    #[tokio::test]
    async fn test_sign_in_round_trip() {
        let auth = sign_in();
        let (wallet, address) = signer();

        let nonce = auth.issue_nonce(&address).unwrap();
        let message = sign_in_message("onezap.test", &address, CHAIN_ID, &nonce);
        let signature = wallet.sign_message(message.as_str()).await.unwrap();

        let (session, user) = auth
            .verify(&message, &signature.to_string(), &address.to_uppercase().replace("0X", "0x"))
            .unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.wallet_address, address);
        assert_eq!(user.wallet_address.as_deref(), Some(address.as_str()));

        // Replaying the same signature fails: the nonce is gone
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::NonceMissing)
        ));

        assert!(auth.sign_out(&session.token).unwrap());
        assert!(!auth.sign_out(&session.token).unwrap());
    }

    #[tokio::test]
    async fn test_signature_from_other_wallet_rejected() {
        let auth = sign_in();
        let (_, address) = signer();
        let (impostor, _) = signer();

        let nonce = auth.issue_nonce(&address).unwrap();
        let message = sign_in_message("onezap.test", &address, CHAIN_ID, &nonce);
        let signature = impostor.sign_message(message.as_str()).await.unwrap();

        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::SignatureMismatch)
        ));
    }

    #[tokio::test]
    async fn test_message_must_carry_nonce_and_chain() {
        let auth = sign_in();
        let (wallet, address) = signer();

        auth.issue_nonce(&address).unwrap();
        let message = sign_in_message("onezap.test", &address, CHAIN_ID, "not-the-nonce");
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::NonceMismatch)
        ));

        let nonce = auth.issue_nonce(&address).unwrap();
        let message = sign_in_message("onezap.test", &address, 1, &nonce);
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::WrongChain { expected: CHAIN_ID, .. })
        ));
    }

    #[tokio::test]
    async fn test_nonce_must_be_the_whole_line() {
        let auth = sign_in();
        let (wallet, address) = signer();

        // The issued nonce buried in another line is not enough
        let nonce = auth.issue_nonce(&address).unwrap();
        let message = format!(
            "{}\nStatement: {}",
            sign_in_message("onezap.test", &address, CHAIN_ID, "decoy"),
            nonce
        );
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::NonceMismatch)
        ));

        let nonce = auth.issue_nonce(&address).unwrap();
        let message = sign_in_message("onezap.test", &address, CHAIN_ID, &format!("{}x", nonce));
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::NonceMismatch)
        ));
    }

    #[tokio::test]
    async fn test_expired_message_rejected() {
        let auth = sign_in();
        let (wallet, address) = signer();

        let nonce = auth.issue_nonce(&address).unwrap();
        let message = format!(
            "{}\nExpiration Time: 2020-01-01T00:00:00Z",
            sign_in_message("onezap.test", &address, CHAIN_ID, &nonce)
        );
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(matches!(
            auth.verify(&message, &signature.to_string(), &address),
            Err(SignInError::Expired(_))
        ));

        let nonce = auth.issue_nonce(&address).unwrap();
        let later = (chrono::Utc::now() + chrono::Duration::minutes(5)).to_rfc3339();
        let message = format!(
            "{}\nExpiration Time: {}",
            sign_in_message("onezap.test", &address, CHAIN_ID, &nonce),
            later
        );
        let signature = wallet.sign_message(message.as_str()).await.unwrap();
        assert!(auth.verify(&message, &signature.to_string(), &address).is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        let auth = sign_in();
        assert!(matches!(
            auth.issue_nonce("not-a-wallet"),
            Err(SignInError::InvalidWallet(_))
        ));

        let address = "0x00000000000000000000000000000000000a11ce";
        let nonce = auth.issue_nonce(address).unwrap();
        assert!(matches!(
            auth.verify(&format!("Nonce: {}", nonce), "0xzz", address),
            Err(SignInError::InvalidSignature(_))
        ));
    }
}
