//! Request identity: who is asking, by user id and/or wallet.

use crate::db::ContentDb;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "onezap_session";

/// Header carrying a bare wallet address (only honored when trusted)
pub const WALLET_HEADER: &str = "x-wallet-address";

/// Raw credentials pulled off a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestCredentials {
    pub session_token: Option<String>,
    pub wallet_header: Option<String>,
}

impl RequestCredentials {
    /// Build from the `Cookie`, `Authorization` and wallet header values.
    /// The session cookie wins over a bearer token.
    pub fn from_parts(
        cookie: Option<&str>,
        authorization: Option<&str>,
        wallet_header: Option<&str>,
    ) -> Self {
        let from_cookie = cookie.and_then(|raw| {
            raw.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
            })
        });

        let from_bearer = authorization.and_then(|raw| {
            let token = raw.trim().strip_prefix("Bearer ")?.trim();
            (!token.is_empty()).then(|| token.to_string())
        });

        Self {
            session_token: from_cookie.or(from_bearer),
            wallet_header: wallet_header
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentitySource {
    Session,
    WalletHeader,
}

/// The resolved caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// Absent for header-only identities, which can read but not write
    pub user_id: Option<String>,
    pub wallet: Option<String>,
    pub source: IdentitySource,
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl SessionIdentity {
    /// True when the caller has a signed-in user account
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Resolves request credentials to an identity
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// `Ok(None)` means anonymous
    async fn resolve(&self, credentials: &RequestCredentials) -> Result<Option<SessionIdentity>>;
}

/// Session provider backed by the embedded store
pub struct StoreSessionProvider {
    db: Arc<ContentDb>,
    trust_wallet_header: bool,
}

impl StoreSessionProvider {
    pub fn new(db: Arc<ContentDb>, trust_wallet_header: bool) -> Self {
        Self {
            db,
            trust_wallet_header,
        }
    }
}

#[async_trait]
impl SessionProvider for StoreSessionProvider {
    async fn resolve(&self, credentials: &RequestCredentials) -> Result<Option<SessionIdentity>> {
        if let Some(token) = &credentials.session_token {
            if let Some(session) = self.db.get_session(token)? {
                return Ok(Some(SessionIdentity {
                    user_id: Some(session.user_id),
                    wallet: Some(session.wallet_address),
                    source: IdentitySource::Session,
                    session_token: Some(session.token),
                }));
            }
            debug!("Session token not found or expired");
        }

        if self.trust_wallet_header {
            if let Some(wallet) = &credentials.wallet_header {
                return Ok(Some(SessionIdentity {
                    user_id: None,
                    wallet: Some(wallet.clone()),
                    source: IdentitySource::WalletHeader,
                    session_token: None,
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x00000000000000000000000000000000000a11ce";

    #[test]
    fn test_credentials_from_cookie_and_bearer() {
        let creds = RequestCredentials::from_parts(
            Some("theme=dark; onezap_session=abc123; other=1"),
            Some("Bearer zzz"),
            None,
        );
        assert_eq!(creds.session_token.as_deref(), Some("abc123"));

        let creds = RequestCredentials::from_parts(None, Some("Bearer zzz"), Some("  "));
        assert_eq!(creds.session_token.as_deref(), Some("zzz"));
        assert!(creds.wallet_header.is_none());

        let creds = RequestCredentials::from_parts(Some("onezap_session="), Some("Basic x"), None);
        assert!(creds.session_token.is_none());
    }

    #[tokio::test]
    async fn test_session_token_resolves_user() {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let user = db.upsert_wallet_user(WALLET).unwrap();
        let session = db.create_session(&user.id, WALLET, 60).unwrap();

        let provider = StoreSessionProvider::new(db, false);
        let creds = RequestCredentials {
            session_token: Some(session.token.clone()),
            wallet_header: None,
        };
        let identity = provider.resolve(&creds).await.unwrap().unwrap();
        assert_eq!(identity.user_id, Some(user.id));
        assert_eq!(identity.wallet.as_deref(), Some(WALLET));
        assert_eq!(identity.source, IdentitySource::Session);
        assert!(identity.is_authenticated());
    }

    #[tokio::test]
    async fn test_wallet_header_needs_trust() {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let creds = RequestCredentials::from_parts(None, None, Some(WALLET));

        let untrusted = StoreSessionProvider::new(db.clone(), false);
        assert!(untrusted.resolve(&creds).await.unwrap().is_none());

        let trusted = StoreSessionProvider::new(db, true);
        let identity = trusted.resolve(&creds).await.unwrap().unwrap();
        assert_eq!(identity.source, IdentitySource::WalletHeader);
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn test_expired_session_is_anonymous() {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let session = db.create_session("u1", WALLET, 0).unwrap();
        let provider = StoreSessionProvider::new(db, false);
        let creds = RequestCredentials {
            session_token: Some(session.token),
            wallet_header: None,
        };
        assert!(provider.resolve(&creds).await.unwrap().is_none());
    }
}
