//! Request extractors for the calling identity.

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use onezap_core::auth::{RequestCredentials, SessionIdentity, WALLET_HEADER};

fn credentials(parts: &Parts) -> RequestCredentials {
    let cookies: Vec<&str> = parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let cookie = (!cookies.is_empty()).then(|| cookies.join("; "));

    let authorization = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let wallet = parts.headers.get(WALLET_HEADER).and_then(|v| v.to_str().ok());
    RequestCredentials::from_parts(cookie.as_deref(), authorization, wallet)
}

/// Anyone; `None` when anonymous
pub struct Caller(pub Option<SessionIdentity>);

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().and_then(|i| i.user_id.as_deref())
    }

    pub fn wallet(&self) -> Option<&str> {
        self.0.as_ref().and_then(|i| i.wallet.as_deref())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = credentials(parts);
        let identity = state
            .sessions
            .resolve(&credentials)
            .await
            .map_err(|e| ApiError::internal("Failed to resolve session", e))?;
        Ok(Caller(identity))
    }
}

/// A signed-in user; rejects with 401 otherwise
pub struct SignedIn {
    pub user_id: String,
    pub identity: SessionIdentity,
}

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(identity) = Caller::from_request_parts(parts, state).await?;
        match identity {
            Some(identity) => match identity.user_id.clone() {
                Some(user_id) => Ok(SignedIn { user_id, identity }),
                None => Err(ApiError::unauthorized()),
            },
            None => Err(ApiError::unauthorized()),
        }
    }
}
