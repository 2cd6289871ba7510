//! ============================================================================
//! ONEZAP-SERVER: HTTP API
//! ============================================================================
//! Content publishing with subscription-gated premium reads:
//! - `GET /api/content/{id}` serves the body only to free readers, owners
//!   and wallets holding an ACTIVE subscription to the creator
//! - Wallet sign-in issues cookie sessions
//! - Chain views (access, creator registry) and live event feeds
//! ============================================================================

pub mod error;
pub mod feeds;
pub mod identity;
pub mod routes;

#[cfg(test)]
mod testing;

use axum::routing::{get, post};
use axum::Router;
use feeds::PlatformFeeds;
use onezap_core::auth::{SessionProvider, SignIn, StoreSessionProvider};
use onezap_core::{AccessResolver, ChainClient, ContentDb, ContentGate, OneZapConfig};
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ContentDb>,
    pub chain: Arc<dyn ChainClient>,
    pub gate: ContentGate,
    pub sessions: Arc<dyn SessionProvider>,
    pub sign_in: Arc<SignIn>,
    pub feeds: Arc<PlatformFeeds>,
}

impl AppState {
    pub fn new(
        config: &OneZapConfig,
        db: Arc<ContentDb>,
        chain: Arc<dyn ChainClient>,
        feeds: PlatformFeeds,
    ) -> Self {
        let resolver = AccessResolver::with_retry(chain.clone(), config.retry.clone());
        let sessions = StoreSessionProvider::new(db.clone(), config.trust_wallet_header);
        let sign_in = SignIn::new(
            db.clone(),
            config.chain.chain_id,
            config.nonce_ttl_secs,
            config.session_ttl_secs,
        );

        Self {
            db,
            chain,
            gate: ContentGate::new(resolver),
            sessions: Arc::new(sessions),
            sign_in: Arc::new(sign_in),
            feeds: Arc::new(feeds),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    use routes::{auth, chain, content, users};

    Router::new()
        .route("/health", get(routes::health))
        // Content
        .route(
            "/api/content",
            get(content::list_content).post(content::create_content),
        )
        .route(
            "/api/content/:id",
            get(content::get_content)
                .put(content::update_content)
                .delete(content::delete_content),
        )
        .route("/content/:id", get(content::get_content))
        // Users
        .route("/api/user/:username", get(users::get_user_page))
        .route(
            "/api/profile",
            get(users::get_profile).put(users::update_profile),
        )
        // Sign-in
        .route("/api/siwe/nonce", get(auth::nonce))
        .route("/api/siwe/verify", post(auth::verify))
        .route("/api/siwe/logout", post(auth::logout))
        .route("/api/session", get(auth::session))
        // Chain
        .route("/api/access/:creator", get(chain::access))
        .route("/api/creators/count", get(chain::creator_count))
        .route("/api/creators/:wallet", get(chain::creator))
        .route("/api/events/:feed", get(chain::events))
        .with_state(state)
}
