//! Router fixtures for handler tests.

use crate::feeds::PlatformFeeds;
use crate::{build_router, AppState};
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use onezap_core::chain::FakeChain;
use onezap_core::db::NewContent;
use onezap_core::submit::RetryConfig;
use onezap_core::{ContentDb, OneZapConfig};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const CREATOR: &str = "0xc0ffee0000000000000000000000000000000001";
pub const READER: &str = "0x00000000000000000000000000000000000a11ce";

pub struct TestApp {
    pub state: AppState,
    pub chain: Arc<FakeChain>,
    pub router: Router,
    creator_id: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Fixture that accepts `x-wallet-address` as an identity
    pub fn with_trusted_wallet_header() -> Self {
        Self::build(true)
    }

    fn build(trust_wallet_header: bool) -> Self {
        let mut config = OneZapConfig::default();
        config.trust_wallet_header = trust_wallet_header;
        config.retry = RetryConfig {
            max_read_retries: 0,
            jitter: false,
            ..RetryConfig::default()
        };

        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let chain = Arc::new(FakeChain::new());
        let creator_id = db.upsert_wallet_user(CREATOR).unwrap().id;

        let state = AppState::new(&config, db, chain.clone(), PlatformFeeds::disabled());
        let router = build_router(state.clone());
        Self {
            state,
            chain,
            router,
            creator_id,
        }
    }

    /// Create a post owned by the creator, returning its id
    pub fn publish(&self, premium: bool) -> String {
        self.state
            .db
            .create_content(
                &self.creator_id,
                NewContent {
                    title: "the title".into(),
                    excerpt: Some("the excerpt".into()),
                    body: Some("the body".into()),
                    is_premium: premium,
                },
            )
            .unwrap()
            .id
    }

    /// Session token for `wallet`, creating its user if needed
    pub fn sign_in(&self, wallet: &str) -> String {
        let user = self.state.db.upsert_wallet_user(wallet).unwrap();
        self.state.db.create_session(&user.id, wallet, 3600).unwrap().token
    }

    pub fn creator_token(&self) -> String {
        self.sign_in(CREATOR)
    }

    pub fn authed(&self, method: Method, path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(COOKIE, format!("onezap_session={}", token))
            .body(Body::empty())
            .unwrap()
    }
}

pub fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, path: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(COOKIE, format!("onezap_session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Run one request; an empty body reads as `Value::Null`
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
