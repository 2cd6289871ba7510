//! Wallet sign-in and session endpoints.

use crate::error::ApiError;
use crate::identity::Caller;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::Json;
use onezap_core::auth::{IdentitySource, SESSION_COOKIE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::users::ProfileView;

fn session_cookie(token: &str, max_age: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.max(0)
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceQuery {
    pub wallet_address: Option<String>,
}

/// GET /api/siwe/nonce?walletAddress=
pub async fn nonce(
    State(state): State<AppState>,
    Query(query): Query<NonceQuery>,
) -> Result<Json<Value>, ApiError> {
    let wallet = query
        .wallet_address
        .filter(|w| !w.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("walletAddress is required"))?;

    let nonce = state.sign_in.issue_nonce(&wallet)?;
    Ok(Json(json!({ "nonce": nonce, "chainId": state.sign_in.chain_id() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub message: Option<String>,
    pub signature: Option<String>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub verified: bool,
    pub token: String,
    pub expires_at: i64,
    pub user: ProfileView,
}

/// POST /api/siwe/verify
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(message), Some(signature), Some(wallet)) =
        (body.message, body.signature, body.wallet_address)
    else {
        return Err(ApiError::bad_request(
            "message, signature, and walletAddress are required",
        ));
    };

    let (session, user) = state.sign_in.verify(&message, &signature, &wallet)?;
    let cookie = session_cookie(&session.token, state.sign_in.session_ttl_secs());

    Ok((
        [(SET_COOKIE, cookie)],
        Json(VerifyResponse {
            success: true,
            verified: true,
            token: session.token,
            expires_at: session.expires_at,
            user: ProfileView::from(user),
        }),
    ))
}

/// POST /api/siwe/logout
pub async fn logout(State(state): State<AppState>, caller: Caller) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = caller.0.as_ref().and_then(|i| i.session_token.as_deref()) {
        state.sign_in.sign_out(token)?;
    }
    Ok(([(SET_COOKIE, session_cookie("", 0))], Json(Value::Null)))
}

/// GET /api/session, `null` when anonymous
pub async fn session(State(state): State<AppState>, caller: Caller) -> Result<Json<Value>, ApiError> {
    let Some(identity) = caller.0 else {
        return Ok(Json(Value::Null));
    };

    let user = match (&identity.source, identity.user_id.as_deref()) {
        (IdentitySource::Session, Some(user_id)) => state
            .db
            .get_user(user_id)
            .map_err(|e| ApiError::internal("Failed to fetch session", e))?
            .map(ProfileView::from),
        _ => None,
    };

    Ok(Json(json!({
        "session": identity,
        "user": user,
    })))
}

#[cfg(test)]
mod tests {
    use crate::testing::{json_request, request, send, TestApp};
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{Method, Request, StatusCode};
    use axum::body::Body;
    use ethers::signers::{LocalWallet, Signer};
    use onezap_core::auth::sign_in_message;
    use onezap_core::chain::format_wallet;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_sign_in_flow_sets_session_cookie() {
        let app = TestApp::new();
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let address = format_wallet(&wallet.address());

        let (status, body) = send(
            &app,
            request(Method::GET, &format!("/api/siwe/nonce?walletAddress={}", address)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let nonce = body["nonce"].as_str().unwrap().to_string();
        let chain_id = body["chainId"].as_u64().unwrap();

        let message = sign_in_message("onezap.test", &address, chain_id, &nonce);
        let signature = wallet.sign_message(message.as_str()).await.unwrap();

        let req = json_request(
            Method::POST,
            "/api/siwe/verify",
            None,
            json!({"message": message, "signature": signature.to_string(), "walletAddress": address}),
        );
        let response = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("onezap_session="));
        let pair = cookie.split(';').next().unwrap().to_string();

        let req = Request::builder()
            .uri("/api/session")
            .header(COOKIE, &pair)
            .body(Body::empty())
            .unwrap();
        let (_, session) = send(&app, req).await;
        assert_eq!(session["user"]["walletAddress"], address);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/siwe/logout")
            .header(COOKIE, &pair)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::builder()
            .uri("/api/session")
            .header(COOKIE, &pair)
            .body(Body::empty())
            .unwrap();
        let (_, session) = send(&app, req).await;
        assert!(session.is_null());
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_fields_and_bad_signature() {
        let app = TestApp::new();
        let req = json_request(Method::POST, "/api/siwe/verify", None, json!({"message": "hi"}));
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let address = "0x00000000000000000000000000000000000a11ce";
        let (_, body) = send(
            &app,
            request(Method::GET, &format!("/api/siwe/nonce?walletAddress={}", address)),
        )
        .await;
        let nonce = body["nonce"].as_str().unwrap();
        let chain_id = body["chainId"].as_u64().unwrap();
        let impostor = LocalWallet::new(&mut rand::thread_rng());
        let message = sign_in_message("onezap.test", address, chain_id, nonce);
        let signature = impostor.sign_message(message.as_str()).await.unwrap();

        let req = json_request(
            Method::POST,
            "/api/siwe/verify",
            None,
            json!({"message": message, "signature": signature.to_string(), "walletAddress": address}),
        );
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Verification failed");
    }

    #[tokio::test]
    async fn test_nonce_requires_valid_wallet() {
        let app = TestApp::new();
        let (status, _) = send(&app, request(Method::GET, "/api/siwe/nonce")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, request(Method::GET, "/api/siwe/nonce?walletAddress=nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
