//! Read-only chain views: caller access, creator registry, live feeds.

use crate::error::ApiError;
use crate::identity::Caller;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use onezap_core::access::{format_token_amount, subscription_price, DEFAULT_TOKEN_DECIMALS};
use onezap_core::chain::{format_wallet, parse_wallet};
use serde_json::{json, Value};
use tracing::warn;

async fn token_decimals(state: &AppState) -> u8 {
    match state.chain.token_decimals().await {
        Ok(decimals) => decimals,
        Err(e) => {
            warn!("decimals() failed, assuming {}: {}", DEFAULT_TOKEN_DECIMALS, e);
            DEFAULT_TOKEN_DECIMALS
        }
    }
}

/// GET /api/access/{creator}
pub async fn access(
    State(state): State<AppState>,
    Path(creator): Path<String>,
    caller: Caller,
) -> Result<Json<Value>, ApiError> {
    let creator = parse_wallet(&creator).map_err(|e| ApiError::bad_request(&e.to_string()))?;
    let subscriber = caller.wallet().and_then(|w| parse_wallet(w).ok());
    let resolver = state.gate.resolver();

    // One scan answers both fields; a failed scan denies
    let subscription = match subscriber {
        Some(subscriber) => match resolver.find_active_subscription(subscriber, creator).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Access check failed: {} - denying", e);
                None
            }
        },
        None => None,
    };
    let has_access = subscription.is_some();

    let decimals = token_decimals(&state).await;
    let price = subscription_price(decimals)?;

    Ok(Json(json!({
        "creator": format_wallet(&creator),
        "wallet": subscriber.map(|s| format_wallet(&s)),
        "hasAccess": has_access,
        "subscription": subscription.map(|s| json!({
            "id": s.subscription_id.to_string(),
            "amount": format_token_amount(s.amount, decimals),
            "status": s.status,
        })),
        "price": {
            "units": price.to_string(),
            "display": format_token_amount(price, decimals),
        },
    })))
}

/// GET /api/creators/{wallet}
pub async fn creator(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let wallet = parse_wallet(&wallet).map_err(|e| ApiError::bad_request(&e.to_string()))?;

    if !state.chain.is_creator(wallet).await? {
        return Ok(Json(json!({
            "wallet": format_wallet(&wallet),
            "isCreator": false,
            "creator": null,
        })));
    }

    let record = state.chain.get_creator(wallet).await?;
    let decimals = token_decimals(&state).await;
    Ok(Json(json!({
        "wallet": format_wallet(&wallet),
        "isCreator": record.exists,
        "creator": {
            "username": record.username,
            "wallet": format_wallet(&record.wallet),
            "totalEarnings": format_token_amount(record.total_earnings, decimals),
        },
    })))
}

/// GET /api/creators/count
pub async fn creator_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.chain.get_creator_count().await?;
    Ok(Json(json!({ "count": count.to_string() })))
}

/// GET /api/events/{feed}
pub async fn events(
    State(state): State<AppState>,
    Path(feed): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.feeds.snapshot(&feed).await {
        None => Err(ApiError::not_found("Unknown feed")),
        Some(None) => Err(ApiError::unavailable("Feed is not running")),
        Some(Some(snapshot)) => serde_json::to_value(snapshot)
            .map(Json)
            .map_err(|e| ApiError::internal("Failed to render feed", e)),
    }
}
