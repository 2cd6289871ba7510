//! Content endpoints, including the gated read.

use crate::error::ApiError;
use crate::identity::{Caller, SignedIn};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onezap_core::access::AccessRequest;
use onezap_core::db::{ContentPatch, ContentRecord, NewContent, UserRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public view of a content owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorView {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub image: Option<String>,
    pub wallet_address: Option<String>,
}

impl From<&UserRecord> for CreatorView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            image: user.image.clone(),
            wallet_address: user.wallet_address.clone(),
        }
    }
}

/// Gated read response. `body` is omitted unless access is granted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    pub id: String,
    pub title: String,
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_premium: bool,
    pub user_id: String,
    pub creator: Option<CreatorView>,
    pub created_at: i64,
    pub updated_at: i64,
    pub has_access: bool,
    pub requires_subscription: bool,
}

/// Listing row, never carries the body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub id: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub is_premium: bool,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ContentRecord> for ContentSummary {
    fn from(c: ContentRecord) -> Self {
        Self {
            id: c.id,
            title: c.title,
            excerpt: c.excerpt,
            is_premium: c.is_premium,
            user_id: c.user_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Owner's full view after a write
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedContent {
    pub id: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: bool,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ContentRecord> for OwnedContent {
    fn from(c: ContentRecord) -> Self {
        Self {
            id: c.id,
            title: c.title,
            excerpt: c.excerpt,
            body: c.body,
            is_premium: c.is_premium,
            user_id: c.user_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentBody {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentBody {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: Option<bool>,
}

/// GET /api/content/{id}
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> Result<Json<ContentView>, ApiError> {
    let content = state
        .db
        .get_content(&id)
        .map_err(|e| ApiError::internal("Failed to fetch content", e))?
        .ok_or_else(|| ApiError::not_found("Content not found"))?;

    let owner = state
        .db
        .get_user(&content.user_id)
        .map_err(|e| ApiError::internal("Failed to fetch content", e))?;

    let request = AccessRequest {
        is_premium: content.is_premium,
        owner_user_id: &content.user_id,
        creator_wallet: owner.as_ref().and_then(|o| o.wallet_address.as_deref()),
        requester_user_id: caller.user_id(),
        requester_wallet: caller.wallet(),
    };
    let access = state.gate.evaluate(&request).await?;
    debug!("Content {} read as {:?}", id, access);

    let has_access = access.grants_body();
    Ok(Json(ContentView {
        body: if has_access { content.body } else { None },
        id: content.id,
        title: content.title,
        excerpt: content.excerpt,
        is_premium: content.is_premium,
        user_id: content.user_id,
        creator: owner.as_ref().map(CreatorView::from),
        created_at: content.created_at,
        updated_at: content.updated_at,
        has_access,
        requires_subscription: content.is_premium && !has_access,
    }))
}

/// GET /api/content
pub async fn list_content(
    State(state): State<AppState>,
    _user: SignedIn,
) -> Result<Json<Vec<ContentSummary>>, ApiError> {
    let items = state
        .db
        .list_content()
        .map_err(|e| ApiError::internal("Failed to fetch content", e))?;
    Ok(Json(items.into_iter().map(ContentSummary::from).collect()))
}

/// POST /api/content
pub async fn create_content(
    State(state): State<AppState>,
    user: SignedIn,
    Json(body): Json<CreateContentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;

    let new = NewContent {
        title,
        excerpt: body.excerpt,
        body: body.body,
        is_premium: body.is_premium.unwrap_or(false),
    };
    let created = state
        .db
        .create_content(&user.user_id, new)
        .map_err(|e| ApiError::internal("Failed to create content", e))?;

    Ok((StatusCode::CREATED, Json(OwnedContent::from(created))))
}

fn owned_by(state: &AppState, id: &str, user_id: &str, action: &str) -> Result<ContentRecord, ApiError> {
    let content = state
        .db
        .get_content(id)
        .map_err(|e| ApiError::internal(&format!("Failed to {} content", action), e))?
        .ok_or_else(|| ApiError::not_found("Content not found"))?;
    if content.user_id != user_id {
        return Err(ApiError::forbidden("You do not own this content"));
    }
    Ok(content)
}

/// PUT /api/content/{id}
pub async fn update_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: SignedIn,
    Json(body): Json<UpdateContentBody>,
) -> Result<Json<OwnedContent>, ApiError> {
    owned_by(&state, &id, &user.user_id, "update")?;

    let patch = ContentPatch {
        title: body.title,
        excerpt: body.excerpt,
        body: body.body,
        is_premium: body.is_premium,
    };
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }

    let updated = state
        .db
        .update_content(&id, patch)
        .map_err(|e| ApiError::internal("Failed to update content", e))?
        .ok_or_else(|| ApiError::not_found("Content not found"))?;
    Ok(Json(OwnedContent::from(updated)))
}

/// DELETE /api/content/{id}
pub async fn delete_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: SignedIn,
) -> Result<StatusCode, ApiError> {
    owned_by(&state, &id, &user.user_id, "delete")?;

    let removed = state
        .db
        .delete_content(&id)
        .map_err(|e| ApiError::internal("Failed to delete content", e))?;
    if !removed {
        return Err(ApiError::not_found("Content not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
