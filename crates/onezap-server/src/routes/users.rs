//! Public creator pages and the caller's own profile.

use super::content::ContentSummary;
use crate::error::ApiError;
use crate::identity::SignedIn;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use onezap_core::db::{ProfileUpdate, UserRecord, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub fullname: String,
    pub username: String,
    pub bio: String,
    pub image: Option<String>,
    pub wallet_address: Option<String>,
}

impl From<UserRecord> for ProfileView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            fullname: user.fullname.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            bio: user.bio.unwrap_or_default(),
            image: user.image,
            wallet_address: user.wallet_address,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    /// Kept as text so a bad value falls back to the default
    pub limit: Option<String>,
}

impl PageQuery {
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_PAGE_LIMIT))
            .unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub cursor: Option<String>,
    pub has_more: bool,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub user: ProfileView,
    pub content: Vec<ContentSummary>,
    pub pagination: Pagination,
}

/// GET /api/user/{username}
pub async fn get_user_page(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    let user = state
        .db
        .get_user_by_username(&username)
        .map_err(|e| ApiError::internal("Failed to fetch user data", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let limit = query.limit();
    let page = state
        .db
        .list_content_by_user(&user.id, query.cursor.as_deref(), limit)
        .map_err(|e| ApiError::internal("Failed to fetch user data", e))?;

    Ok(Json(UserPage {
        user: ProfileView::from(user),
        content: page.items.into_iter().map(ContentSummary::from).collect(),
        pagination: Pagination {
            cursor: page.next_cursor,
            has_more: page.has_more,
            limit,
        },
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileBody {
    pub fullname: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: SignedIn,
) -> Result<Json<ProfileView>, ApiError> {
    let record = state
        .db
        .get_user(&user.user_id)
        .map_err(|e| ApiError::internal("Failed to fetch profile", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(ProfileView::from(record)))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: SignedIn,
    Json(body): Json<ProfileBody>,
) -> Result<Json<ProfileView>, ApiError> {
    let update = ProfileUpdate {
        fullname: body.fullname.unwrap_or_default(),
        username: body.username.unwrap_or_default(),
        bio: body.bio,
        image: body.image,
    };
    let saved = state.db.update_profile(&user.user_id, update)?;
    Ok(Json(ProfileView::from(saved)))
}

#[cfg(test)]
mod tests {
    use crate::testing::{json_request, request, send, TestApp, READER};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_update_and_public_page() {
        let app = TestApp::new();
        let token = app.creator_token();

        let req = json_request(
            Method::PUT,
            "/api/profile",
            Some(&token),
            json!({"fullname": "Coffee Creator", "username": "coffee", "bio": "beans"}),
        );
        let (status, profile) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["username"], "coffee");

        for _ in 0..3 {
            app.publish(true);
        }

        let (status, page) = send(&app, request(Method::GET, "/api/user/coffee?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["user"]["fullname"], "Coffee Creator");
        assert_eq!(page["content"].as_array().map(Vec::len), Some(2));
        assert!(page["content"][0].get("body").is_none());
        assert_eq!(page["pagination"]["hasMore"], true);

        let cursor = page["pagination"]["cursor"].as_str().unwrap().to_string();
        let path = format!("/api/user/coffee?limit=2&cursor={}", cursor);
        let (_, rest) = send(&app, request(Method::GET, &path)).await;
        assert_eq!(rest["content"].as_array().map(Vec::len), Some(1));
        assert_eq!(rest["pagination"]["hasMore"], false);
    }

    #[tokio::test]
    async fn test_profile_validation_errors() {
        let app = TestApp::new();
        let token = app.creator_token();
        let other = app.sign_in(READER);

        let req = json_request(Method::PUT, "/api/profile", Some(&token), json!({"fullname": "A", "username": "ab"}));
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username must be at least 3 characters");

        let req = json_request(Method::PUT, "/api/profile", Some(&token), json!({"fullname": "A", "username": "taken"}));
        send(&app, req).await;
        let req = json_request(Method::PUT, "/api/profile", Some(&other), json!({"fullname": "B", "username": "taken"}));
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username is already taken");
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let app = TestApp::new();
        let (status, _) = send(&app, request(Method::GET, "/api/user/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request(Method::GET, "/api/profile")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
