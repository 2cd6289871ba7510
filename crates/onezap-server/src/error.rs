//! JSON error responses: `{"error": ..., "message"?: ...}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use onezap_core::access::GateError;
use onezap_core::auth::SignInError;
use onezap_core::chain::ChainError;
use onezap_core::db::ProfileError;
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str) -> Self {
        Self {
            status,
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(error: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
            .with_message("Please sign in to access this resource")
    }

    pub fn forbidden(error: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, error)
    }

    pub fn not_found(error: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Generic 500. The cause is logged, never sent to the client.
    pub fn internal(error: &str, cause: impl fmt::Display) -> Self {
        error!("{}: {}", error, cause);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn unavailable(error: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.status.as_u16(), self.error)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({ "error": self.error, "message": message }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        warn!("Chain read failed: {}", e);
        Self::unavailable("Chain unavailable").with_message(e.to_string())
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        error!("Content gate misconfigured: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Creator wallet misconfigured")
            .with_message(e.to_string())
    }
}

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound => Self::not_found("User not found"),
            ProfileError::Store(cause) => Self::internal("Failed to update profile", cause),
            other => Self::bad_request(&other.to_string()),
        }
    }
}

impl From<SignInError> for ApiError {
    fn from(e: SignInError) -> Self {
        match e {
            SignInError::InvalidWallet(_) => Self::bad_request(&e.to_string()),
            SignInError::Store(cause) => Self::internal("Verification failed", cause),
            other => Self::new(StatusCode::UNAUTHORIZED, "Verification failed")
                .with_message(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_errors_map_to_status() {
        assert_eq!(
            ApiError::from(ProfileError::UsernameTaken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ProfileError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ProfileError::Store(anyhow::anyhow!("disk"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sign_in_failures_are_unauthorized() {
        assert_eq!(
            ApiError::from(SignInError::SignatureMismatch).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(SignInError::InvalidWallet("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_hides_cause() {
        let err = ApiError::internal("Failed to fetch content", "redb exploded");
        assert_eq!(err.error, "Failed to fetch content");
        assert!(err.message.is_none());
    }
}
