//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Default page size for per-user content listings
pub const DEFAULT_PAGE_LIMIT: usize = 12;
/// Largest page a caller may request
pub const MAX_PAGE_LIMIT: usize = 100;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_BIO_LEN: usize = 500;

/// A published piece of content.
/// `body` is only ever served when the gate allows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    /// Always public, even for premium content
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: bool,
    /// Owning user id
    pub user_id: String,
    /// Unix millis
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for a new content item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: bool,
}

/// Partial content update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub is_premium: Option<bool>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.body.is_none()
            && self.is_premium.is_none()
    }
}

/// One page of a user's content, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPage {
    pub items: Vec<ContentRecord>,
    /// Id to pass as `cursor` for the next page
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// A wallet-backed user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: String,
    /// Display name, the wallet address until a profile is saved
    pub name: String,
    pub username: Option<String>,
    pub fullname: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    /// Join key to the on-chain creator identity
    pub wallet_address: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub fullname: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Full name and username are required")]
    MissingFields,
    #[error("Username must be at least 3 characters")]
    UsernameTooShort,
    #[error("Bio must be 500 characters or less")]
    BioTooLong,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let fullname = self.fullname.trim();
        let username = self.username.trim();

        if fullname.is_empty() || username.is_empty() {
            return Err(ProfileError::MissingFields);
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(ProfileError::UsernameTooShort);
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                return Err(ProfileError::BioTooLong);
            }
        }
        Ok(())
    }
}

/// Signed-in wallet session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub wallet_address: String,
    /// Unix seconds
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Outstanding sign-in nonce for a wallet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NonceRecord {
    pub wallet_address: String,
    pub nonce: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl NonceRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PruneReport {
    pub sessions: usize,
    pub nonces: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub total_content: usize,
    pub premium_content: usize,
    pub total_users: usize,
    pub users_with_profile: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub pending_nonces: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(fullname: &str, username: &str, bio: Option<&str>) -> ProfileUpdate {
        ProfileUpdate {
            fullname: fullname.to_string(),
            username: username.to_string(),
            bio: bio.map(str::to_string),
            image: None,
        }
    }

    #[test]
    fn test_profile_validation() {
        assert!(update("Alice", "alice", None).validate().is_ok());
        assert!(matches!(
            update("", "alice", None).validate(),
            Err(ProfileError::MissingFields)
        ));
        assert!(matches!(
            update("Alice", "  ", None).validate(),
            Err(ProfileError::MissingFields)
        ));
        assert!(matches!(
            update("Alice", "al", None).validate(),
            Err(ProfileError::UsernameTooShort)
        ));

        let long_bio = "x".repeat(MAX_BIO_LEN + 1);
        assert!(matches!(
            update("Alice", "alice", Some(&long_bio)).validate(),
            Err(ProfileError::BioTooLong)
        ));
        let max_bio = "x".repeat(MAX_BIO_LEN);
        assert!(update("Alice", "alice", Some(&max_bio)).validate().is_ok());
    }

    #[test]
    fn test_session_expiry() {
        let session = SessionRecord {
            token: "t".into(),
            user_id: "u".into(),
            wallet_address: "0x1".into(),
            created_at: 0,
            expires_at: 100,
        };
        assert!(!session.is_expired(99));
        assert!(session.is_expired(100));
    }
}
