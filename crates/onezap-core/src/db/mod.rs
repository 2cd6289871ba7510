// ============================================================================
// ContentDb - Embedded Database (redb)
// ============================================================================
// Persistent storage for content, wallet users, sessions and sign-in nonces.
// Default path: ~/.onezap/onezap.redb (override via ONEZAP_DB_PATH env var)
// ============================================================================

pub mod types;

pub use types::{
    ContentPage, ContentPatch, ContentRecord, DbStats, NewContent, NonceRecord, ProfileError,
    ProfileUpdate, PruneReport, SessionRecord, UserRecord, DEFAULT_PAGE_LIMIT, MAX_BIO_LEN,
    MAX_PAGE_LIMIT, MIN_USERNAME_LEN,
};

use anyhow::{anyhow, Result};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Table definitions
const CONTENT: TableDefinition<&str, &[u8]> = TableDefinition::new("content");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const NONCES: TableDefinition<&str, &[u8]> = TableDefinition::new("nonces");
// Secondary indexes, value is the user id
const WALLETS: TableDefinition<&str, &str> = TableDefinition::new("wallets");
const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

fn encode<T: Serialize>(what: &str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| anyhow!("Failed to serialize {}: {}", what, e))
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| anyhow!("Failed to deserialize {}: {}", what, e))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Index key for a wallet: trimmed and lower-cased
fn wallet_key(wallet: &str) -> String {
    wallet.trim().to_ascii_lowercase()
}

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Embedded database for the OneZap backend
pub struct ContentDb {
    db: Database,
    path: Option<PathBuf>,
}

impl ContentDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses ONEZAP_DB_PATH env var or ~/.onezap/onezap.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("ONEZAP_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let onezap_dir = home.join(".onezap");
            std::fs::create_dir_all(&onezap_dir)
                .map_err(|e| anyhow!("Failed to create .onezap directory: {}", e))?;
            onezap_dir.join("onezap.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;
        Self::init(db, Some(db_path))
    }

    /// Volatile database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?;
        Self::init(db, None)
    }

    fn init(db: Database, path: Option<PathBuf>) -> Result<Self> {
        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn.open_table(CONTENT).map_err(|e| anyhow!("Failed to create content table: {}", e))?;
            let _ = write_txn.open_table(USERS).map_err(|e| anyhow!("Failed to create users table: {}", e))?;
            let _ = write_txn.open_table(SESSIONS).map_err(|e| anyhow!("Failed to create sessions table: {}", e))?;
            let _ = write_txn.open_table(NONCES).map_err(|e| anyhow!("Failed to create nonces table: {}", e))?;
            let _ = write_txn.open_table(WALLETS).map_err(|e| anyhow!("Failed to create wallets table: {}", e))?;
            let _ = write_txn.open_table(USERNAMES).map_err(|e| anyhow!("Failed to create usernames table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Database ready");

        Ok(Self { db, path })
    }

    /// Database file path, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ========================================================================
    // Content Operations
    // ========================================================================

    pub fn create_content(&self, user_id: &str, new: NewContent) -> Result<ContentRecord> {
        let now = now_millis();
        let record = ContentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            excerpt: new.excerpt,
            body: new.body,
            is_premium: new.is_premium,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store_content(&record)?;
        debug!("Created content {} for user {}", record.id, user_id);
        Ok(record)
    }

    fn store_content(&self, content: &ContentRecord) -> Result<()> {
        let key = format!("content:{}", content.id);
        let value = encode("content", content)?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(CONTENT)
                .map_err(|e| anyhow!("Failed to open content table: {}", e))?;
            table.insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert content: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    pub fn get_content(&self, id: &str) -> Result<Option<ContentRecord>> {
        let key = format!("content:{}", id);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CONTENT)
            .map_err(|e| anyhow!("Failed to open content table: {}", e))?;

        match table.get(key.as_str()).map_err(|e| anyhow!("Failed to get content: {}", e))? {
            Some(value) => Ok(Some(decode("content", value.value())?)),
            None => Ok(None),
        }
    }

    /// All content, newest first
    pub fn list_content(&self) -> Result<Vec<ContentRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CONTENT)
            .map_err(|e| anyhow!("Failed to open content table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate content: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let content: ContentRecord = decode("content", value.value())?;
            results.push(content);
        }

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(results)
    }

    /// One page of a user's content, newest first.
    /// `cursor` is the id of the last item on the previous page; an unknown
    /// cursor yields an empty page.
    pub fn list_content_by_user(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ContentPage> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let owned: Vec<ContentRecord> = self
            .list_content()?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect();

        let start = match cursor {
            Some(cursor) => match owned.iter().position(|c| c.id == cursor) {
                Some(pos) => pos + 1,
                None => owned.len(),
            },
            None => 0,
        };

        let remaining = owned.len().saturating_sub(start);
        let items: Vec<ContentRecord> = owned.into_iter().skip(start).take(limit).collect();
        let has_more = remaining > limit;
        let next_cursor = if has_more {
            items.last().map(|c| c.id.clone())
        } else {
            None
        };

        Ok(ContentPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Apply a partial update, returning the new record (None if missing)
    pub fn update_content(&self, id: &str, patch: ContentPatch) -> Result<Option<ContentRecord>> {
        let Some(mut content) = self.get_content(id)? else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            content.title = title;
        }
        if let Some(excerpt) = patch.excerpt {
            content.excerpt = Some(excerpt);
        }
        if let Some(body) = patch.body {
            content.body = Some(body);
        }
        if let Some(is_premium) = patch.is_premium {
            content.is_premium = is_premium;
        }
        content.updated_at = now_millis().max(content.updated_at);

        self.store_content(&content)?;
        debug!("Updated content {}", id);
        Ok(Some(content))
    }

    pub fn delete_content(&self, id: &str) -> Result<bool> {
        let key = format!("content:{}", id);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(CONTENT)
                .map_err(|e| anyhow!("Failed to open content table: {}", e))?;
            removed = table.remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove content: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Deleted content: {}", id);
        }
        Ok(removed)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find the user for a wallet, creating it on first sign-in
    pub fn upsert_wallet_user(&self, wallet: &str) -> Result<UserRecord> {
        let wallet = wallet.trim();
        let index_key = wallet_key(wallet);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let user;
        {
            let mut wallets = write_txn.open_table(WALLETS)
                .map_err(|e| anyhow!("Failed to open wallets table: {}", e))?;
            let mut users = write_txn.open_table(USERS)
                .map_err(|e| anyhow!("Failed to open users table: {}", e))?;

            let existing_id = wallets
                .get(index_key.as_str())
                .map_err(|e| anyhow!("Failed to get wallet index: {}", e))?
                .map(|v| v.value().to_string());

            let existing = match existing_id {
                Some(id) => {
                    let key = format!("users:{}", id);
                    let found = users
                        .get(key.as_str())
                        .map_err(|e| anyhow!("Failed to get user: {}", e))?
                        .map(|v| decode::<UserRecord>("user", v.value()))
                        .transpose()?;
                    found
                }
                None => None,
            };

            user = match existing {
                Some(found) => found,
                None => {
                    let now = now_millis();
                    let created = UserRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: wallet.to_string(),
                        username: None,
                        fullname: None,
                        bio: None,
                        image: None,
                        wallet_address: Some(wallet.to_string()),
                        created_at: now,
                        updated_at: now,
                    };
                    let key = format!("users:{}", created.id);
                    let value = encode("user", &created)?;
                    users.insert(key.as_str(), value.as_slice())
                        .map_err(|e| anyhow!("Failed to insert user: {}", e))?;
                    wallets.insert(index_key.as_str(), created.id.as_str())
                        .map_err(|e| anyhow!("Failed to index wallet: {}", e))?;
                    info!("Created user {} for wallet {}", created.id, wallet);
                    created
                }
            };
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let key = format!("users:{}", user_id);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(USERS)
            .map_err(|e| anyhow!("Failed to open users table: {}", e))?;

        match table.get(key.as_str()).map_err(|e| anyhow!("Failed to get user: {}", e))? {
            Some(value) => Ok(Some(decode("user", value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        match self.lookup_index(USERNAMES, "usernames", &username_key(username))? {
            Some(id) => self.get_user(&id),
            None => Ok(None),
        }
    }

    pub fn get_user_by_wallet(&self, wallet: &str) -> Result<Option<UserRecord>> {
        match self.lookup_index(WALLETS, "wallets", &wallet_key(wallet))? {
            Some(id) => self.get_user(&id),
            None => Ok(None),
        }
    }

    fn lookup_index(
        &self,
        index: TableDefinition<&str, &str>,
        label: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(index)
            .map_err(|e| anyhow!("Failed to open {} index: {}", label, e))?;

        let id = table
            .get(key)
            .map_err(|e| anyhow!("Failed to read {} index: {}", label, e))?
            .map(|v| v.value().to_string());
        Ok(id)
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(USERS)
            .map_err(|e| anyhow!("Failed to open users table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate users: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode("user", value.value())?);
        }
        Ok(results)
    }

    /// Validate and save profile fields. Usernames are unique ignoring case.
    pub fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> std::result::Result<UserRecord, ProfileError> {
        update.validate()?;

        let fullname = update.fullname.trim().to_string();
        let username = update.username.trim().to_string();
        let new_key = username_key(&username);
        let user_key = format!("users:{}", user_id);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let user;
        {
            let mut users = write_txn.open_table(USERS)
                .map_err(|e| anyhow!("Failed to open users table: {}", e))?;
            let mut usernames = write_txn.open_table(USERNAMES)
                .map_err(|e| anyhow!("Failed to open usernames table: {}", e))?;

            let current: Option<UserRecord> = users
                .get(user_key.as_str())
                .map_err(|e| anyhow!("Failed to get user: {}", e))?
                .map(|v| decode("user", v.value()))
                .transpose()?;
            let Some(mut current) = current else {
                return Err(ProfileError::NotFound);
            };

            let holder = usernames
                .get(new_key.as_str())
                .map_err(|e| anyhow!("Failed to read usernames index: {}", e))?
                .map(|v| v.value().to_string());
            if holder.as_deref().is_some_and(|id| id != user_id) {
                return Err(ProfileError::UsernameTaken);
            }

            if let Some(old) = current.username.as_deref().map(username_key) {
                if old != new_key {
                    usernames.remove(old.as_str())
                        .map_err(|e| anyhow!("Failed to release username: {}", e))?;
                }
            }
            usernames.insert(new_key.as_str(), user_id)
                .map_err(|e| anyhow!("Failed to index username: {}", e))?;

            current.name = fullname.clone();
            current.fullname = Some(fullname);
            current.username = Some(username);
            current.bio = update.bio.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
            current.image = update.image.filter(|i| !i.trim().is_empty());
            current.updated_at = now_millis().max(current.updated_at);

            let value = encode("user", &current)?;
            users.insert(user_key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert user: {}", e))?;
            user = current;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Updated profile for user {}", user_id);
        Ok(user)
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    pub fn create_session(&self, user_id: &str, wallet: &str, ttl_secs: i64) -> Result<SessionRecord> {
        let now = now_secs();
        let session = SessionRecord {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            wallet_address: wallet.trim().to_string(),
            created_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };

        let key = format!("sessions:{}", session.token);
        let value = encode("session", &session)?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(SESSIONS)
                .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;
            table.insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert session: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Opened session for user {}", user_id);
        Ok(session)
    }

    /// Look up a live session. Expired sessions resolve to None.
    pub fn get_session(&self, token: &str) -> Result<Option<SessionRecord>> {
        let key = format!("sessions:{}", token);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(SESSIONS)
            .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;

        let session: Option<SessionRecord> = table
            .get(key.as_str())
            .map_err(|e| anyhow!("Failed to get session: {}", e))?
            .map(|v| decode("session", v.value()))
            .transpose()?;

        Ok(session.filter(|s| !s.is_expired(now_secs())))
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(SESSIONS)
            .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate sessions: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode("session", value.value())?);
        }
        Ok(results)
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let key = format!("sessions:{}", token);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(SESSIONS)
                .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;
            removed = table.remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove session: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Deleted session");
        }
        Ok(removed)
    }

    // ========================================================================
    // Nonce Operations
    // ========================================================================

    /// Store a sign-in nonce, replacing any outstanding one for the wallet
    pub fn store_nonce(&self, wallet: &str, nonce: &str, ttl_secs: i64) -> Result<NonceRecord> {
        let now = now_secs();
        let record = NonceRecord {
            wallet_address: wallet.trim().to_string(),
            nonce: nonce.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };

        let key = format!("nonces:{}", wallet_key(wallet));
        let value = encode("nonce", &record)?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(NONCES)
                .map_err(|e| anyhow!("Failed to open nonces table: {}", e))?;
            table.insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert nonce: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        Ok(record)
    }

    /// Remove and return the wallet's nonce. Each nonce is usable once;
    /// an expired nonce is consumed and None is returned.
    pub fn take_nonce(&self, wallet: &str) -> Result<Option<NonceRecord>> {
        let key = format!("nonces:{}", wallet_key(wallet));

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let taken: Option<NonceRecord>;
        {
            let mut table = write_txn.open_table(NONCES)
                .map_err(|e| anyhow!("Failed to open nonces table: {}", e))?;
            let removed = table.remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove nonce: {}", e))?;
            taken = removed.map(|v| decode("nonce", v.value())).transpose()?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        Ok(taken.filter(|n| !n.is_expired(now_secs())))
    }

    fn list_nonces(&self) -> Result<Vec<NonceRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(NONCES)
            .map_err(|e| anyhow!("Failed to open nonces table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate nonces: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode("nonce", value.value())?);
        }
        Ok(results)
    }

    // ========================================================================
    // Pruning Operations
    // ========================================================================

    /// Count what `prune_expired` would delete, without deleting
    pub fn count_expired(&self, now: i64) -> Result<PruneReport> {
        Ok(PruneReport {
            sessions: self.list_sessions()?.iter().filter(|s| s.is_expired(now)).count(),
            nonces: self.list_nonces()?.iter().filter(|n| n.is_expired(now)).count(),
        })
    }

    /// Delete sessions and nonces that expired at or before `now` (unix secs)
    pub fn prune_expired(&self, now: i64) -> Result<PruneReport> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let mut report = PruneReport::default();
        {
            let mut sessions = write_txn.open_table(SESSIONS)
                .map_err(|e| anyhow!("Failed to open sessions table: {}", e))?;
            let mut expired = Vec::new();
            for entry in sessions.range::<&str>(..).map_err(|e| anyhow!("Failed to iterate sessions: {}", e))? {
                let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
                let session: SessionRecord = decode("session", value.value())?;
                if session.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                sessions.remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove session: {}", e))?;
            }
            report.sessions = expired.len();

            let mut nonces = write_txn.open_table(NONCES)
                .map_err(|e| anyhow!("Failed to open nonces table: {}", e))?;
            let mut expired = Vec::new();
            for entry in nonces.range::<&str>(..).map_err(|e| anyhow!("Failed to iterate nonces: {}", e))? {
                let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
                let nonce: NonceRecord = decode("nonce", value.value())?;
                if nonce.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                nonces.remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove nonce: {}", e))?;
            }
            report.nonces = expired.len();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit prune: {}", e))?;

        if report.sessions > 0 || report.nonces > 0 {
            info!(
                "Pruned {} expired sessions and {} expired nonces",
                report.sessions, report.nonces
            );
        }
        Ok(report)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let now = now_secs();
        let content = self.list_content()?;
        let users = self.list_users()?;
        let sessions = self.list_sessions()?;
        let nonces = self.list_nonces()?;

        let expired_sessions = sessions.iter().filter(|s| s.is_expired(now)).count();

        Ok(DbStats {
            total_content: content.len(),
            premium_content: content.iter().filter(|c| c.is_premium).count(),
            total_users: users.len(),
            users_with_profile: users.iter().filter(|u| u.username.is_some()).count(),
            active_sessions: sessions.len() - expired_sessions,
            expired_sessions,
            pending_nonces: nonces.iter().filter(|n| !n.is_expired(now)).count(),
        })
    }
}
