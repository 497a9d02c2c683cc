use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::client::SupabaseClient;
use crate::error::AppError;

/// Remote table holding the user list.
pub const USERS_TABLE: &str = "app_users";

/// Sessions expire after this much inactivity.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// One row of the remote user table.
///
/// `password` holds either a PHC-format Argon2 hash or, for rows not yet
/// migrated, a legacy plaintext value.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserCredential {
    pub username: String,
    pub password: String,
}

/// An authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username owning the session.
    pub username: String,

    /// Last time an authorized request touched the session.
    pub last_active: SystemTime,
}

impl Session {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            last_active: SystemTime::now(),
        }
    }

    /// Whether the inactivity window has been exceeded at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now.duration_since(self.last_active)
            .map(|elapsed| elapsed > SESSION_TIMEOUT)
            .unwrap_or(false)
    }
}

/// In-memory session map, owned by the application state. Sessions live only
/// for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for an authenticated user and return its id.
    pub fn create(&mut self, username: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .insert(session_id.clone(), Session::new(username));
        session_id
    }

    /// Validate a session against the inactivity window, refreshing
    /// `last_active` on success and dropping the session on expiry.
    ///
    /// Returns the owning username while the session is live.
    pub fn validate(&mut self, session_id: &str) -> Option<String> {
        self.validate_at(session_id, SystemTime::now())
    }

    pub fn validate_at(&mut self, session_id: &str, now: SystemTime) -> Option<String> {
        let expired = match self.sessions.get(session_id) {
            Some(session) => session.is_expired_at(now),
            None => return None,
        };

        if expired {
            self.sessions.remove(session_id);
            return None;
        }

        let session = self.sessions.get_mut(session_id)?;
        session.last_active = now;
        Some(session.username.clone())
    }

    /// Explicit logout.
    pub fn remove(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn insert_at(&mut self, session_id: &str, username: &str, last_active: SystemTime) {
        self.sessions.insert(
            session_id.to_string(),
            Session {
                username: username.to_string(),
                last_active,
            },
        );
    }
}

/// Verify submitted credentials against the remote user table.
///
/// The table is fetched fresh on every attempt; nothing is cached between
/// logins.
///
/// # Errors
/// * `AppError::Auth("user table unavailable")` when the table cannot be
///   fetched or has no rows.
/// * `AppError::Auth("invalid credentials")` when no row matches.
pub async fn check_login(
    client: &SupabaseClient,
    username: &str,
    password: &str,
) -> Result<(), AppError> {
    let rows = client.fetch_table(USERS_TABLE).await.map_err(|err| {
        log::warn!("user table fetch failed: {}", err);
        AppError::Auth("user table unavailable".to_string())
    })?;

    check_rows(&rows, username, password)
}

/// Decide a login against the fetched user rows.
///
/// Username lookup is case-sensitive exact match; rows that do not parse as
/// credentials are skipped.
///
/// # Errors
/// * `AppError::Auth("user table unavailable")` when there are no rows.
/// * `AppError::Auth("invalid credentials")` when no row matches.
pub fn check_rows(rows: &[Value], username: &str, password: &str) -> Result<(), AppError> {
    if rows.is_empty() {
        return Err(AppError::Auth("user table unavailable".to_string()));
    }

    let matched = rows
        .iter()
        .filter_map(|row| serde_json::from_value::<UserCredential>(row.clone()).ok())
        .filter(|user| user.username == username)
        .any(|user| credential_matches(password, &user.password));

    if matched {
        Ok(())
    } else {
        Err(AppError::Auth("invalid credentials".to_string()))
    }
}

/// Check a submitted password against the stored value.
///
/// PHC-format values are verified as Argon2 hashes; anything else is a
/// legacy plaintext row compared by case-sensitive exact equality.
pub fn credential_matches(password: &str, stored: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(stored) {
        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
    }
    stored == password
}

/// Hash a password with Argon2id, for seeding hashed rows into the user
/// table.
///
/// # Errors
/// * `AppError::Auth` when hashing fails.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::Auth("password hashing failed".to_string()))
}
