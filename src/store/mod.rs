//! Session and credential store contracts
//!
//! The engine never persists anything itself. Callers provide a
//! [`SessionStore`] to keep [`SessionData`] between the two halves of a
//! ceremony and a [`CredentialStore`] for registered credentials. In-memory
//! implementations are provided for tests and single-process deployments.

mod memory;

pub use memory::{MemoryCredentialStore, MemorySessionStore};

use chrono::Utc;
use std::time::Duration;

use crate::errors::{ErrorKind, Result, WebAuthnError};
use crate::protocol::challenge::generate_session_token;
use crate::webauthn::{Credential, SessionData};

/// Errors reported by store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential not found")]
    NotFound,
    #[error("credential already exists")]
    Duplicate,
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for WebAuthnError {
    fn from(err: StoreError) -> Self {
        let kind = match err {
            StoreError::NotFound => ErrorKind::AuthData,
            StoreError::Duplicate | StoreError::Backend(_) => ErrorKind::BadRequest,
        };
        Self::new(kind)
            .with_details("credential store operation failed")
            .with_source(err)
    }
}

/// Keeps session data between `begin_*` and `finish_*`
///
/// `take` must hand out a session at most once.
pub trait SessionStore: Send + Sync {
    /// Store session data under `token` for `ttl`
    ///
    /// # Errors
    /// Returns a `StoreError` if the backend cannot store the session
    fn save(
        &self,
        token: &str,
        data: SessionData,
        ttl: Duration,
    ) -> std::result::Result<(), StoreError>;

    /// Load and invalidate the session stored under `token`
    ///
    /// Returns `None` for unknown, expired or already consumed tokens.
    ///
    /// # Errors
    /// Returns a `StoreError` if the backend cannot be read
    fn take(&self, token: &str) -> std::result::Result<Option<SessionData>, StoreError>;
}

/// Persists credentials registered to users
pub trait CredentialStore: Send + Sync {
    /// # Errors
    /// Returns a `StoreError` if the backend cannot be read
    fn credentials_for_user(
        &self,
        user_id: &[u8],
    ) -> std::result::Result<Vec<Credential>, StoreError>;

    /// # Errors
    /// Returns a `StoreError` if the backend cannot be read
    fn credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> std::result::Result<Option<(Vec<u8>, Credential)>, StoreError>;

    /// # Errors
    /// Returns `StoreError::Duplicate` if the credential ID is already registered
    fn add_credential(
        &self,
        user_id: &[u8],
        credential: Credential,
    ) -> std::result::Result<(), StoreError>;

    /// Replace a stored credential after a login (counter, flags, clone warning)
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the credential does not exist
    fn update_credential(&self, credential: &Credential) -> std::result::Result<(), StoreError>;
}

/// Save session data under a fresh token and return the token
///
/// The TTL is the remaining ceremony lifetime, or `default_ttl` when the
/// session does not expire.
///
/// # Errors
/// Returns an error if token generation or the store fails
pub fn save_session(
    store: &dyn SessionStore,
    data: SessionData,
    default_ttl: Duration,
) -> Result<String> {
    let token = generate_session_token()?;
    let ttl = data.time_to_live(Utc::now()).unwrap_or(default_ttl);
    store.save(&token, data, ttl)?;
    Ok(token)
}

/// Take the session stored under `token`, consuming it
///
/// # Errors
/// Returns `ChallengeMismatch` when no session exists for the token
/// (unknown, expired or already used)
pub fn take_session(store: &dyn SessionStore, token: &str) -> Result<SessionData> {
    store.take(token)?.ok_or_else(|| {
        WebAuthnError::new(ErrorKind::ChallengeMismatch)
            .with_details("session not found or already consumed")
    })
}
