//! In-memory stores

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{CredentialStore, SessionStore, StoreError};
use crate::webauthn::{Credential, SessionData};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// Session store backed by a `HashMap`; expired entries are dropped on access
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    // A TTL too large for `Instant` is kept without a deadline
    sessions: Mutex<HashMap<String, (SessionData, Option<Instant>)>>,
}

fn is_live(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_none_or(|d| d > now)
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held, expired ones included
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the lock is poisoned
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.lock().map_err(poisoned)?.len())
    }

    /// # Errors
    /// Returns `StoreError::Backend` if the lock is poisoned
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, token: &str, data: SessionData, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let deadline = now.checked_add(ttl);
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        sessions.retain(|_, (_, expires)| is_live(*expires, now));
        sessions.insert(token.to_string(), (data, deadline));
        Ok(())
    }

    fn take(&self, token: &str) -> Result<Option<SessionData>, StoreError> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        Ok(sessions
            .remove(token)
            .filter(|(_, deadline)| is_live(*deadline, Instant::now()))
            .map(|(data, _)| data))
    }
}

/// Credential store backed by a `HashMap` keyed on credential ID
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    // credential id -> (user id, credential)
    credentials: Mutex<HashMap<Vec<u8>, (Vec<u8>, Credential)>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials_for_user(&self, user_id: &[u8]) -> Result<Vec<Credential>, StoreError> {
        let credentials = self.credentials.lock().map_err(poisoned)?;
        let mut found: Vec<Credential> = credentials
            .values()
            .filter(|(owner, _)| owner.as_slice() == user_id)
            .map(|(_, credential)| credential.clone())
            .collect();
        found.sort_by_key(|c| c.created_at);
        Ok(found)
    }

    fn credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<(Vec<u8>, Credential)>, StoreError> {
        let credentials = self.credentials.lock().map_err(poisoned)?;
        Ok(credentials.get(credential_id).cloned())
    }

    fn add_credential(&self, user_id: &[u8], credential: Credential) -> Result<(), StoreError> {
        let mut credentials = self.credentials.lock().map_err(poisoned)?;
        let key = credential.id.as_slice().to_vec();
        if credentials.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        credentials.insert(key, (user_id.to_vec(), credential));
        Ok(())
    }

    fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut credentials = self.credentials.lock().map_err(poisoned)?;
        let entry = credentials
            .get_mut(credential.id.as_slice())
            .ok_or(StoreError::NotFound)?;
        entry.1 = credential.clone();
        Ok(())
    }
}
