//! Session persistence over durable storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The credential store is the single owner of the session. The HTTP context
//! writes the access credential through it, the auth service writes the whole
//! session on login, and the navigation guard reads presence of the access
//! credential as the only authentication signal.
//!
//! STORAGE KEYS
//! ============
//! `access_token`, `refresh_token`, `user` (JSON). Older sessions wrote the
//! access credential under `token`; it is still honoured on read and migrated
//! to `access_token` the first time it is seen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::Storage;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";
pub const LEGACY_TOKEN_KEY: &str = "token";

/// The user record returned by the backend at login.
///
/// Only `id` is required; everything the backend sends beyond the known
/// fields is kept in `extra` so the stored JSON round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    /// Display label: username when known, else the id.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.username, &self.id) {
            (Some(username), _) => username.clone(),
            (None, serde_json::Value::String(id)) => id.clone(),
            (None, other) => other.to_string(),
        }
    }
}

/// One authenticated session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persist a full session, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.set_access_token(&session.access_token)?;
        match &session.refresh_token {
            Some(token) => self.storage.set(REFRESH_TOKEN_KEY, token)?,
            None => self.storage.remove(REFRESH_TOKEN_KEY)?,
        }
        self.set_user(&session.user)
    }

    /// Load the stored session, if an access credential is present.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored user is not valid JSON.
    pub fn load_session(&self) -> Result<Option<Session>, StorageError> {
        let Some(access_token) = self.access_token()? else {
            return Ok(None);
        };
        let Some(user) = self.user()? else {
            return Ok(None);
        };
        Ok(Some(Session { access_token, refresh_token: self.refresh_token()?, user }))
    }

    /// The stored access credential. A value found only under the legacy
    /// `token` key is moved to `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        if let Some(token) = self.storage.get(ACCESS_TOKEN_KEY)? {
            return Ok(Some(token));
        }
        let Some(legacy) = self.storage.get(LEGACY_TOKEN_KEY)? else {
            return Ok(None);
        };
        tracing::debug!("migrating legacy token key to access_token");
        self.set_access_token(&legacy)?;
        Ok(Some(legacy))
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, token)?;
        self.storage.remove(LEGACY_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn clear_access_token(&self) -> Result<(), StorageError> {
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(LEGACY_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend fails or the record is corrupt.
    pub fn user(&self) -> Result<Option<UserRecord>, StorageError> {
        match self.storage.get(USER_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn set_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.storage.set(USER_KEY, &serde_json::to_string(user)?)
    }

    /// Presence of an access credential. Storage failures read as signed out.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        match self.access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "credential storage unreadable; treating as signed out");
                false
            }
        }
    }

    /// Remove every session key. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.clear_access_token()?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        self.storage.remove(USER_KEY)
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod credentials_test;
