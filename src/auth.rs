//! Login, registration, and session refresh against `auth/*`.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login is the only place a session is created: the returned credentials
//! and user record are written to the credential store and the access
//! credential is attached to the shared client context. Logout is local;
//! the backend keeps no server-side session to end.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::{Session, UserRecord};
use crate::error::{ApiError, AuthError};
use crate::http::{ApiClient, SessionEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: UserRecord,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct MeResponse {
    user: UserRecord,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Exchange username/password for a session and make it current.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Login`] with the backend message when present.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, AuthError> {
        let body = serde_json::to_value(credentials).map_err(|e| AuthError::Login(ApiError::InvalidRequest(e.to_string())))?;
        let response = self
            .client
            .request(Method::POST, "auth/login", Some(body), &[])
            .await
            .map_err(AuthError::Login)?;
        let response: LoginResponse = decode(response).map_err(AuthError::Login)?;

        let session = Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: response.user,
        };
        self.client.credentials().save_session(&session)?;
        self.client.set_credential(&session.access_token)?;
        tracing::info!(user = %session.user.label(), "logged in");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Register`] with the backend message when present.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, AuthError> {
        let body = serde_json::to_value(request).map_err(|e| AuthError::Register(ApiError::InvalidRequest(e.to_string())))?;
        let response = self
            .client
            .request(Method::POST, "auth/register", Some(body), &[])
            .await
            .map_err(AuthError::Register)?;
        decode(response).map_err(AuthError::Register)
    }

    /// Trade the stored refresh credential for a new access credential.
    /// Only ever called explicitly; failed requests are never retried with it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRefreshToken`] without a stored refresh
    /// credential, or [`AuthError::Refresh`] if the backend refuses it.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let refresh_token = self.client.credentials().refresh_token()?.ok_or(AuthError::MissingRefreshToken)?;
        let response = self
            .client
            .request_with_bearer(Method::POST, "auth/refresh", None, &[], Some(&refresh_token))
            .await
            .map_err(AuthError::Refresh)?;
        let response: RefreshResponse = decode(response).map_err(AuthError::Refresh)?;
        self.client.set_credential(&response.access_token)?;
        tracing::info!("access credential refreshed");
        Ok(response.access_token)
    }

    /// The user the backend associates with the current credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CurrentUser`] on any request failure.
    pub async fn current_user(&self) -> Result<UserRecord, AuthError> {
        let response = self
            .client
            .request(Method::GET, "auth/me", None, &[])
            .await
            .map_err(AuthError::CurrentUser)?;
        let response: MeResponse = decode(response).map_err(AuthError::CurrentUser)?;
        Ok(response.user)
    }

    /// End the session locally. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        let was_authenticated = self.is_authenticated();
        self.client.clear_credential()?;
        self.client.credentials().clear()?;
        if was_authenticated {
            tracing::info!("logged out");
            self.client.emit(SessionEvent::LoggedOut);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.client.credentials().is_authenticated()
    }

    /// # Errors
    ///
    /// Returns an error if storage fails or the stored record is corrupt.
    pub fn stored_user(&self) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.client.credentials().user()?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;
