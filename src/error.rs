//! Error types shared across the client layers.
//!
//! ERROR HANDLING
//! ==============
//! Each layer owns one `thiserror` enum. `ApiError` is what the HTTP context
//! produces; `CrudError` and `AuthError` wrap it with the operation that was
//! attempted so front ends can print a single human-readable line.

use crate::crud::CrudOp;

// =============================================================================
// CONFIG
// =============================================================================

/// Errors produced while reading [`crate::ClientConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The base URL is not an absolute `http(s)` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A numeric setting could not be parsed.
    #[error("config parse failed: {key}={value}")]
    Parse { key: &'static str, value: String },
}

// =============================================================================
// STORAGE
// =============================================================================

/// Errors produced by durable storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A lock guarding in-process state was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

// =============================================================================
// API
// =============================================================================

/// Errors produced by [`crate::ApiClient::request`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(String),

    /// The backend answered with a non-2xx status other than 401.
    #[error("{}", backend_display(.status, .message))]
    Backend { status: u16, message: Option<String> },

    /// The backend rejected the credential. The session has already been
    /// cleared and the invalidation event emitted by the time this is seen.
    #[error("{}", unauthorized_display(.message))]
    Unauthorized { message: Option<String> },

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The request could not be built (bad payload or header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn backend_display(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("request failed with status {status}"),
    }
}

fn unauthorized_display(message: &Option<String>) -> String {
    message.clone().unwrap_or_else(|| "session expired, please log in again".to_owned())
}

impl ApiError {
    /// HTTP status carried by the error, if the backend answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    /// The message reported by the backend, if one was present in the body.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Backend { message, .. } | Self::Unauthorized { message } => message.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Normalised failure of one CRUD operation.
///
/// Displays as `Error <verb> record: <detail>` where detail is the backend
/// message when present, else the underlying error text.
#[derive(Debug, thiserror::Error)]
#[error("Error {} {}: {detail}", .op.verb(), .op.noun())]
pub struct CrudError {
    pub op: CrudOp,
    pub detail: String,
    #[source]
    pub source: ApiError,
}

impl CrudError {
    pub(crate) fn new(op: CrudOp, source: ApiError) -> Self {
        let detail = source.backend_message().map_or_else(|| source.to_string(), ToOwned::to_owned);
        Self { op, detail, source }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.source.status() == Some(404)
    }

    #[must_use]
    pub fn is_session_invalidated(&self) -> bool {
        matches!(self.source, ApiError::Unauthorized { .. })
    }
}

// =============================================================================
// AUTH
// =============================================================================

/// Errors produced by [`crate::AuthService`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{}", .0.backend_message().unwrap_or("Error logging in"))]
    Login(ApiError),

    #[error("{}", .0.backend_message().unwrap_or("Error registering user"))]
    Register(ApiError),

    #[error("Error refreshing session: {0}")]
    Refresh(ApiError),

    #[error("Error fetching current user: {0}")]
    CurrentUser(ApiError),

    /// Refresh was requested but no refresh credential is stored.
    #[error("no refresh credential stored")]
    MissingRefreshToken,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
