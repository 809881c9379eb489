//! Bearer-authenticated HTTP client context.
//!
//! ARCHITECTURE
//! ============
//! `ApiClient` is an explicit, cheaply cloneable context carrying the base
//! address, the current access credential, the credential store, and the
//! session event channel. Every service receives one; there is no global
//! header state. The wire itself sits behind the `Transport` trait so tests
//! can script backend responses.
//!
//! TRADE-OFFS
//! ==========
//! A 401 from any call ends the session: the credential and stored session
//! are cleared and `SessionEvent::Invalidated` is broadcast once. There is no
//! automatic refresh-and-retry; callers see `ApiError::Unauthorized`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::{ClientConfig, Timeouts};
use crate::credentials::CredentialStore;
use crate::error::{ApiError, StorageError};
use crate::storage::Storage;

const EVENT_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// TRANSPORT
// =============================================================================

/// One outgoing request, fully resolved against the base address.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw response: status plus undecoded body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The wire. Implementations only move bytes; status handling lives in
/// [`ApiClient`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest` client cannot be built.
    pub fn new(timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.http.request(request.method, &request.url).headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Broadcast to the application shell whenever the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend rejected the credential (HTTP 401).
    Invalidated,
    /// The user logged out explicitly.
    LoggedOut,
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    token: RwLock<Option<String>>,
    /// Set by the first 401 of a session; cleared by `set_credential`.
    invalidation_pending: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("authenticated", &self.credential().is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client over an explicit transport. The in-memory credential is
    /// seeded from the credential store.
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, credentials: CredentialStore) -> Self {
        let token = credentials.access_token().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read stored credential");
            None
        });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                credentials,
                token: RwLock::new(token),
                invalidation_pending: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Build a client talking to the backend over `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: ClientConfig, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeouts)?;
        Ok(Self::new(config, Arc::new(transport), CredentialStore::new(storage)))
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// The access credential attached to outgoing requests.
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.inner.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Attach `token` to every later request and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be written to storage.
    pub fn set_credential(&self, token: &str) -> Result<(), StorageError> {
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
        self.inner.invalidation_pending.store(false, Ordering::SeqCst);
        self.inner.credentials.set_access_token(token)
    }

    /// Drop the in-memory and stored credential. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored credential cannot be removed.
    pub fn clear_credential(&self) -> Result<(), StorageError> {
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.credentials.clear_access_token()
    }

    /// Subscribe to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine: nothing is listening for a reset.
        let _ = self.inner.events.send(event);
    }

    /// Issue `method path` against the base address with the current
    /// credential, returning the decoded JSON body (`null` when empty).
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unauthorized`] on 401, after the session was cleared.
    /// - [`ApiError::Backend`] on any other non-2xx status.
    /// - [`ApiError::Transport`] when no response was received.
    /// - [`ApiError::Decode`] when a 2xx body is not JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        params: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let bearer = self.credential();
        self.request_with_bearer(method, path, body, params, bearer.as_deref()).await
    }

    pub(crate) async fn request_with_bearer(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        params: &[(String, String)],
        bearer: Option<&str>,
    ) -> Result<Value, ApiError> {
        let sent_with = self.credential();
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let request = HttpRequest {
            method: method.clone(),
            url: self.inner.config.url_for(path),
            headers,
            query: params.to_vec(),
            body,
        };

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%method, path, error = %e, "api request failed");
                return Err(e);
            }
        };
        tracing::debug!(%method, path, status = response.status, "api response");

        let decoded = decode_body(&response.body);
        match response.status {
            200..=299 => decoded.map_err(|e| ApiError::Decode(e.to_string())),
            401 => {
                let message = decoded.ok().as_ref().and_then(error_message);
                if self.credential() == sent_with {
                    self.invalidate_session();
                } else {
                    tracing::info!(%method, path, "401 for a replaced credential; session kept");
                }
                Err(ApiError::Unauthorized { message })
            }
            status => {
                let message = decoded.ok().as_ref().and_then(error_message);
                tracing::warn!(%method, path, status, message = message.as_deref().unwrap_or(""), "backend error");
                Err(ApiError::Backend { status, message })
            }
        }
    }

    fn invalidate_session(&self) {
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.inner.credentials.clear() {
            tracing::warn!(error = %e, "failed to clear stored session after 401");
        }
        if !self.inner.invalidation_pending.swap(true, Ordering::SeqCst) {
            tracing::warn!("backend rejected credential; session invalidated");
            self.emit(SessionEvent::Invalidated);
        }
    }
}

fn decode_body(body: &str) -> Result<Value, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
}

/// Backend error text: `error`, then `message`, then `msg` (JWT layer).
fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "msg"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

#[cfg(test)]
pub(crate) mod mock;

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;
