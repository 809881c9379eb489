//! Test transports: a scripted queue and an in-memory backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde_json::{Value, json};

use super::{ApiClient, HttpRequest, HttpResponse, Transport};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::storage::MemoryStorage;

pub(crate) const TEST_BASE_URL: &str = "http://backend.test/api";

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, status: u16, body: Value) {
        let body = if body.is_null() { String::new() } else { body.to_string() };
        self.responses.lock().unwrap().push_back(Ok(HttpResponse { status, body }));
    }

    pub(crate) fn respond_raw(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse { status, body: body.to_owned() }));
    }

    pub(crate) fn fail(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(ApiError::Transport(message.to_owned())));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request was sent")
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse { status: 200, body: "null".to_owned() }))
    }
}

/// Bearer header value of a recorded request.
pub(crate) fn bearer_of(request: &HttpRequest) -> Option<String> {
    request.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(ToOwned::to_owned)
}

/// Minimal in-memory stand-in for the REST backend: every collection answers
/// with the same envelopes the real one uses (`{data, total, pages,
/// current_page}` for lists, `{message, data}` for writes, bare records for
/// reads, `{error}` on failure).
#[derive(Default)]
pub(crate) struct FakeBackend {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    next_id: Mutex<u64>,
    pub(crate) seen: Mutex<Vec<HttpRequest>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn handle(&self, request: &HttpRequest) -> (u16, Value) {
        let path = request.url.strip_prefix(TEST_BASE_URL).unwrap_or(&request.url);
        let mut segments = path.trim_matches('/').splitn(2, '/');
        let collection = segments.next().unwrap_or_default().to_owned();
        let id = segments.next().map(ToOwned::to_owned);

        let mut collections = self.collections.lock().unwrap();
        let records = collections.entry(collection).or_default();

        match (&request.method, id) {
            (m, None) if *m == Method::GET => {
                let data: Vec<Value> = records.values().cloned().collect();
                let total = data.len();
                (200, json!({ "data": data, "total": total, "pages": 1, "current_page": 1 }))
            }
            (m, None) if *m == Method::POST => {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                let id = format!("id-{next}");
                let mut record = request.body.clone().unwrap_or_else(|| json!({}));
                record["id"] = json!(id);
                record["is_active"] = json!(true);
                records.insert(id, record.clone());
                (201, json!({ "message": "created", "data": record }))
            }
            (m, Some(id)) if *m == Method::GET => match records.get(&id) {
                Some(record) => (200, record.clone()),
                None => (404, json!({ "error": "404 Not Found" })),
            },
            (m, Some(id)) if *m == Method::PUT => {
                let Some(record) = records.get_mut(&id) else {
                    return (400, json!({ "error": "404 Not Found" }));
                };
                if let (Some(target), Some(Value::Object(patch))) = (record.as_object_mut(), request.body.clone()) {
                    for (key, value) in patch {
                        target.insert(key, value);
                    }
                }
                (200, json!({ "message": "updated", "data": record.clone() }))
            }
            (m, Some(id)) if *m == Method::DELETE => match records.remove(&id) {
                Some(_) => (200, json!({ "message": "deleted" })),
                None => (400, json!({ "error": "404 Not Found" })),
            },
            _ => (405, json!({ "error": "method not allowed" })),
        }
    }
}

#[async_trait::async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let (status, body) = self.handle(&request);
        self.seen.lock().unwrap().push(request);
        Ok(HttpResponse { status, body: body.to_string() })
    }
}

/// Client over `transport` with fresh in-memory storage.
pub(crate) fn client_with(transport: Arc<dyn Transport>) -> (ApiClient, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let config = ClientConfig::new(TEST_BASE_URL).unwrap();
    let client = ApiClient::new(config, transport, CredentialStore::new(storage.clone()));
    (client, storage)
}
