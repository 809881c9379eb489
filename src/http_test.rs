use super::mock::{MockTransport, bearer_of, client_with};
use super::*;
use crate::credentials::{ACCESS_TOKEN_KEY, USER_KEY};
use serde_json::json;

#[tokio::test]
async fn request_joins_base_url_and_passes_query() {
    let transport = MockTransport::new();
    transport.respond(200, json!([]));
    let (client, _) = client_with(transport.clone());

    let params = vec![("search".to_owned(), "ec".to_owned())];
    let body = client.request(Method::GET, "countries", None, &params).await.unwrap();

    assert_eq!(body, json!([]));
    let sent = transport.last_request();
    assert_eq!(sent.url, "http://backend.test/api/countries");
    assert_eq!(sent.query, params);
    assert_eq!(bearer_of(&sent), None);
}

#[tokio::test]
async fn set_credential_attaches_bearer_and_persists() {
    let transport = MockTransport::new();
    let (client, storage) = client_with(transport.clone());

    client.set_credential("T").unwrap();
    client.request(Method::GET, "keywords", None, &[]).await.unwrap();

    assert_eq!(bearer_of(&transport.last_request()).as_deref(), Some("Bearer T"));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T"));
}

#[tokio::test]
async fn clear_credential_removes_header_and_is_idempotent() {
    let transport = MockTransport::new();
    let (client, storage) = client_with(transport.clone());

    client.set_credential("T").unwrap();
    client.clear_credential().unwrap();
    client.clear_credential().unwrap();
    client.request(Method::GET, "keywords", None, &[]).await.unwrap();

    assert_eq!(bearer_of(&transport.last_request()), None);
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn stored_credential_seeds_new_client() {
    let transport = MockTransport::new();
    let storage = Arc::new(crate::storage::MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "S").unwrap();
    let client = ApiClient::new(
        ClientConfig::new(super::mock::TEST_BASE_URL).unwrap(),
        transport.clone(),
        CredentialStore::new(storage),
    );

    client.request(Method::GET, "countries", None, &[]).await.unwrap();
    assert_eq!(bearer_of(&transport.last_request()).as_deref(), Some("Bearer S"));
}

#[tokio::test]
async fn unauthorized_clears_session_and_emits_once() {
    let transport = MockTransport::new();
    transport.respond(401, json!({ "msg": "Token has expired" }));
    transport.respond(401, json!({ "msg": "Token has expired" }));
    let (client, storage) = client_with(transport.clone());
    storage.set(USER_KEY, r#"{"id":1}"#).unwrap();
    storage.set("refresh_token", "R").unwrap();
    client.set_credential("T").unwrap();
    let mut events = client.subscribe();

    let first = client.request(Method::GET, "countries", None, &[]).await.unwrap_err();
    let second = client.request(Method::GET, "countries", None, &[]).await.unwrap_err();

    assert!(matches!(first, ApiError::Unauthorized { .. }));
    assert_eq!(first.to_string(), "Token has expired");
    assert!(matches!(second, ApiError::Unauthorized { .. }));
    assert_eq!(client.credential(), None);
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(USER_KEY).unwrap(), None);
    assert_eq!(storage.get("refresh_token").unwrap(), None);

    assert_eq!(events.try_recv().unwrap(), SessionEvent::Invalidated);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn new_credential_rearms_invalidation() {
    let transport = MockTransport::new();
    transport.respond(401, Value::Null);
    transport.respond(401, Value::Null);
    let (client, _) = client_with(transport.clone());
    let mut events = client.subscribe();

    client.set_credential("A").unwrap();
    let _ = client.request(Method::GET, "countries", None, &[]).await;
    client.set_credential("B").unwrap();
    let _ = client.request(Method::GET, "countries", None, &[]).await;

    assert_eq!(events.try_recv().unwrap(), SessionEvent::Invalidated);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Invalidated);
}

#[tokio::test]
async fn backend_error_prefers_error_then_message_field() {
    let transport = MockTransport::new();
    transport.respond(400, json!({ "error": "Campo name es obligatorio", "message": "ignored" }));
    transport.respond(409, json!({ "message": "duplicate" }));
    transport.respond_raw(500, "<html>boom</html>");
    let (client, _) = client_with(transport.clone());

    let e1 = client.request(Method::POST, "keywords", Some(json!({})), &[]).await.unwrap_err();
    let e2 = client.request(Method::POST, "keywords", Some(json!({})), &[]).await.unwrap_err();
    let e3 = client.request(Method::POST, "keywords", Some(json!({})), &[]).await.unwrap_err();

    assert_eq!(e1.backend_message(), Some("Campo name es obligatorio"));
    assert_eq!(e1.status(), Some(400));
    assert_eq!(e2.backend_message(), Some("duplicate"));
    assert_eq!(e3.backend_message(), None);
    assert_eq!(e3.to_string(), "request failed with status 500");
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn transport_failure_is_surfaced_without_touching_session() {
    let transport = MockTransport::new();
    transport.fail("connection refused");
    let (client, _) = client_with(transport.clone());
    client.set_credential("T").unwrap();

    let err = client.request(Method::GET, "countries", None, &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.to_string(), "connection refused");
    assert_eq!(client.credential().as_deref(), Some("T"));
}

#[tokio::test]
async fn empty_success_body_decodes_as_null() {
    let transport = MockTransport::new();
    transport.respond_raw(204, "");
    let (client, _) = client_with(transport);
    let body = client.request(Method::DELETE, "countries/x", None, &[]).await.unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn non_json_success_body_is_decode_error() {
    let transport = MockTransport::new();
    transport.respond_raw(200, "ok");
    let (client, _) = client_with(transport);
    let err = client.request(Method::GET, "countries", None, &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

/// Signs in again with "B" while the request made with the old credential
/// is in flight, then rejects that old request.
#[derive(Default)]
struct ReloginMidFlight {
    client: std::sync::OnceLock<ApiClient>,
}

#[async_trait::async_trait]
impl Transport for ReloginMidFlight {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Some(client) = self.client.get() {
            client.set_credential("B").unwrap();
        }
        Ok(HttpResponse { status: 401, body: r#"{"msg":"Token has expired"}"#.to_owned() })
    }
}

#[tokio::test]
async fn late_unauthorized_keeps_newer_session() {
    let transport = std::sync::Arc::new(ReloginMidFlight::default());
    let (client, storage) = client_with(transport.clone());
    client.set_credential("A").unwrap();
    assert!(transport.client.set(client.clone()).is_ok());
    let mut events = client.subscribe();

    let err = client.request(Method::GET, "countries", None, &[]).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(client.credential().as_deref(), Some("B"));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("B"));
    assert!(events.try_recv().is_err());
}
