use super::*;
use crate::storage::MemoryStorage;
use serde_json::json;

fn store() -> (Arc<MemoryStorage>, CredentialStore) {
    let storage = Arc::new(MemoryStorage::new());
    let creds = CredentialStore::new(storage.clone());
    (storage, creds)
}

fn session() -> Session {
    Session {
        access_token: "T".to_owned(),
        refresh_token: Some("R".to_owned()),
        user: serde_json::from_value(json!({ "id": 1 })).unwrap(),
    }
}

#[test]
fn save_session_writes_all_keys() {
    let (storage, creds) = store();
    creds.save_session(&session()).unwrap();

    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T"));
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R"));
    let user: serde_json::Value = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(user, json!({ "id": 1 }));
    assert!(creds.is_authenticated());
}

#[test]
fn load_session_round_trips() {
    let (_, creds) = store();
    creds.save_session(&session()).unwrap();
    assert_eq!(creds.load_session().unwrap(), Some(session()));
}

#[test]
fn resaving_without_refresh_token_drops_old_one() {
    let (_, creds) = store();
    creds.save_session(&session()).unwrap();
    creds.save_session(&Session { refresh_token: None, ..session() }).unwrap();
    assert_eq!(creds.refresh_token().unwrap(), None);
}

#[test]
fn clear_is_idempotent_and_signs_out() {
    let (storage, creds) = store();
    creds.save_session(&session()).unwrap();

    creds.clear().unwrap();
    creds.clear().unwrap();

    assert!(!creds.is_authenticated());
    assert_eq!(storage.get(USER_KEY).unwrap(), None);
    assert_eq!(creds.load_session().unwrap(), None);
}

#[test]
fn legacy_token_key_is_migrated_on_read() {
    let (storage, creds) = store();
    storage.set(LEGACY_TOKEN_KEY, "OLD").unwrap();

    assert_eq!(creds.access_token().unwrap().as_deref(), Some("OLD"));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("OLD"));
    assert_eq!(storage.get(LEGACY_TOKEN_KEY).unwrap(), None);
}

#[test]
fn clear_access_token_removes_legacy_key_too() {
    let (storage, creds) = store();
    storage.set(LEGACY_TOKEN_KEY, "OLD").unwrap();
    storage.set(ACCESS_TOKEN_KEY, "NEW").unwrap();

    creds.clear_access_token().unwrap();
    assert!(!creds.is_authenticated());
}

#[test]
fn corrupt_user_record_is_an_error() {
    let (storage, creds) = store();
    storage.set(USER_KEY, "{not json").unwrap();
    assert!(creds.user().is_err());
}

#[test]
fn user_record_keeps_unknown_fields() {
    let raw = json!({ "id": "u-1", "username": "ada", "first_name": "Ada", "orcid_id": null });
    let user: UserRecord = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(user.label(), "ada");
    assert_eq!(serde_json::to_value(&user).unwrap(), raw);
}

#[test]
fn user_label_falls_back_to_id() {
    let user: UserRecord = serde_json::from_value(json!({ "id": 7 })).unwrap();
    assert_eq!(user.label(), "7");
}
