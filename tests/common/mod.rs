#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use exam_portal_client::payload::{self, envelope};
use exam_portal_client::{ClientConfig, CredentialKey, CredentialStore, MemoryCredentialStore};
use serde_json::{Value, json};
use wiremock::Request;

pub fn config(server_uri: &str) -> ClientConfig {
    ClientConfig::new(server_uri).with_timeout(Duration::from_secs(5))
}

pub fn logged_in_store(token: &str) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store.set_credential(CredentialKey::AccessToken, token).unwrap();
    store.set_credential(CredentialKey::RefreshToken, "R1").unwrap();
    store.set_credential(CredentialKey::UserId, "7").unwrap();
    store
}

pub fn enveloped(value: &Value) -> Value {
    json!({ "encPayloadRes": payload::encode(value).unwrap() })
}

pub fn request_payload(req: &Request) -> Value {
    let body: Value = serde_json::from_slice(&req.body).expect("json body");
    payload::decode(body[envelope::REQUEST_FIELD].as_str().expect("enveloped body"))
        .expect("decodable payload")
}

pub fn header(req: &Request, name: &str) -> Option<String> {
    req.headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}
