use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use super::RequestKey;
use crate::errors::Error;
use crate::payload::envelope;

/// One call through the client: what to send and how far it has progressed.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    body: Option<Value>,
    params: Option<Value>,
    headers: BTreeMap<String, String>,
    encoded: bool,
    retried: bool,
    bearer: Option<String>,
    correlation_id: Uuid,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            params: None,
            headers: BTreeMap::new(),
            encoded: false,
            retried: false,
            bearer: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sends the body exactly as given, without the payload envelope.
    pub fn skip_encoding(mut self) -> Self {
        self.encoded = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::derive(
            &self.method,
            &self.url,
            self.body.as_ref(),
            self.params.as_ref(),
        )
    }

    /// Query parameters flattened to string pairs; nested values are sent as JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match &self.params {
            Some(Value::Object(fields)) => fields
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Access token the last dispatch was authorized with.
    pub(crate) fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub(crate) fn record_bearer(&mut self, bearer: Option<String>) {
        self.bearer = bearer;
    }

    /// Brings the body into envelope form once; later calls are no-ops.
    pub(crate) fn seal_body(&mut self) -> Result<(), Error> {
        if self.body.is_none() && matches!(self.method, Method::GET | Method::DELETE) {
            self.body = Some(Value::Object(Default::default()));
        }
        if self.encoded {
            return Ok(());
        }
        if let Some(body) = &self.body
            && !envelope::is_sealed(body)
        {
            self.body = Some(envelope::seal(body)?);
        }
        self.encoded = true;
        Ok(())
    }

    /// Consumes the one retry a request is allowed, authorizing it with `token`.
    pub(crate) fn prepare_replay(&mut self, token: &str) {
        self.retried = true;
        self.encoded = true;
        self.headers
            .insert("authorization".to_string(), format!("Bearer {token}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_without_body_gets_encoded_empty_object() {
        let mut descriptor = RequestDescriptor::get("/exams/active");
        descriptor.seal_body().unwrap();
        let body = descriptor.body().unwrap();
        assert!(envelope::is_sealed(body));
        let inner = crate::payload::decode(body[envelope::REQUEST_FIELD].as_str().unwrap()).unwrap();
        assert_eq!(inner, json!({}));
    }

    #[test]
    fn post_without_body_stays_empty() {
        let mut descriptor = RequestDescriptor::post("/auth/logout");
        descriptor.seal_body().unwrap();
        assert!(descriptor.body().is_none());
        assert!(descriptor.is_encoded());
    }

    #[test]
    fn sealing_twice_does_not_double_encode() {
        let mut descriptor = RequestDescriptor::post("/exams").with_body(json!({"title": "Física"}));
        descriptor.seal_body().unwrap();
        let first = descriptor.body().cloned();
        descriptor.seal_body().unwrap();
        assert_eq!(descriptor.body().cloned(), first);
    }

    #[test]
    fn pre_sealed_body_is_left_alone() {
        let body = json!({"encPayload": "e30="});
        let mut descriptor = RequestDescriptor::post("/exams").with_body(body.clone());
        descriptor.seal_body().unwrap();
        assert_eq!(descriptor.body(), Some(&body));
    }

    #[test]
    fn skip_encoding_sends_raw_body() {
        let body = json!({"plain": true});
        let mut descriptor = RequestDescriptor::post("/upload")
            .with_body(body.clone())
            .skip_encoding();
        descriptor.seal_body().unwrap();
        assert_eq!(descriptor.body(), Some(&body));
    }

    #[test]
    fn replay_marks_retry_and_sets_bearer() {
        let mut descriptor = RequestDescriptor::get("/exams");
        assert!(!descriptor.is_retried());
        descriptor.prepare_replay("T2");
        assert!(descriptor.is_retried());
        assert_eq!(descriptor.headers()["authorization"], "Bearer T2");
    }

    #[test]
    fn query_pairs_flatten_scalars() {
        let descriptor = RequestDescriptor::get("/exams")
            .with_params(json!({"page": 2, "status": "active", "archived": false, "skip": null}));
        assert_eq!(
            descriptor.query_pairs(),
            vec![
                ("archived".to_string(), "false".to_string()),
                ("page".to_string(), "2".to_string()),
                ("status".to_string(), "active".to_string()),
            ]
        );
    }
}
