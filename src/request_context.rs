use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::Error;
use crate::payload::envelope;
use crate::request::RequestDescriptor;
use crate::store::{CredentialKey, CredentialStore};
use crate::types::ApiResponse;

const JSON_UTF8: &str = "application/json; charset=utf-8";
const DEVICE_ID_HEADER: &str = "deviceId";

/// Turns descriptors into wire requests and wire responses into [`ApiResponse`]s.
#[derive(Clone)]
pub struct RequestDispatchContext {
    http_client: Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn CredentialStore>,
}

impl RequestDispatchContext {
    pub fn build(http_client: Client, config: ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    /// Public routes never carry an Authorization header.
    pub fn is_open_route(&self, url: &str) -> bool {
        let path = self.path_of(url);
        self.config
            .open_routes
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }

    pub fn is_login(&self, url: &str) -> bool {
        self.path_of(url).ends_with(self.config.login_path.as_str())
    }

    pub fn is_refresh(&self, url: &str) -> bool {
        self.path_of(url).ends_with(self.config.refresh_path.as_str())
    }

    /// Sends `descriptor` once. Non-2xx statuses come back as [`Error::Api`].
    pub async fn send(&self, descriptor: &mut RequestDescriptor) -> Result<ApiResponse, Error> {
        let request = self.prepare(descriptor)?;
        debug!(
            method = %descriptor.method(),
            url = descriptor.url(),
            correlation_id = %descriptor.correlation_id(),
            retried = descriptor.is_retried(),
            "request.dispatch"
        );
        let resp = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        let raw = parse_body(&text);

        if status.is_success() {
            let body = envelope::open_response(raw)?;
            return Ok(ApiResponse {
                status,
                headers,
                body,
            });
        }

        let body = match envelope::open_response(raw.clone()) {
            Ok(body) => body,
            Err(err) => {
                warn!(status = status.as_u16(), error = %err, "response.error_body_undecodable");
                raw
            }
        };
        debug!(
            status = status.as_u16(),
            url = descriptor.url(),
            correlation_id = %descriptor.correlation_id(),
            "request.failed"
        );
        Err(Error::Api { status, body })
    }

    fn prepare(&self, descriptor: &mut RequestDescriptor) -> Result<RequestBuilder, Error> {
        let url = self.resolve_url(descriptor.url());
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.default_headers {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in descriptor.headers() {
            insert_header(&mut headers, name, value)?;
        }

        if !headers.contains_key(AUTHORIZATION)
            && !self.is_open_route(&url)
            && !self.is_refresh(&url)
            && let Some(token) = self.store.credential(CredentialKey::AccessToken)
        {
            insert_header(&mut headers, AUTHORIZATION.as_str(), &format!("Bearer {token}"))?;
        }
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);
        descriptor.record_bearer(bearer);

        if let Some(device_id) = self.store.credential(CredentialKey::DeviceId) {
            insert_header(&mut headers, DEVICE_ID_HEADER, &device_id)?;
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_UTF8));

        descriptor.seal_body()?;
        if descriptor.body().is_some_and(envelope::is_sealed) {
            headers.insert(
                HeaderName::from_static(envelope::ENCODING_HEADER),
                HeaderValue::from_static("true"),
            );
        }

        let mut request = self
            .http_client
            .request(descriptor.method().clone(), &url)
            .headers(headers);
        let query = descriptor.query_pairs();
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = descriptor.body() {
            request = request.body(serde_json::to_vec(body)?);
        }
        Ok(request)
    }

    fn path_of(&self, url: &str) -> String {
        let resolved = self.resolve_url(url);
        match Url::parse(&resolved) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => resolved,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.config.timeout())
        } else {
            err.into()
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
