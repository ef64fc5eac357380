use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    HttpClient,
    client::ClientInner,
    config::{ClientConfig, ConfigLocation, read_config},
    errors::Error,
    inflight::InFlightRegistry,
    request::RequestDescriptor,
    request_context::RequestDispatchContext,
    session::{LogoutHook, SessionRefreshCoordinator, TracingLogoutHook},
    store::CredentialStore,
    types::ApiResponse,
};

const USER_AGENT: &str = concat!("exam-portal-client/", env!("CARGO_PKG_VERSION"));

impl HttpClient {
    /// Create a client whose forced logouts are only logged.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        Self::with_logout_hook(config, store, Arc::new(TracingLogoutHook))
    }

    /// Create a client
    /// # Arguments
    /// * `config` - base URL, timeout, default headers and session endpoints
    /// * `store` - where the access token, refresh token, user id and device id live
    /// * `hook` - told when the session is forcibly ended, with the message to show the user
    pub fn with_logout_hook(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        hook: Arc<dyn LogoutHook>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let http_client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;
        let inflight = Arc::new(InFlightRegistry::new());
        let session = SessionRefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&inflight),
            hook,
            config.logout_keys.clone(),
        );
        let dispatch = RequestDispatchContext::build(http_client, config, store);
        Ok(Self {
            inner: Arc::new(ClientInner {
                dispatch,
                inflight,
                session,
            }),
        })
    }

    /// Create a client from configuration stored at `location`.
    pub async fn from_location(
        location: ConfigLocation,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, Error> {
        let config = read_config(location).await?;
        Self::new(config, store)
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.dispatch.config()
    }

    pub fn session(&self) -> &SessionRefreshCoordinator {
        &self.inner.session
    }

    /// Number of distinct requests currently on the wire.
    pub fn in_flight(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Runs `descriptor` through the full pipeline. Identical requests issued
    /// while this one is outstanding share its outcome.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, Error> {
        let key = descriptor.key();
        self.inner
            .inflight
            .get_or_create(key, || self.execute(descriptor))
            .await
    }

    pub async fn get(&self, url: &str, params: Option<Value>) -> Result<ApiResponse, Error> {
        let mut descriptor = RequestDescriptor::get(url);
        if let Some(params) = params {
            descriptor = descriptor.with_params(params);
        }
        self.request(descriptor).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<ApiResponse, Error> {
        self.request(RequestDescriptor::post(url).with_body(to_body(body)?))
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<ApiResponse, Error> {
        self.request(RequestDescriptor::put(url).with_body(to_body(body)?))
            .await
    }

    pub async fn delete(&self, url: &str, params: Option<Value>) -> Result<ApiResponse, Error> {
        let mut descriptor = RequestDescriptor::delete(url);
        if let Some(params) = params {
            descriptor = descriptor.with_params(params);
        }
        self.request(descriptor).await
    }

    /// Ends the session: clears in-flight tracking and stored credentials,
    /// then notifies the logout hook with `message`.
    pub fn force_logout(&self, message: &str) {
        self.inner.session.force_logout(message);
    }

    async fn execute(&self, mut descriptor: RequestDescriptor) -> Result<ApiResponse, Error> {
        let dispatch = &self.inner.dispatch;
        let auth_failure_status = dispatch.config().auth_failure_status;
        match dispatch.send(&mut descriptor).await {
            Err(Error::Api { status, body }) if status.as_u16() == auth_failure_status => {
                // open routes never carry a bearer, so a replay could not help
                if descriptor.is_retried()
                    || dispatch.is_login(descriptor.url())
                    || dispatch.is_open_route(descriptor.url())
                    || dispatch.is_refresh(descriptor.url())
                {
                    warn!(
                        status = status.as_u16(),
                        url = descriptor.url(),
                        retried = descriptor.is_retried(),
                        "session.auth_failure.not_refreshable"
                    );
                    return Err(Error::Api { status, body });
                }

                warn!(
                    status = status.as_u16(),
                    url = descriptor.url(),
                    correlation_id = %descriptor.correlation_id(),
                    "session.auth_failure"
                );
                let stale = descriptor.bearer().map(str::to_owned);
                let token = self
                    .inner
                    .session
                    .renew(stale.as_deref(), |request| {
                        self.call_refresh_endpoint(request)
                    })
                    .await?;
                descriptor.prepare_replay(&token);
                dispatch.send(&mut descriptor).await
            }
            other => other,
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, Error> {
    serde_json::to_value(body).map_err(|e| Error::Encode(e.to_string()))
}
