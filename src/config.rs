//! read client configuration from a file, the environment, or AWS Secrets Manager

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use serde::Deserialize;

use crate::errors::Error;

pub enum ConfigLocation {
    File(String),
    Env,
    Secret,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// Status the API answers with when the access token is invalid or expired.
    #[serde(default = "default_auth_failure_status")]
    pub auth_failure_status: u16,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// URL path fragments that are served without an Authorization header.
    #[serde(default = "default_open_routes")]
    pub open_routes: Vec<String>,
    /// Profile keys wiped from the credential store alongside the session keys.
    #[serde(default = "default_logout_keys")]
    pub logout_keys: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_auth_failure_status() -> u16 {
    409
}

fn default_refresh_path() -> String {
    "/auth/refresh-token".to_string()
}

fn default_login_path() -> String {
    "/open/login".to_string()
}

fn default_open_routes() -> Vec<String> {
    vec!["/open/".to_string()]
}

fn default_logout_keys() -> Vec<String> {
    vec!["role".into(), "userName".into(), "userEmail".into()]
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            default_headers: BTreeMap::new(),
            auth_failure_status: default_auth_failure_status(),
            refresh_path: default_refresh_path(),
            login_path: default_login_path(),
            open_routes: default_open_routes(),
            logout_keys: default_logout_keys(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth_failure_status(mut self, status: u16) -> Self {
        self.auth_failure_status = status;
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("EXAM_API_BASE_URL")
            .map_err(|_| Error::Config("Missing EXAM_API_BASE_URL env var".to_string()))?;
        let mut config = ClientConfig::new(base_url);
        if let Ok(raw) = std::env::var("EXAM_API_TIMEOUT_MS") {
            config.timeout_ms = raw
                .parse()
                .map_err(|_| Error::Config(format!("Invalid EXAM_API_TIMEOUT_MS '{raw}'")))?;
        }
        if let Ok(raw) = std::env::var("EXAM_API_AUTH_FAILURE_STATUS") {
            config.auth_failure_status = raw.parse().map_err(|_| {
                Error::Config(format!("Invalid EXAM_API_AUTH_FAILURE_STATUS '{raw}'"))
            })?;
        }
        if let Ok(path) = std::env::var("EXAM_API_REFRESH_PATH") {
            config.refresh_path = path;
        }
        if let Ok(path) = std::env::var("EXAM_API_LOGIN_PATH") {
            config.login_path = path;
        }
        Ok(config)
    }

    /// Rejects configurations that would fail on the first request.
    pub fn validate(&self) -> Result<(), Error> {
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if self.timeout_ms == 0 {
            return Err(Error::Config("Timeout must be > 0".into()));
        }
        if !(400..600).contains(&self.auth_failure_status) {
            return Err(Error::Config(format!(
                "Auth failure status {} is not an HTTP error status",
                self.auth_failure_status
            )));
        }
        Ok(())
    }
}

pub async fn read_config(loc: ConfigLocation) -> Result<ClientConfig, Error> {
    let config = match loc {
        ConfigLocation::File(path) => ClientConfig::from_file(path)?,
        ConfigLocation::Env => ClientConfig::from_env()?,
        ConfigLocation::Secret => read_config_from_secret().await?,
    };
    config.validate()?;
    Ok(config)
}

async fn read_config_from_secret() -> Result<ClientConfig, Error> {
    let secret_arn = std::env::var("EXAM_API_CONFIG_SECRET_ARN")
        .map_err(|_| Error::Config("Missing EXAM_API_CONFIG_SECRET_ARN env var".to_string()))?;
    let client = aws_sdk_secretsmanager::Client::new(
        &aws_config::load_defaults(BehaviorVersion::latest()).await,
    );
    let resp = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;
    let secret = match resp.secret_string() {
        Some(s) => Ok(s),
        None => Err(Error::Config(
            "Failed to get secret string, returned None".to_string(),
        )),
    }?;
    let config: ClientConfig = serde_json::from_str(secret)?;
    Ok(config)
}
