use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::session::RefreshFailure;

/// Every failure surfaced by the client.
///
/// `Clone` so one outcome can be handed to every de-duplicated caller and to
/// every request queued behind a refresh.
#[derive(Debug, Clone)]
pub enum Error {
    Io(Arc<std::io::Error>),
    Json(Arc<serde_json::Error>),
    Http(Arc<reqwest::Error>),
    Timeout(Duration),
    Config(String),
    InvalidHeader(String),
    Encode(String),
    Decode { raw: String, reason: String },
    /// Non-2xx response; `body` is the decoded server payload when one was sent.
    Api { status: StatusCode, body: Value },
    Protocol(String),
    RefreshFailed(RefreshFailure),
    Abandoned,
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::RefreshFailed(failure) => failure.status(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Http(err) => write!(f, "network error: {err}"),
            Error::Timeout(after) => write!(f, "request timed out after {}ms", after.as_millis()),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            Error::Encode(msg) => write!(f, "payload encode failed: {msg}"),
            Error::Decode { raw, reason } => {
                write!(f, "payload decode failed ({reason}); raw='{raw}'")
            }
            Error::Api { status, body } => write!(f, "api error {status}: {body}"),
            Error::Protocol(msg) => write!(f, "unexpected response: {msg}"),
            Error::RefreshFailed(failure) => write!(f, "token refresh failed: {failure}"),
            Error::Abandoned => write!(f, "request abandoned before it settled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err.as_ref()),
            Error::Json(err) => Some(err.as_ref()),
            Error::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(Arc::new(err))
    }
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::RefreshFailed(failure)
    }
}
