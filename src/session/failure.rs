use std::fmt;

use reqwest::StatusCode;

use crate::errors::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshFailureKind {
    SessionExpired,
    ServerError,
    AuthenticationFailed,
}

impl RefreshFailureKind {
    /// Text shown to the user when the session is torn down.
    pub fn message(&self) -> &'static str {
        match self {
            RefreshFailureKind::SessionExpired => "Session expired. Please log in again.",
            RefreshFailureKind::ServerError => "Server error. Please try again later.",
            RefreshFailureKind::AuthenticationFailed => {
                "Authentication failed. Please log in again."
            }
        }
    }
}

/// Why a token refresh could not produce a new access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshFailure {
    kind: RefreshFailureKind,
    status: Option<StatusCode>,
    detail: String,
}

impl RefreshFailure {
    pub fn missing_credentials() -> Self {
        Self {
            kind: RefreshFailureKind::SessionExpired,
            status: None,
            detail: "refresh token or user id not stored".into(),
        }
    }

    /// 400/401/403 mean the refresh token itself is dead, 5xx is the server's
    /// fault, everything else (including transport errors) is generic.
    pub fn classify(err: &Error) -> Self {
        let status = err.status();
        let kind = match status.map(|status| status.as_u16()) {
            Some(400 | 401 | 403) => RefreshFailureKind::SessionExpired,
            Some(code) if code >= 500 => RefreshFailureKind::ServerError,
            _ => RefreshFailureKind::AuthenticationFailed,
        };
        Self {
            kind,
            status,
            detail: err.to_string(),
        }
    }

    pub fn kind(&self) -> RefreshFailureKind {
        self.kind
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.detail)
    }
}
