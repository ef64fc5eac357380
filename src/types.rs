use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Error;

/// A settled 2xx response with its payload envelope already opened.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Decoded body of the token refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<RefreshData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The API has sent this both as a string and as a number.
    #[serde(default)]
    pub user_id: Option<Value>,
}

/// Credentials granted by a successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
}

impl TryFrom<RefreshResponse> for RefreshGrant {
    type Error = Error;

    fn try_from(resp: RefreshResponse) -> Result<Self, Self::Error> {
        if !resp.success {
            return Err(Error::Protocol(format!(
                "refresh rejected: {}",
                resp.message.as_deref().unwrap_or("no message")
            )));
        }
        let data = resp
            .data
            .ok_or_else(|| Error::Protocol("refresh response missing data".into()))?;
        let token = data
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Protocol("refresh response missing token".into()))?;
        let user_id = match data.user_id {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        Ok(RefreshGrant {
            token,
            refresh_token: data.refresh_token.filter(|token| !token.is_empty()),
            user_id,
        })
    }
}

/// What the refresher sends to the refresh endpoint.
#[derive(Clone, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grant(body: Value) -> Result<RefreshGrant, Error> {
        let resp: RefreshResponse = serde_json::from_value(body).unwrap();
        RefreshGrant::try_from(resp)
    }

    #[test]
    fn grant_without_rotation_keeps_optional_fields_empty() {
        let grant = grant(json!({"success": true, "data": {"token": "T2"}})).unwrap();
        assert_eq!(grant.token, "T2");
        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.user_id, None);
    }

    #[test]
    fn numeric_user_id_is_stored_as_text() {
        let grant = grant(json!({
            "success": true,
            "data": {"token": "T2", "refreshToken": "R2", "userId": 17}
        }))
        .unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("R2"));
        assert_eq!(grant.user_id.as_deref(), Some("17"));
    }

    #[test]
    fn unsuccessful_or_tokenless_responses_are_protocol_errors() {
        assert!(matches!(
            grant(json!({"success": false, "message": "expired"})),
            Err(Error::Protocol(msg)) if msg.contains("expired")
        ));
        assert!(matches!(
            grant(json!({"success": true, "data": {"refreshToken": "R2"}})),
            Err(Error::Protocol(_))
        ));
    }
}
