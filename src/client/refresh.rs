use serde_json::json;
use tracing::info;

use crate::client::HttpClient;
use crate::errors::Error;
use crate::request::RequestDescriptor;
use crate::types::{RefreshGrant, RefreshRequest, RefreshResponse};

impl HttpClient {
    /// Calls the refresh endpoint directly, outside the in-flight registry and
    /// without an Authorization header.
    pub(super) async fn call_refresh_endpoint(
        &self,
        request: RefreshRequest,
    ) -> Result<RefreshGrant, Error> {
        let dispatch = &self.inner.dispatch;
        let mut descriptor = RequestDescriptor::post(dispatch.config().refresh_path.clone())
            .with_body(json!({
                "refreshToken": request.refresh_token,
                "userId": request.user_id,
            }));
        let resp = dispatch.send(&mut descriptor).await?;
        let body: RefreshResponse = resp.json()?;
        let grant = RefreshGrant::try_from(body)?;
        info!(
            token_len = grant.token.len(),
            rotated = grant.refresh_token.is_some(),
            "refresh endpoint issued token"
        );
        Ok(grant)
    }
}
