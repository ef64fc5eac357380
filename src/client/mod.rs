use std::sync::Arc;

use crate::inflight::InFlightRegistry;
use crate::request_context::RequestDispatchContext;
use crate::session::SessionRefreshCoordinator;
use crate::types::ApiResponse;

mod impls;
mod refresh;

/// Request surface shared by every screen of the exam portal.
///
/// Cheap to clone; clones share the in-flight registry, the credential store
/// and the refresh coordinator.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    dispatch: RequestDispatchContext,
    inflight: Arc<InFlightRegistry<ApiResponse>>,
    session: SessionRefreshCoordinator,
}
