mod coordinator;
mod failure;
mod hook;

pub use coordinator::{RefreshPhase, SessionRefreshCoordinator};
pub use failure::{RefreshFailure, RefreshFailureKind};
pub use hook::{LogoutHook, TracingLogoutHook};
