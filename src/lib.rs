mod client;
pub mod config;
pub mod errors;
pub mod inflight;
pub mod payload;
pub mod request;
pub mod request_context;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;

pub use client::HttpClient;
pub use config::{ClientConfig, ConfigLocation};
pub use errors::Error;
pub use request::{RequestDescriptor, RequestKey};
pub use session::{LogoutHook, RefreshFailure, RefreshFailureKind, RefreshPhase};
pub use store::{CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::ApiResponse;

#[cfg(test)]
mod tests;
