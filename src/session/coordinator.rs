use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::{LogoutHook, RefreshFailure};
use crate::errors::Error;
use crate::inflight::InFlightRegistry;
use crate::store::{CredentialKey, CredentialStore};
use crate::telemetry::refresh::{RefreshOutcome, RefreshTelemetry};
use crate::types::{ApiResponse, RefreshGrant, RefreshRequest};

type Waiter = oneshot::Sender<Result<String, Error>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

struct RefreshState {
    phase: RefreshPhase,
    waiters: VecDeque<Waiter>,
    /// Telemetry of the refresh in progress; queued callers report under its attempt id.
    attempt: Option<RefreshTelemetry>,
}

enum Role {
    Refresher(RefreshTelemetry),
    Waiter(oneshot::Receiver<Result<String, Error>>),
    AlreadyRenewed(String),
}

/// Serializes access-token renewal: at most one refresh call is in flight, and
/// every request that fails authentication meanwhile waits for its result.
pub struct SessionRefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<dyn CredentialStore>,
    inflight: Arc<InFlightRegistry<ApiResponse>>,
    hook: Arc<dyn LogoutHook>,
    logout_keys: Vec<String>,
}

impl SessionRefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        inflight: Arc<InFlightRegistry<ApiResponse>>,
        hook: Arc<dyn LogoutHook>,
        logout_keys: Vec<String>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState {
                phase: RefreshPhase::Idle,
                waiters: VecDeque::new(),
                attempt: None,
            }),
            store,
            inflight,
            hook,
            logout_keys,
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        self.lock().phase
    }

    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Returns an access token newer than `stale_token`.
    ///
    /// The first caller to arrive while idle runs `refresh_cb`; callers that
    /// arrive while it runs are queued and receive its outcome. A failed
    /// refresh ends the session via [`Self::force_logout`].
    pub async fn renew<F, Fut>(&self, stale_token: Option<&str>, refresh_cb: F) -> Result<String, Error>
    where
        F: FnOnce(RefreshRequest) -> Fut,
        Fut: Future<Output = Result<RefreshGrant, Error>>,
    {
        let role = {
            let mut state = self.lock();
            match state.phase {
                RefreshPhase::Refreshing => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    if let Some(attempt) = &state.attempt {
                        attempt.emit_queued(state.waiters.len());
                    }
                    Role::Waiter(rx)
                }
                RefreshPhase::Idle => match self.store.credential(CredentialKey::AccessToken) {
                    Some(current) if stale_token != Some(current.as_str()) => {
                        Role::AlreadyRenewed(current)
                    }
                    _ => {
                        let telemetry = RefreshTelemetry::new("session.renew");
                        state.phase = RefreshPhase::Refreshing;
                        state.attempt = Some(telemetry.clone());
                        Role::Refresher(telemetry)
                    }
                },
            }
        };

        match role {
            Role::AlreadyRenewed(token) => {
                debug!(token_len = token.len(), "session.token_already_renewed");
                Ok(token)
            }
            Role::Waiter(rx) => rx.await.unwrap_or(Err(Error::Abandoned)),
            Role::Refresher(telemetry) => {
                let barrier = Barrier {
                    coordinator: self,
                    armed: true,
                };
                let outcome = self.refresh(refresh_cb, &telemetry).await;
                barrier.release(outcome.clone().map_err(Error::from));
                match outcome {
                    Ok(token) => Ok(token),
                    Err(failure) => {
                        self.force_logout(failure.message());
                        Err(Error::RefreshFailed(failure))
                    }
                }
            }
        }
    }

    /// Tears the session down: forgets in-flight requests, wipes stored
    /// credentials and hands `message` to the logout hook.
    pub fn force_logout(&self, message: &str) {
        warn!(message, "session.logout");
        self.inflight.clear();
        if let Err(err) = self.store.clear_session(&self.logout_keys) {
            error!(error = %err, "session.logout.clear_failed");
        }
        self.hook.session_ended(message);
    }

    async fn refresh<F, Fut>(
        &self,
        refresh_cb: F,
        telemetry: &RefreshTelemetry,
    ) -> Result<String, RefreshFailure>
    where
        F: FnOnce(RefreshRequest) -> Fut,
        Fut: Future<Output = Result<RefreshGrant, Error>>,
    {
        let refresh_token = self.store.credential(CredentialKey::RefreshToken);
        let user_id = self.store.credential(CredentialKey::UserId);
        let (Some(refresh_token), Some(user_id)) = (refresh_token, user_id) else {
            telemetry.emit_skipped("missing refresh token or user id");
            return Err(RefreshFailure::missing_credentials());
        };

        telemetry.emit_start(SystemTime::now());
        let result = match refresh_cb(RefreshRequest {
            refresh_token,
            user_id,
        })
        .await
        {
            Ok(grant) => self.persist(&grant).map(|()| grant),
            Err(err) => Err(err),
        };

        match result {
            Ok(grant) => {
                let outcome = if grant.refresh_token.is_some() {
                    RefreshOutcome::Rotated
                } else {
                    RefreshOutcome::Renewed
                };
                telemetry.emit_success(outcome, grant.token.len(), SystemTime::now());
                Ok(grant.token)
            }
            Err(err) => {
                let failure = RefreshFailure::classify(&err);
                telemetry.emit_failure(
                    RefreshOutcome::Failed(failure.kind()),
                    &err,
                    SystemTime::now(),
                );
                Err(failure)
            }
        }
    }

    fn persist(&self, grant: &RefreshGrant) -> Result<(), Error> {
        self.store
            .set_credential(CredentialKey::AccessToken, &grant.token)?;
        if let Some(refresh_token) = &grant.refresh_token {
            self.store
                .set_credential(CredentialKey::RefreshToken, refresh_token)?;
        }
        if let Some(user_id) = &grant.user_id {
            self.store.set_credential(CredentialKey::UserId, user_id)?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to idle once the refresher settles. If the
/// refresher is dropped first, queued waiters are released with
/// [`Error::Abandoned`].
struct Barrier<'a> {
    coordinator: &'a SessionRefreshCoordinator,
    armed: bool,
}

impl Barrier<'_> {
    fn release(mut self, outcome: Result<String, Error>) {
        self.armed = false;
        let waiters = self.open();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn open(&self) -> VecDeque<Waiter> {
        let mut state = self.coordinator.lock();
        state.phase = RefreshPhase::Idle;
        state.attempt = None;
        std::mem::take(&mut state.waiters)
    }
}

impl Drop for Barrier<'_> {
    fn drop(&mut self) {
        if self.armed {
            drop(self.open());
        }
    }
}
