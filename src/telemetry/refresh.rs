use std::time::SystemTime;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;
use crate::session::RefreshFailureKind;

#[derive(Clone, Copy, Debug)]
pub enum RefreshOutcome {
    Renewed,
    Rotated,
    Failed(RefreshFailureKind),
}

/// Structured events for one refresh attempt, correlated by `attempt_id`.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self, at: SystemTime) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            "refresh.start"
        );
    }

    pub fn emit_queued(&self, waiting: usize) {
        event!(
            Level::DEBUG,
            attempt_id = %self.attempt_id,
            context = %self.context,
            waiting,
            "refresh.queued"
        );
    }

    pub fn emit_success(&self, outcome: RefreshOutcome, token_len: usize, at: SystemTime) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            outcome = ?outcome,
            token_len,
            "refresh.success"
        );
    }

    pub fn emit_skipped(&self, reason: &str) {
        event!(
            Level::WARN,
            attempt_id = %self.attempt_id,
            context = %self.context,
            reason,
            "refresh.skipped"
        );
    }

    pub fn emit_failure(&self, outcome: RefreshOutcome, error: &Error, at: SystemTime) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = ?at,
            outcome = ?outcome,
            error = %error,
            "refresh.failure"
        );
    }
}
