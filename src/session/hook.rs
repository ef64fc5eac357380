use tracing::warn;

/// Receives the user-facing message when the session is forcibly ended and
/// resets the application to its entry point.
pub trait LogoutHook: Send + Sync {
    fn session_ended(&self, message: &str);
}

impl<F> LogoutHook for F
where
    F: Fn(&str) + Send + Sync,
{
    fn session_ended(&self, message: &str) {
        self(message)
    }
}

/// Default hook for headless use: the message only goes to the log.
pub struct TracingLogoutHook;

impl LogoutHook for TracingLogoutHook {
    fn session_ended(&self, message: &str) {
        warn!(message, "session.ended");
    }
}
