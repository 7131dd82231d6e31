use crate::session::{Identity, Session, SessionRegistry};
use crate::utils::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Result of a gated operation
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome<T> {
    Allowed(T),
    /// No active session; the operation was not run
    Denied,
}

/// Runs operations only for identities with an active session and refreshes
/// the session's activity afterwards.
#[derive(Clone)]
pub struct LoginGate {
    registry: Arc<SessionRegistry>,
}

impl LoginGate {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Looks up the identity's session and hands it to `op`.
    ///
    /// The session is touched after `op` returns, whatever it returned. A
    /// store failure on lookup is returned and `op` is not run.
    pub async fn run<T, F, Fut>(&self, identity: &Identity, op: F) -> Result<GateOutcome<T>>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(session) = self.registry.current(identity).await? else {
            debug!(identity = %identity, "Denied: no active session");
            return Ok(GateOutcome::Denied);
        };

        let output = op(session).await;
        self.registry.touch(identity).await;
        Ok(GateOutcome::Allowed(output))
    }
}
