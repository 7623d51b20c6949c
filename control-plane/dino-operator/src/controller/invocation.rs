use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ReconcileError;

/// Per-reconcile cancellation scope. The core checks it before every store
/// call so an aborted pass leaves the store exactly as of the last
/// successful write.
#[derive(Clone, Debug)]
pub struct Invocation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Invocation {
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// No deadline and nobody holding the token.
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `Err(Cancelled)` once the token fired or the deadline passed.
    pub fn checkpoint(&self, before: &'static str) -> Result<(), ReconcileError> {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        if self.token.is_cancelled() || expired {
            return Err(ReconcileError::Cancelled(before));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn unbounded_invocation_passes_checkpoints() {
        let inv = Invocation::unbounded();
        assert!(inv.checkpoint("anything").is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn cancelled_token_fails_checkpoint() {
        let parent = CancellationToken::new();
        let inv = Invocation::new(parent.child_token(), None);
        parent.cancel();
        assert!(matches!(
            inv.checkpoint("get bird"),
            Err(ReconcileError::Cancelled("get bird"))
        ));
        assert!(inv.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let inv = Invocation::new(
            CancellationToken::new(),
            Some(Duration::from_secs(5)),
        );
        assert!(inv.checkpoint("early").is_ok());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(inv.checkpoint("late").is_err());
    }
}
