//! Cancellation and deadline handle passed to every step.

use crate::error::GracefulError;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Execution context handed to a step.
///
/// Cancellation flows from parent to child only. A context with a deadline
/// reports itself as done once the deadline passes, whether or not anyone
/// cancelled it; steps are expected to observe `done()` cooperatively.
#[derive(Debug, Clone)]
pub struct StepContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl StepContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a context that expires `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`, or earlier if the parent does
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a separately cancellable context with the same deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_done(&self) -> bool {
        self.error().is_some()
    }

    /// Why the context is done, or `None` while it is still live.
    ///
    /// An expired deadline takes precedence over cancellation.
    pub fn error(&self) -> Option<GracefulError> {
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Some(GracefulError::DeadlineExceeded);
        }
        if self.token.is_cancelled() {
            return Some(GracefulError::Cancelled);
        }
        None
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Like `done`, but yields the reason
    pub async fn done_err(&self) -> GracefulError {
        self.done().await;
        self.error().unwrap_or(GracefulError::Cancelled)
    }

    /// The underlying token, for handing to code that already speaks tokio-util
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for StepContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_live() {
        let ctx = StepContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.error().is_none());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[tokio::test]
    async fn test_cancel_reports_cancelled() {
        let ctx = StepContext::background();
        ctx.cancel();
        ctx.done().await;
        assert!(matches!(ctx.error(), Some(GracefulError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_reports_exceeded() {
        let ctx = StepContext::background().with_timeout(Duration::from_millis(20));
        let started = Instant::now();
        let err = ctx.done_err().await;
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(matches!(err, GracefulError::DeadlineExceeded));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_child_inherits_cancellation_not_reverse() {
        let parent = StepContext::background();
        let child = parent.child();
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_done());
    }

    #[tokio::test]
    async fn test_child_deadline_never_exceeds_parent() {
        let parent = StepContext::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.with_timeout(Duration::from_millis(5));
        assert!(shorter.deadline() < parent.deadline());
    }
}
