//! Cooperative cancellation
//!
//! One [`AbortSignal`] is threaded through every phase and remote call of a
//! run. Cancelling it is observed at the next check point and races any
//! in-flight wait.

use crate::error::RemoteError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Cloneable cancellation handle
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// Fresh, not-yet-cancelled signal
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`RemoteError::Aborted`] if cancelled
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Aborted`] once [`cancel`](Self::cancel) was called.
    #[inline]
    pub fn check(&self) -> Result<(), RemoteError> {
        if self.is_aborted() {
            Err(RemoteError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Signal cancelled with this one but cancellable on its own
    #[inline]
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Run a future unless cancelled first
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Aborted`] if the signal fires before `fut`
    /// completes; `fut` is dropped in that case.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, RemoteError>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(RemoteError::Aborted),
            out = fut => Ok(out),
        }
    }
}

impl From<CancellationToken> for AbortSignal {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_state() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(signal.check().is_ok());
        clone.cancel();
        assert!(signal.is_aborted());
        assert!(matches!(signal.check(), Err(RemoteError::Aborted)));
    }

    #[test]
    fn child_follows_parent_only() {
        let parent = AbortSignal::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_aborted());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn run_races_cancellation() {
        let signal = AbortSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let out = signal
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(out, Err(RemoteError::Aborted)));
    }

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let signal = AbortSignal::new();
        assert_eq!(signal.run(async { 7 }).await.unwrap(), 7);
    }
}
