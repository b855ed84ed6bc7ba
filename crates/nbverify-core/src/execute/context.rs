//! Run-wide cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Handle for interrupting a batch run.
///
/// `AbortHandle` can be cloned and shared across tasks; any clone can trigger
/// the abort and every other clone observes it.
///
/// # Example
///
/// ```
/// use nbverify_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
/// handle_clone.abort();
/// assert!(handle.is_aborted());
/// ```
#[derive(Clone, Default)]
pub struct AbortHandle {
    /// Shared abort flag.
    aborted: Arc<AtomicBool>,
    /// Wakes tasks waiting in [`AbortHandle::aborted`].
    notify: Arc<Notify>,
}

impl AbortHandle {
    /// Create a new abort handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request abort of the run.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Wait until abort has been requested.
    pub async fn aborted(&self) {
        loop {
            // Register before checking the flag so a concurrent abort() is not missed.
            let notified = self.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_aborted_resolves_after_abort() {
        let handle = AbortHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.aborted().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_aborted_returns_immediately_when_already_set() {
        let handle = AbortHandle::new();
        handle.abort();
        tokio::time::timeout(Duration::from_secs(1), handle.aborted())
            .await
            .expect("already aborted");
    }
}
