//! Graceful shutdown coordination utilities.
//!
//! Provides a lightweight [`ShutdownCoordinator`] that is handed explicitly to
//! the executor, the API client and the publisher. A Ctrl+C listener (or a run
//! deadline) requests shutdown; every suspension point in the pipeline races its
//! wait against [`ShutdownCoordinator::wait_for_shutdown`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Returned when a wait was interrupted by a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("shutdown requested")]
pub struct Cancelled;

/// Coordinates graceful shutdown across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Notifies all registered waiters exactly once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        // Register interest before checking the flag so a request racing with
        // this call cannot be missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Run `fut` to completion unless shutdown is requested first.
    pub async fn run_until_shutdown<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        if self.is_shutdown_requested() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.wait_for_shutdown() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<(), Cancelled> {
        self.run_until_shutdown(tokio::time::sleep(duration)).await
    }
}
