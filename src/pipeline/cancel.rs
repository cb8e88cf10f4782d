//! Cooperative cancellation for in-flight requests.
//!
//! [`cancel_pair`] hands out a [`CancelHandle`] (kept by the caller) and a
//! [`CancelToken`] (passed into the orchestrator).  Cancellation is
//! observed at stage boundaries and across `.await` points; a stage already
//! running on the blocking pool finishes its current computation before the
//! token is consulted again.

use tokio::sync::watch;

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

// ---------------------------------------------------------------------------
// CancelHandle
// ---------------------------------------------------------------------------

/// Caller-side trigger.  Cancelling is idempotent.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receivers may already be gone if the request finished first.
        let _ = self.tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Orchestrator-side observer.  Cloneable so each stage can hold its own.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// `None` for the never-cancelled token.
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never fires, for callers without a cancellation path.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve when cancellation fires; pend forever on a never-token or
    /// when the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        match self.rx.clone() {
            None => std::future::pending().await,
            Some(mut rx) => {
                if *rx.borrow() {
                    return;
                }
                loop {
                    if rx.changed().await.is_err() {
                        // Handle dropped without cancelling: stay pending so
                        // select! arms fall through to the work branch.
                        std::future::pending::<()>().await;
                    }
                    if *rx.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
