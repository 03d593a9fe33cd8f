//! Cancellation utilities
//!
//! A first-class cancellation handle shared by poll loops and stream
//! pipelines. When the caller disconnects, cancelling the handle aborts
//! in-flight polls at the next loop iteration and wakes any sleep in
//! progress.

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Poll loops observe this at the top of every
    /// iteration, not only before sleeping.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A child handle that is cancelled when this one is, but can also be
    /// cancelled independently.
    pub fn child(&self) -> CancelHandle {
        Self {
            token: self.token.child_token(),
        }
    }
}
