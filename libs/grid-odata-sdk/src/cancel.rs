//! Advisory cancellation for in-flight row requests.
//!
//! Canceling never aborts the transport call. The request runs to
//! completion, its result is discarded, and no hooks fire for it.

use tokio_util::sync::CancellationToken;

/// Handle returned alongside a cancelable row request.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request canceled. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }
}
