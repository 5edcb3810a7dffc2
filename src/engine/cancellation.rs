// src/engine/cancellation.rs

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shared cancellation signal for one task invocation.
///
/// Cloned into every step; engine calls race their work against
/// [`CancellationContext::cancelled`]. Cleanup always runs under a fresh
/// context so an interrupt never prevents teardown.
#[derive(Debug, Clone, Default)]
pub struct CancellationContext {
    token: CancellationToken,
}

impl CancellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
