//! Cooperative cancellation for in-flight sessions.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation signal.
///
/// All clones observe the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        if !self.state.send_replace(true) {
            tracing::debug!("Cancellation requested");
        }
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the token is cancelled. Resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a
        // closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
