//! User-facing notices.
//!
//! A failed add-to-cart on an authenticated session is shown to the shopper
//! immediately as a blocking notice. The UI layer supplies a [`Notifier`];
//! the default one only logs.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Receives messages that must be shown to the end user.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Logs notices at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(notice = message, "User notice");
    }
}

/// Forwards notices to an async consumer, such as a UI event loop.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver its notices arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn alert(&self, message: &str) {
        if self.tx.send(message.to_owned()).is_err() {
            tracing::debug!(notice = message, "Notice receiver dropped");
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn alert(&self, message: &str) {
        (**self).alert(message);
    }
}
