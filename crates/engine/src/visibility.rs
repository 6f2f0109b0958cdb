//! Cart panel visibility.
//!
//! Tracks whether the cart's slide-over panel is open. A successful add
//! always opens it; closing is left to the caller.

use std::sync::Arc;

use tokio::sync::watch;

/// Open/closed flag for the cart panel, observable through a watch channel.
#[derive(Debug, Clone)]
pub struct VisibilityController {
    state: Arc<watch::Sender<bool>>,
}

impl Default for VisibilityController {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityController {
    /// A controller with the panel closed.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn open(&self) {
        self.set(true);
    }

    pub fn close(&self) {
        self.set(false);
    }

    pub fn toggle(&self) {
        self.state.send_modify(|open| *open = !*open);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver notified whenever the flag changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    fn set(&self, open: bool) {
        self.state.send_if_modified(|current| {
            let changed = *current != open;
            *current = open;
            changed
        });
    }
}
