//! The single in-memory owner of the current archive.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::ArchiveState;

/// Shared handle to the current archive revision.
///
/// Every replacement notifies subscribers, whether it came from a local edit
/// or from a remote pull. The sync session tells the two apart by snapshot,
/// not by origin.
#[derive(Debug, Clone)]
pub struct ArchiveHolder {
    tx: Arc<watch::Sender<ArchiveState>>,
}

impl ArchiveHolder {
    pub fn new(initial: ArchiveState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ArchiveState {
        self.tx.borrow().clone()
    }

    /// Installs `state` as the current revision and notifies subscribers.
    pub fn replace(&self, state: ArchiveState) {
        self.tx.send_replace(state);
    }

    /// Applies an edit to the current revision.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(ArchiveState) -> ArchiveState,
    {
        self.tx.send_modify(|state| {
            let current = std::mem::take(state);
            *state = f(current);
        });
    }

    /// Applies a fallible edit. Subscribers are only notified on success.
    pub fn try_update<F, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(ArchiveState) -> Result<ArchiveState, E>,
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| match f(state.clone()) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    pub fn subscribe(&self) -> watch::Receiver<ArchiveState> {
        self.tx.subscribe()
    }
}
