//! Sync session: keeps the archive holder, the local store and a remote room
//! converged.
//!
//! Conflicts are resolved by whole-document last-writer-wins. Echoes of the
//! session's own pushes are recognised by comparing canonical snapshots, so
//! a pulled revision never triggers a push back.

mod controller;
mod error;
mod machine;
mod status;

pub use controller::{
    SessionConfig, SessionHandle, SyncSession, DEFAULT_DEBOUNCE, DEFAULT_POLL_INTERVAL,
};
pub use error::SyncError;
pub use machine::{PollOutcome, SessionCore};
pub use status::{SessionStatus, SyncStatus};
