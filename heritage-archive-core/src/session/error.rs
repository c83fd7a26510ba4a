use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced to callers of a sync session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Sync is not configured. Set sync.server_url in the config file.")]
    NotConfigured,

    #[error("A room is already active or being set up")]
    RoomAlreadyActive,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Sync session has stopped")]
    SessionClosed,

    #[error("Room creation was cancelled by a disconnect")]
    Cancelled,
}
