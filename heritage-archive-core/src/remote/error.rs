//! Remote store error types.

use thiserror::Error;

use crate::room::RoomId;

/// Failures reported by a remote document store. All are recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Transport failure, non-success on create, or an unparsable response.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The store does not know the room.
    #[error("Room not found on remote store: {0}")]
    RoomNotFound(RoomId),

    /// The store refused a full-document replace.
    #[error("Remote store rejected update to room {room}: {reason}")]
    PushRejected { room: RoomId, reason: String },
}
