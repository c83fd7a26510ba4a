use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::room::RoomId;

/// Where the session stands relative to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No room; edits stay on this device.
    Local,
    /// Joining or creating a room.
    Connecting,
    Synced,
    Pushing,
    /// The last remote call failed. Recoverable.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Local => "local",
            SyncStatus::Connecting => "connecting",
            SyncStatus::Synced => "synced",
            SyncStatus::Pushing => "pushing",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Observable summary of a sync session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub status: SyncStatus,
    pub room_id: Option<RoomId>,
    pub share_link: String,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Short hash of the last revision known to match the remote.
    pub snapshot_fingerprint: Option<String>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {}", self.status)?;
        if let Some(room) = &self.room_id {
            write!(f, "\nRoom: {}", room)?;
        }
        write!(f, "\nLink: {}", self.share_link)?;
        if let Some(time) = &self.last_sync_time {
            write!(f, "\nLast sync: {}", time.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        if let Some(error) = &self.last_error {
            write!(f, "\nLast error: {}", error)?;
        }
        Ok(())
    }
}
