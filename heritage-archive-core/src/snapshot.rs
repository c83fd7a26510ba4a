//! Canonical serialization of an archive revision.
//!
//! Two archives are "the same document" exactly when their snapshots are
//! equal. The sync session keeps one snapshot of the last revision known to
//! match the remote and gates every push and pull decision on it.

use sha2::{Digest, Sha256};

use crate::models::ArchiveState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn of(state: &ArchiveState) -> Result<Self, serde_json::Error> {
        state.canonical_json().map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short content hash for logs and status output.
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        hash[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}
