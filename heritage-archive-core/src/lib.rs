//! Heritage Archive Core Library
//!
//! Practitioner archive model, local persistence and the sync session that
//! shares an archive through a remote room.

pub mod holder;
pub mod local_store;
pub mod models;
pub mod remote;
pub mod room;
pub mod session;
pub mod snapshot;

pub use holder::ArchiveHolder;
pub use local_store::{
    load_or_seed, FileStore, LocalStore, MemoryStore, PendingWrite, StorageError, ARCHIVE_KEY,
};
pub use models::{
    ArchiveState, Bio, ModelError, PractitionerDraft, PractitionerRecord, SiteConfig, WorkRecord,
};
pub use remote::{HttpRemote, MemoryRemote, RemoteError, RemoteStore};
pub use room::{RoomError, RoomId, ShareLink};
pub use session::{
    SessionConfig, SessionHandle, SessionStatus, SyncError, SyncSession, SyncStatus,
};
pub use snapshot::Snapshot;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
