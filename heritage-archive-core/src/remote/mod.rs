//! Remote document store access.
//!
//! The remote is an opaque key → JSON document service with three
//! operations. Every call transfers the whole archive; there are no partial
//! updates.
//!
//! ## HTTP mapping
//!
//! - `POST <base>` with the archive as body creates a room and answers
//!   `{ "id": ... }`
//! - `GET <base>/<id>` returns the current document
//! - `PUT <base>/<id>` replaces it

mod error;
mod http;
mod memory;

use futures::future::BoxFuture;

use crate::models::ArchiveState;
use crate::room::RoomId;

pub use error::RemoteError;
pub use http::{HttpRemote, DEFAULT_TIMEOUT};
pub use memory::{CallCounts, MemoryRemote};

/// A remote store of whole-archive documents keyed by room.
pub trait RemoteStore: Send + Sync {
    /// Provisions a new room holding `state` and returns its identifier.
    fn create<'a>(&'a self, state: &'a ArchiveState) -> BoxFuture<'a, Result<RoomId, RemoteError>>;

    fn fetch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<ArchiveState, RemoteError>>;

    /// Overwrites the room's document. Replacing with the same state twice
    /// leaves the document unchanged.
    fn replace<'a>(
        &'a self,
        room: &'a RoomId,
        state: &'a ArchiveState,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;
}
