//! Sync glue between CLI commands and the archive sync session.

pub mod auto_sync;
pub mod link_file;

pub use auto_sync::{local_store, require_synced, start_session, with_archive};
pub use link_file::{LinkError, LinkFile};
