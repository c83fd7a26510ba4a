mod archive;
mod practitioner;
mod site_config;
mod work;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use archive::ArchiveState;
pub use practitioner::{Bio, PractitionerDraft, PractitionerRecord};
pub use site_config::SiteConfig;
pub use work::{WorkRecord, UNTITLED_WORK};

/// Errors raised when an edit violates a record invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Practitioner name must not be blank")]
    BlankName,

    #[error("Practitioner not found: {0}")]
    PractitionerNotFound(String),

    #[error("Work not found: {0}")]
    WorkNotFound(String),

    #[error("'{0}' must keep at least one representative work")]
    LastWork(String),
}

/// Current time truncated to the millisecond precision of the wire format,
/// so values compare equal after a JSON round trip.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
