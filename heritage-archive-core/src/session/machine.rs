//! Pure state transitions of a sync session.
//!
//! Nothing here touches the network, timers or the archive holder. The
//! controller asks the machine whether an action may start, performs it, and
//! reports the outcome back.

use chrono::{DateTime, Utc};

use super::error::SyncError;
use super::status::{SessionStatus, SyncStatus};
use crate::remote::RemoteError;
use crate::room::{RoomId, ShareLink};
use crate::snapshot::Snapshot;

/// Result of applying a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The remote moved on; the fetched state replaces the local one.
    RemoteChanged,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SessionCore {
    link: ShareLink,
    room: Option<RoomId>,
    status: SyncStatus,
    snapshot: Option<Snapshot>,
    last_sync_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    polling: bool,
}

impl SessionCore {
    pub fn new(link: ShareLink) -> Self {
        Self {
            room: link.room(),
            link,
            status: SyncStatus::Local,
            snapshot: None,
            last_sync_time: None,
            last_error: None,
            polling: false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn link(&self) -> &ShareLink {
        &self.link
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// A network call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.polling || matches!(self.status, SyncStatus::Pushing | SyncStatus::Connecting)
    }

    /// Starts joining the room named by the link, if any.
    pub fn begin_connect(&mut self) -> Option<RoomId> {
        let room = self.room.clone()?;
        self.status = SyncStatus::Connecting;
        Some(room)
    }

    pub fn connect_succeeded(&mut self, snapshot: Snapshot, now: DateTime<Utc>) {
        self.settle(snapshot, now);
    }

    pub fn connect_failed(&mut self, error: &RemoteError) {
        self.fail(error);
    }

    pub fn begin_create(&mut self) -> Result<(), SyncError> {
        if self.room.is_some() || self.status == SyncStatus::Connecting {
            return Err(SyncError::RoomAlreadyActive);
        }
        self.status = SyncStatus::Connecting;
        self.last_error = None;
        Ok(())
    }

    /// Records the new room. `snapshot` is the state the room was created
    /// with.
    pub fn create_succeeded(&mut self, room: RoomId, snapshot: Snapshot, now: DateTime<Utc>) {
        self.link = self.link.with_room(&room);
        self.room = Some(room);
        self.settle(snapshot, now);
    }

    pub fn create_failed(&mut self, error: &RemoteError) {
        self.room = None;
        self.fail(error);
    }

    /// Whether `current` holds changes the remote has not seen.
    ///
    /// Never true before the session knows what the remote holds.
    pub fn should_push(&self, current: &Snapshot) -> bool {
        self.room.is_some()
            && self
                .snapshot
                .as_ref()
                .is_some_and(|snapshot| snapshot != current)
    }

    /// Claims the push slot. `None` while any other call is outstanding.
    pub fn begin_push(&mut self) -> Option<RoomId> {
        if self.is_busy() {
            return None;
        }
        let room = self.room.clone()?;
        self.status = SyncStatus::Pushing;
        Some(room)
    }

    pub fn push_succeeded(&mut self, snapshot: Snapshot, now: DateTime<Utc>) {
        self.settle(snapshot, now);
    }

    pub fn push_failed(&mut self, error: &RemoteError) {
        self.fail(error);
    }

    /// Claims the poll slot. Ticks that arrive while a push or connect is
    /// outstanding are skipped, not queued.
    pub fn begin_poll(&mut self) -> Option<RoomId> {
        if self.is_busy() {
            return None;
        }
        let room = self.room.clone()?;
        self.polling = true;
        Some(room)
    }

    /// Compares a fetched revision against the snapshot. `current` is the
    /// holder's revision at the time the result arrived.
    pub fn apply_poll(
        &mut self,
        fetched: Snapshot,
        current: &Snapshot,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        self.polling = false;

        if self.snapshot.as_ref() != Some(&fetched) {
            self.settle(fetched, now);
            return PollOutcome::RemoteChanged;
        }

        if self.status == SyncStatus::Error && &fetched == current {
            self.status = SyncStatus::Synced;
            self.last_error = None;
        }
        PollOutcome::Unchanged
    }

    /// A failed poll is only logged; status is left alone.
    pub fn poll_failed(&mut self) {
        self.polling = false;
    }

    /// Leaves the room and returns the link without it.
    pub fn disconnect(&mut self) -> ShareLink {
        self.link = self.link.without_room();
        self.room = None;
        self.status = SyncStatus::Local;
        self.snapshot = None;
        self.last_error = None;
        self.polling = false;
        self.link.clone()
    }

    pub fn report(&self) -> SessionStatus {
        SessionStatus {
            status: self.status,
            room_id: self.room.clone(),
            share_link: self.link.to_string(),
            last_sync_time: self.last_sync_time,
            last_error: self.last_error.clone(),
            snapshot_fingerprint: self.snapshot.as_ref().map(Snapshot::fingerprint),
        }
    }

    fn settle(&mut self, snapshot: Snapshot, now: DateTime<Utc>) {
        self.snapshot = Some(snapshot);
        self.last_sync_time = Some(now);
        self.last_error = None;
        self.status = SyncStatus::Synced;
    }

    fn fail(&mut self, error: &RemoteError) {
        self.status = SyncStatus::Error;
        self.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveState, PractitionerRecord};

    fn link(room: Option<&str>) -> ShareLink {
        let base = ShareLink::parse("http://localhost:5173/kuaishou_feiyia/").unwrap();
        match room {
            Some(room) => base.with_room(&RoomId::new(room).unwrap()),
            None => base,
        }
    }

    fn snap(names: &[&str]) -> Snapshot {
        let state = names.iter().fold(ArchiveState::default(), |s, name| {
            s.with_practitioner(PractitionerRecord::new(*name))
        });
        Snapshot::of(&state).unwrap()
    }

    fn synced_core() -> (SessionCore, Snapshot) {
        let mut core = SessionCore::new(link(Some("r1")));
        core.begin_connect().unwrap();
        let snapshot = snap(&["A"]);
        core.connect_succeeded(snapshot.clone(), Utc::now());
        (core, snapshot)
    }

    #[test]
    fn test_starts_local_without_room() {
        let mut core = SessionCore::new(link(None));
        assert_eq!(core.status(), SyncStatus::Local);
        assert!(core.begin_connect().is_none());
        assert!(core.begin_poll().is_none());
        assert!(!core.should_push(&snap(&[])));
    }

    #[test]
    fn test_connect_success_and_failure() {
        let (core, snapshot) = synced_core();
        assert_eq!(core.status(), SyncStatus::Synced);
        assert_eq!(core.snapshot(), Some(&snapshot));

        let mut core = SessionCore::new(link(Some("r1")));
        core.begin_connect().unwrap();
        core.connect_failed(&RemoteError::RemoteUnavailable("down".into()));
        assert_eq!(core.status(), SyncStatus::Error);
        assert!(core.report().last_error.unwrap().contains("down"));
        // no snapshot yet, so nothing is pushed
        assert!(!core.should_push(&snap(&["B"])));
    }

    #[test]
    fn test_create_room() {
        let mut core = SessionCore::new(link(None));
        core.begin_create().unwrap();
        assert_eq!(core.status(), SyncStatus::Connecting);
        assert_eq!(core.begin_create(), Err(SyncError::RoomAlreadyActive));

        let room = RoomId::new("r9").unwrap();
        core.create_succeeded(room.clone(), snap(&[]), Utc::now());
        assert_eq!(core.room(), Some(&room));
        assert_eq!(core.link().room(), Some(room));
        assert_eq!(core.status(), SyncStatus::Synced);
        assert_eq!(core.begin_create(), Err(SyncError::RoomAlreadyActive));
    }

    #[test]
    fn test_create_failure_leaves_room_unset() {
        let mut core = SessionCore::new(link(None));
        core.begin_create().unwrap();
        core.create_failed(&RemoteError::RemoteUnavailable("503".into()));
        assert_eq!(core.status(), SyncStatus::Error);
        assert!(core.room().is_none());
        assert!(core.begin_create().is_ok());
    }

    #[test]
    fn test_push_is_exclusive() {
        let (mut core, _) = synced_core();
        let edited = snap(&["A", "B"]);
        assert!(core.should_push(&edited));

        assert!(core.begin_push().is_some());
        assert_eq!(core.status(), SyncStatus::Pushing);
        assert!(core.begin_push().is_none());
        assert!(core.begin_poll().is_none());

        core.push_succeeded(edited.clone(), Utc::now());
        assert!(!core.should_push(&edited));
        assert!(core.begin_poll().is_some());
        assert!(core.begin_push().is_none());
    }

    #[test]
    fn test_connect_is_exclusive() {
        let mut core = SessionCore::new(link(Some("r1")));
        core.begin_connect().unwrap();
        assert!(core.is_busy());
        assert!(core.begin_poll().is_none());
        assert!(core.begin_push().is_none());

        core.connect_succeeded(snap(&["A"]), Utc::now());
        assert!(core.begin_poll().is_some());
    }

    #[test]
    fn test_poll_remote_changed() {
        let (mut core, _) = synced_core();
        core.begin_poll().unwrap();
        let remote = snap(&["C"]);
        let outcome = core.apply_poll(remote.clone(), &snap(&["A"]), Utc::now());
        assert_eq!(outcome, PollOutcome::RemoteChanged);
        assert_eq!(core.snapshot(), Some(&remote));
    }

    #[test]
    fn test_poll_unchanged_clears_error_when_in_sync() {
        let (mut core, snapshot) = synced_core();
        core.begin_push().unwrap();
        core.push_failed(&RemoteError::RemoteUnavailable("timeout".into()));
        assert_eq!(core.status(), SyncStatus::Error);

        // still holding an unpushed edit: stays in Error
        core.begin_poll().unwrap();
        let outcome = core.apply_poll(snapshot.clone(), &snap(&["A", "B"]), Utc::now());
        assert_eq!(outcome, PollOutcome::Unchanged);
        assert_eq!(core.status(), SyncStatus::Error);

        core.begin_poll().unwrap();
        core.apply_poll(snapshot.clone(), &snapshot, Utc::now());
        assert_eq!(core.status(), SyncStatus::Synced);
        assert!(core.report().last_error.is_none());
    }

    #[test]
    fn test_poll_failure_keeps_status() {
        let (mut core, _) = synced_core();
        core.begin_poll().unwrap();
        core.poll_failed();
        assert_eq!(core.status(), SyncStatus::Synced);
        assert!(!core.is_busy());
    }

    #[test]
    fn test_disconnect_resets() {
        let (mut core, _) = synced_core();
        let link = core.disconnect();
        assert!(link.room().is_none());
        assert_eq!(core.status(), SyncStatus::Local);
        assert!(core.snapshot().is_none());
        assert!(core.begin_poll().is_none());
        assert!(core.report().room_id.is_none());
    }
}
