//! Sync session behaviour against an in-memory remote, on paused time.

use std::sync::Arc;
use std::time::Duration;

use heritage_archive_core::{
    ArchiveHolder, ArchiveState, LocalStore, MemoryRemote, MemoryStore, PendingWrite,
    PractitionerRecord, RemoteStore, RoomId, SessionConfig, SessionHandle, ShareLink, SiteConfig,
    SyncError, SyncSession, SyncStatus,
};

struct Harness {
    holder: ArchiveHolder,
    local: Arc<MemoryStore>,
    remote: Arc<MemoryRemote>,
    handle: SessionHandle,
}

fn base_link() -> ShareLink {
    ShareLink::parse("http://localhost:5173/kuaishou_feiyia/").unwrap()
}

fn start(remote: Arc<MemoryRemote>, link: ShareLink) -> Harness {
    start_with(remote, Arc::new(MemoryStore::new()), link)
}

/// Starts a session over an existing local store, as a restarted client.
fn start_with(remote: Arc<MemoryRemote>, local: Arc<MemoryStore>, link: ShareLink) -> Harness {
    let holder = ArchiveHolder::new(ArchiveState::default());
    let handle = SyncSession::start(
        holder.clone(),
        local.clone() as Arc<dyn LocalStore>,
        remote.clone() as Arc<dyn RemoteStore>,
        link,
        SessionConfig::default(),
    );
    Harness {
        holder,
        local,
        remote,
        handle,
    }
}

/// Creates a room directly on the remote, as another client would have.
async fn existing_room(remote: &MemoryRemote, state: &ArchiveState) -> RoomId {
    remote.create(state).await.unwrap()
}

async fn joined(state: &ArchiveState) -> (Harness, RoomId) {
    let remote = Arc::new(MemoryRemote::new());
    let room = existing_room(&remote, state).await;
    let harness = start(remote, base_link().with_room(&room));
    advance(10).await;
    assert_eq!(harness.handle.status().status, SyncStatus::Synced);
    (harness, room)
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn add(holder: &ArchiveHolder, name: &str) {
    holder.update(|s| s.with_practitioner(PractitionerRecord::new(name)));
}

fn remote_archive() -> ArchiveState {
    ArchiveState::default().with_practitioner(PractitionerRecord::new("Remote"))
}

#[tokio::test(start_paused = true)]
async fn test_starts_local_from_seed() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    advance(20_000).await;

    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Local);
    assert!(status.room_id.is_none());
    assert_eq!(h.holder.current().practitioners[0].id, "1");
    assert_eq!(h.remote.calls(), Default::default());
}

#[tokio::test(start_paused = true)]
async fn test_local_edits_are_persisted_without_room() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    advance(10).await;

    add(&h.holder, "Li");
    advance(10).await;

    assert_eq!(h.local.load().unwrap(), Some(h.holder.current()));
    advance(5_000).await;
    assert_eq!(h.remote.calls().replaces, 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_room() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    advance(10).await;

    let link = h.handle.create_room().await.unwrap();
    let room = link.room().unwrap();
    assert!(link.as_str().contains("archive="));

    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Synced);
    assert_eq!(status.room_id, Some(room.clone()));
    assert_eq!(status.share_link, link.to_string());
    assert!(status.last_sync_time.is_some());
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));

    // the room is polled but nothing is pushed back
    advance(10_500).await;
    assert_eq!(h.remote.calls().fetches, 1);
    assert_eq!(h.remote.calls().replaces, 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_room_twice_is_rejected() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    h.handle.create_room().await.unwrap();

    assert_eq!(
        h.handle.create_room().await,
        Err(SyncError::RoomAlreadyActive)
    );
    assert_eq!(h.remote.calls().creates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_room_failure() {
    let remote = Arc::new(MemoryRemote::new());
    remote.fail_next_creates(1);
    let h = start(remote, base_link());

    let result = h.handle.create_room().await;
    assert!(matches!(result, Err(SyncError::Remote(_))));

    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Error);
    assert!(status.room_id.is_none());
    assert!(status.last_error.is_some());

    // a second attempt is allowed
    assert!(h.handle.create_room().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_join_replaces_local_archive() {
    let remote_state = remote_archive();
    let (h, _room) = joined(&remote_state).await;

    assert_eq!(h.holder.current(), remote_state);
    assert_eq!(h.local.load().unwrap(), Some(remote_state));
}

#[tokio::test(start_paused = true)]
async fn test_join_unknown_room_is_error_without_push() {
    let remote = Arc::new(MemoryRemote::new());
    let room = RoomId::new("missing").unwrap();
    let h = start(remote.clone(), base_link().with_room(&room));
    advance(10).await;

    assert_eq!(h.handle.status().status, SyncStatus::Error);

    add(&h.holder, "Li");
    advance(5_000).await;
    assert_eq!(remote.calls().replaces, 0);
    assert!(h.local.load_pending().unwrap().is_some());

    // once the room shows up, the next poll adopts it and the edit made
    // while it was unreachable is pushed on top
    remote.put_document(&room, &remote_archive()).unwrap();
    advance(5_500).await;
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
    assert!(h.holder.current().find("Li").is_some());

    advance(2_000).await;
    assert_eq!(remote.calls().replaces, 1);
    assert_eq!(remote.document(&room), Some(h.holder.current()));
    assert!(h.local.load_pending().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_local_edit_is_pushed_after_debounce() {
    let (h, room) = joined(&remote_archive()).await;

    add(&h.holder, "Li");
    advance(1_000).await;
    assert_eq!(h.remote.calls().replaces, 0);

    advance(600).await;
    assert_eq!(h.remote.calls().replaces, 1);
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_push() {
    let (h, room) = joined(&remote_archive()).await;

    for name in ["A", "B", "C", "D"] {
        add(&h.holder, name);
        advance(500).await;
    }
    advance(2_000).await;

    assert_eq!(h.remote.calls().replaces, 1);
    assert_eq!(
        h.remote.pushed(),
        vec![h.holder.current().canonical_json().unwrap()]
    );
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
}

#[tokio::test(start_paused = true)]
async fn test_own_push_is_not_echoed() {
    let (h, _room) = joined(&remote_archive()).await;

    add(&h.holder, "Li");
    advance(2_000).await;
    assert_eq!(h.remote.calls().replaces, 1);

    // several poll cycles return our own revision
    advance(35_000).await;
    assert!(h.remote.calls().fetches >= 4);
    assert_eq!(h.remote.calls().replaces, 1);
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_remote_change_wins_on_poll() {
    let (h, room) = joined(&remote_archive()).await;

    let peer = remote_archive().with_site_config(SiteConfig {
        header_title: "Peer title".to_string(),
        ..SiteConfig::default()
    });
    h.remote.put_document(&room, &peer).unwrap();

    advance(10_500).await;
    assert_eq!(h.holder.current(), peer);
    assert_eq!(h.local.load().unwrap(), Some(peer.clone()));

    // the pulled revision does not bounce back
    advance(15_000).await;
    assert_eq!(h.remote.calls().replaces, 0);
    assert_eq!(h.remote.document(&room), Some(peer));
}

#[tokio::test(start_paused = true)]
async fn test_poll_skipped_while_push_outstanding() {
    let (h, _room) = joined(&remote_archive()).await;
    let fetches_after_join = h.remote.calls().fetches;
    h.remote.set_latency(Duration::from_secs(15));

    add(&h.holder, "Li");
    advance(2_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Pushing);

    // the tick at 10s falls inside the push
    advance(10_000).await;
    assert_eq!(h.remote.calls().fetches, fetches_after_join);
    assert_eq!(h.remote.max_in_flight(), 1);

    advance(5_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
    assert_eq!(h.remote.calls().replaces, 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_skipped_while_join_outstanding() {
    let remote = Arc::new(MemoryRemote::new());
    let room = existing_room(&remote, &remote_archive()).await;
    remote.set_latency(Duration::from_secs(15));
    let h = start(remote.clone(), base_link().with_room(&room));

    // the tick at 10s falls inside the join
    advance(12_000).await;
    assert_eq!(remote.calls().fetches, 1);
    assert_eq!(h.handle.status().status, SyncStatus::Connecting);
    assert_eq!(remote.max_in_flight(), 1);

    advance(4_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
    assert_eq!(remote.calls().fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_push_waits_for_it() {
    let (h, room) = joined(&remote_archive()).await;
    h.remote.set_latency(Duration::from_secs(3));

    add(&h.holder, "A");
    advance(2_000).await;
    assert_eq!(h.remote.calls().replaces, 1);

    add(&h.holder, "B");
    advance(1_600).await;
    // debounce elapsed while the first push was still out
    assert_eq!(h.remote.max_in_flight(), 1);

    advance(6_000).await;
    assert_eq!(h.remote.calls().replaces, 2);
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_is_retried_on_next_poll() {
    let (h, room) = joined(&remote_archive()).await;
    h.remote.reject_next_pushes(1);

    add(&h.holder, "Li");
    advance(2_000).await;

    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Error);
    assert!(status.last_error.unwrap().contains("rejected"));
    assert_ne!(h.remote.document(&room), Some(h.holder.current()));

    let pending = h.local.load_pending().unwrap().unwrap();
    assert_eq!(pending.room, room);
    assert_eq!(pending.state, h.holder.current());

    advance(11_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
    assert_eq!(h.remote.calls().replaces, 2);
    assert!(h.local.load_pending().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_is_retried_on_next_edit() {
    let (h, room) = joined(&remote_archive()).await;
    h.remote.reject_next_pushes(1);

    add(&h.holder, "A");
    advance(2_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Error);

    add(&h.holder, "B");
    advance(2_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Synced);
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
}

#[tokio::test(start_paused = true)]
async fn test_unsent_edit_survives_restart() {
    let remote = Arc::new(MemoryRemote::new());
    let room = existing_room(&remote, &remote_archive()).await;
    let link = base_link().with_room(&room);
    let local = Arc::new(MemoryStore::new());

    let first = start_with(remote.clone(), local.clone(), link.clone());
    advance(10).await;
    remote.reject_next_pushes(1);
    add(&first.holder, "Unsent");
    let status = first.handle.flush().await.unwrap();
    assert_eq!(status.status, SyncStatus::Error);
    first.handle.shutdown().await;

    let pending = local.load_pending().unwrap().unwrap();
    assert_eq!(pending.room, room);
    assert!(pending.state.find("Unsent").is_some());

    // a new session on the same store pushes the edit once it has joined
    let second = start_with(remote.clone(), local.clone(), link);
    let status = second.handle.flush().await.unwrap();
    assert_eq!(status.status, SyncStatus::Synced);
    assert!(second.holder.current().find("Unsent").is_some());
    assert!(local.load().unwrap().unwrap().find("Unsent").is_some());
    assert_eq!(remote.document(&room), Some(second.holder.current()));
    assert!(local.load_pending().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unsent_edit_for_other_room_is_dropped() {
    let remote = Arc::new(MemoryRemote::new());
    let remote_state = remote_archive();
    let room = existing_room(&remote, &remote_state).await;
    let local = Arc::new(MemoryStore::new());
    local
        .save_pending(&PendingWrite {
            room: RoomId::new("elsewhere").unwrap(),
            state: ArchiveState::seed(),
        })
        .unwrap();

    let h = start_with(remote.clone(), local.clone(), base_link().with_room(&room));
    advance(10).await;

    assert_eq!(h.holder.current(), remote_state);
    assert!(local.load_pending().unwrap().is_none());
    advance(5_000).await;
    assert_eq!(remote.calls().replaces, 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_discards_unsent_edit() {
    let (h, _room) = joined(&remote_archive()).await;
    h.remote.reject_next_pushes(1);

    add(&h.holder, "Li");
    advance(2_000).await;
    assert!(h.local.load_pending().unwrap().is_some());

    h.handle.disconnect().await.unwrap();
    assert!(h.local.load_pending().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_does_not_change_status() {
    let (h, _room) = joined(&remote_archive()).await;
    h.remote.fail_next_fetches(1);

    advance(10_500).await;
    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Synced);
    assert!(status.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_flush_pushes_immediately() {
    let (h, room) = joined(&remote_archive()).await;

    add(&h.holder, "Li");
    let status = h.handle.flush().await.unwrap();

    assert_eq!(status.status, SyncStatus::Synced);
    assert_eq!(h.remote.document(&room), Some(h.holder.current()));
    assert_eq!(h.local.load().unwrap(), Some(h.holder.current()));

    // the debounce that was armed for the same edit finds nothing to do
    advance(3_000).await;
    assert_eq!(h.remote.calls().replaces, 1);
}

#[tokio::test(start_paused = true)]
async fn test_flush_waits_for_join() {
    let remote = Arc::new(MemoryRemote::new());
    let remote_state = remote_archive();
    let room = existing_room(&remote, &remote_state).await;
    remote.set_latency(Duration::from_secs(2));
    let h = start(remote, base_link().with_room(&room));

    let status = h.handle.flush().await.unwrap();
    assert_eq!(status.status, SyncStatus::Synced);
    assert_eq!(h.holder.current(), remote_state);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_sync() {
    let (h, room) = joined(&remote_archive()).await;
    let fetches = h.remote.calls().fetches;

    let link = h.handle.disconnect().await.unwrap();
    assert!(link.room().is_none());
    assert_eq!(link, base_link());
    assert_eq!(h.handle.status().status, SyncStatus::Local);

    add(&h.holder, "Li");
    advance(30_000).await;
    assert_eq!(h.remote.calls().replaces, 0);
    assert_eq!(h.remote.calls().fetches, fetches);
    assert_ne!(h.remote.document(&room), Some(h.holder.current()));
    assert_eq!(h.local.load().unwrap(), Some(h.holder.current()));
}

#[tokio::test(start_paused = true)]
async fn test_results_after_disconnect_are_discarded() {
    let (h, _room) = joined(&remote_archive()).await;
    h.remote.set_latency(Duration::from_secs(5));

    add(&h.holder, "Li");
    advance(2_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Pushing);

    h.handle.disconnect().await.unwrap();
    advance(5_000).await;

    let status = h.handle.status();
    assert_eq!(status.status, SyncStatus::Local);
    assert!(status.snapshot_fingerprint.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_create() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_latency(Duration::from_secs(5));
    let h = start(remote, base_link());
    advance(10).await;

    let creating = {
        let handle = h.handle.clone();
        tokio::spawn(async move { handle.create_room().await })
    };
    advance(1_000).await;
    assert_eq!(h.handle.status().status, SyncStatus::Connecting);

    h.handle.disconnect().await.unwrap();
    assert_eq!(creating.await.unwrap(), Err(SyncError::Cancelled));

    advance(10_000).await;
    assert!(h.handle.status().room_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_status_updates_are_published() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    let mut rx = h.handle.subscribe();
    rx.borrow_and_update();

    h.handle.create_room().await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status, SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_session() {
    let h = start(Arc::new(MemoryRemote::new()), base_link());
    let other = h.handle.clone();

    h.handle.shutdown().await;

    assert_eq!(other.flush().await, Err(SyncError::SessionClosed));
}
