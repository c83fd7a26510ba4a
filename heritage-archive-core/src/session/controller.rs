//! The sync session task.
//!
//! One tokio task owns the session state and processes, one at a time:
//! commands from handles, change notifications from the archive holder,
//! the debounce timer, poll ticks, and the results of network calls it has
//! spawned. Network calls run in their own tasks so edits are never blocked
//! behind a slow remote.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use super::error::SyncError;
use super::machine::{PollOutcome, SessionCore};
use super::status::{SessionStatus, SyncStatus};
use crate::holder::ArchiveHolder;
use crate::local_store::{load_or_seed, LocalStore, PendingWrite};
use crate::models::{now_millis, ArchiveState};
use crate::remote::{RemoteError, RemoteStore};
use crate::room::{RoomId, ShareLink};
use crate::snapshot::Snapshot;

/// Default quiet period before a local edit is pushed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Default time between polls of the remote.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timing of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

enum Command {
    CreateRoom(oneshot::Sender<Result<ShareLink, SyncError>>),
    Disconnect(oneshot::Sender<ShareLink>),
    Flush(oneshot::Sender<SessionStatus>),
    Shutdown,
}

enum Outcome {
    Connected(Result<ArchiveState, RemoteError>),
    Created {
        snapshot: Snapshot,
        result: Result<RoomId, RemoteError>,
    },
    Pushed {
        snapshot: Snapshot,
        result: Result<(), RemoteError>,
    },
    Polled(Result<ArchiveState, RemoteError>),
}

/// A network result, tagged with the epoch it was issued in.
struct Completion {
    epoch: u64,
    outcome: Outcome,
}

/// Handle to a running sync session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::CreateRoom(_) => "CreateRoom",
            Command::Disconnect(_) => "Disconnect",
            Command::Flush(_) => "Flush",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    /// Creates a room seeded with the current archive and returns the link
    /// to share.
    pub async fn create_room(&self) -> Result<ShareLink, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::CreateRoom(tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)?
    }

    /// Leaves the current room and returns the link without it.
    pub async fn disconnect(&self) -> Result<ShareLink, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Disconnect(tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Pushes any unsent change right away and waits until the session is
    /// idle again.
    pub async fn flush(&self) -> Result<SessionStatus, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Stops the session task and waits for it to exit. Unsent changes are
    /// kept as a pending write and replayed the next time the room is joined.
    pub async fn shutdown(self) {
        if self.commands.send(Command::Shutdown).await.is_ok() {
            self.commands.closed().await;
        }
    }

    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }
}

/// Keeps an archive holder, the local store and one remote room in step.
pub struct SyncSession {
    core: SessionCore,
    holder: ArchiveHolder,
    changes: watch::Receiver<ArchiveState>,
    local: Arc<dyn LocalStore>,
    pending: Option<PendingWrite>,
    remote: Arc<dyn RemoteStore>,
    config: SessionConfig,
    status_tx: watch::Sender<SessionStatus>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    epoch: u64,
    debounce: Option<Pin<Box<Sleep>>>,
    poll: Option<Interval>,
    pending_create: Option<oneshot::Sender<Result<ShareLink, SyncError>>>,
    flush_waiters: Vec<oneshot::Sender<SessionStatus>>,
}

impl SyncSession {
    /// Loads the stored archive into `holder` and starts the session task.
    ///
    /// When `link` names a room the session joins it immediately; until the
    /// fetch completes the holder shows the locally stored revision.
    pub fn start(
        holder: ArchiveHolder,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        link: ShareLink,
        config: SessionConfig,
    ) -> SessionHandle {
        holder.replace(load_or_seed(local.as_ref()));
        let pending = match local.load_pending() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Ignoring unreadable pending write: {}", e);
                None
            }
        };
        let mut changes = holder.subscribe();
        changes.borrow_and_update();

        let core = SessionCore::new(link);
        let (status_tx, status_rx) = watch::channel(core.report());
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let session = SyncSession {
            core,
            holder,
            changes,
            local,
            pending,
            remote,
            config,
            status_tx,
            completions_tx,
            completions_rx,
            epoch: 0,
            debounce: None,
            poll: None,
            pending_create: None,
            flush_waiters: Vec::new(),
        };
        tokio::spawn(session.run(commands_rx));

        SessionHandle {
            commands: commands_tx,
            status: status_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.connect();
        self.publish();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion);
                }
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.handle_change();
                }
                _ = debounce_elapsed(&mut self.debounce) => {
                    self.debounce = None;
                    self.handle_debounce();
                }
                _ = poll_tick(&mut self.poll) => self.handle_poll_tick(),
            }

            self.drive_flush();
            self.publish();
        }

        if self.changes.has_changed().unwrap_or(false) {
            self.handle_change();
        }
        tracing::debug!("Sync session stopped");
    }

    fn connect(&mut self) {
        let Some(room) = self.core.begin_connect() else {
            tracing::debug!("No room in link, working locally");
            return;
        };
        tracing::info!("Joining room {}", room);

        let remote = self.remote.clone();
        self.spawn_call(async move { Outcome::Connected(remote.fetch(&room).await) });
        self.start_polling();
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!("Handling command {:?}", command);
        match command {
            Command::CreateRoom(reply) => self.create_room(reply),
            Command::Disconnect(reply) => {
                let link = self.disconnect();
                let _ = reply.send(link);
            }
            Command::Flush(reply) => {
                if self.changes.has_changed().unwrap_or(false) {
                    self.handle_change();
                }
                self.flush_waiters.push(reply);
                self.push_now();
            }
            Command::Shutdown => {}
        }
    }

    fn create_room(&mut self, reply: oneshot::Sender<Result<ShareLink, SyncError>>) {
        let state = self.holder.current();
        let snapshot = match Snapshot::of(&state) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let _ = reply.send(Err(RemoteError::RemoteUnavailable(e.to_string()).into()));
                return;
            }
        };

        if let Err(e) = self.core.begin_create() {
            let _ = reply.send(Err(e));
            return;
        }
        tracing::info!("Creating room");
        self.pending_create = Some(reply);

        let remote = self.remote.clone();
        self.spawn_call(async move {
            let result = remote.create(&state).await;
            Outcome::Created { snapshot, result }
        });
    }

    fn disconnect(&mut self) -> ShareLink {
        self.epoch += 1;
        self.debounce = None;
        self.poll = None;
        if let Some(reply) = self.pending_create.take() {
            let _ = reply.send(Err(SyncError::Cancelled));
        }
        if let Some(room) = self.core.room() {
            tracing::info!("Leaving room {}", room);
        }
        if self.pending.take().is_some() {
            self.clear_pending_write();
        }
        self.core.disconnect()
    }

    fn handle_change(&mut self) {
        let state = self.changes.borrow_and_update().clone();
        if let Err(e) = self.local.save(&state) {
            tracing::warn!("Failed to save archive locally: {}", e);
        }

        let Some(current) = current_snapshot(&state) else {
            self.debounce = None;
            return;
        };
        self.record_pending(&state, &current);

        if self.core.should_push(&current) {
            tracing::debug!("Local change pending, push in {:?}", self.config.debounce);
            self.arm_debounce();
        } else {
            self.debounce = None;
        }
    }

    /// Keeps the stored pending write equal to the revision the room has
    /// not seen, if any. Without a known room revision every edit counts as
    /// unsent.
    fn record_pending(&mut self, state: &ArchiveState, current: &Snapshot) {
        let Some(room) = self.core.room() else {
            return;
        };
        let unsent = (self.core.snapshot() != Some(current)).then(|| PendingWrite {
            room: room.clone(),
            state: state.clone(),
        });
        if unsent == self.pending {
            return;
        }

        let result = match &unsent {
            Some(pending) => self.local.save_pending(pending),
            None => self.local.clear_pending(),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to update pending write: {}", e);
        }
        self.pending = unsent;
    }

    fn refresh_pending(&mut self) {
        let state = self.holder.current();
        if let Some(current) = current_snapshot(&state) {
            self.record_pending(&state, &current);
        }
    }

    fn clear_pending_write(&self) {
        if let Err(e) = self.local.clear_pending() {
            tracing::warn!("Failed to clear pending write: {}", e);
        }
    }

    /// Installs the first revision fetched from the room. A pending write
    /// for the same room is replayed over it and pushed; one for another
    /// room is dropped.
    fn adopt(&mut self, fetched: ArchiveState) {
        let replay = match self.pending.take() {
            Some(pending) if Some(&pending.room) == self.core.room() => {
                if pending.state != fetched {
                    Some(pending)
                } else {
                    self.clear_pending_write();
                    None
                }
            }
            Some(pending) => {
                tracing::warn!("Dropping unsent changes for room {}", pending.room);
                self.clear_pending_write();
                None
            }
            None => None,
        };

        match replay {
            Some(pending) => {
                tracing::info!("Replaying unsent changes for room {}", pending.room);
                self.holder.replace(pending.state.clone());
                self.pending = Some(pending);
            }
            None => self.holder.replace(fetched),
        }
    }

    fn handle_debounce(&mut self) {
        let state = self.holder.current();
        let Some(current) = current_snapshot(&state) else {
            return;
        };
        if !self.core.should_push(&current) {
            tracing::debug!("Pending change already matches remote, dropping push");
            return;
        }
        if self.core.is_busy() {
            tracing::debug!("Remote call outstanding, deferring push");
            self.arm_debounce();
            return;
        }
        self.start_push(state, current);
    }

    /// Starts a push of the current revision if it has unsent changes and
    /// nothing else is outstanding.
    fn push_now(&mut self) {
        let state = self.holder.current();
        let Some(current) = current_snapshot(&state) else {
            return;
        };
        if self.core.should_push(&current) && !self.core.is_busy() {
            self.debounce = None;
            self.start_push(state, current);
        }
    }

    fn start_push(&mut self, state: ArchiveState, snapshot: Snapshot) {
        let Some(room) = self.core.begin_push() else {
            return;
        };
        tracing::debug!("Pushing revision {} to room {}", snapshot.fingerprint(), room);

        let remote = self.remote.clone();
        self.spawn_call(async move {
            let result = remote.replace(&room, &state).await;
            Outcome::Pushed { snapshot, result }
        });
    }

    fn handle_poll_tick(&mut self) {
        let Some(room) = self.core.begin_poll() else {
            tracing::debug!("Remote call outstanding, skipping poll");
            return;
        };

        let remote = self.remote.clone();
        self.spawn_call(async move { Outcome::Polled(remote.fetch(&room).await) });
    }

    fn handle_completion(&mut self, completion: Completion) {
        if completion.epoch != self.epoch {
            tracing::debug!("Discarding result issued before disconnect");
            return;
        }

        match completion.outcome {
            Outcome::Connected(Ok(state)) => {
                let Some(fetched) = current_snapshot(&state) else {
                    return;
                };
                tracing::info!("Joined room, revision {}", fetched.fingerprint());
                self.core.connect_succeeded(fetched, now_millis());
                self.debounce = None;
                self.adopt(state);
            }
            Outcome::Connected(Err(e)) => {
                tracing::warn!("Failed to join room: {}", e);
                self.core.connect_failed(&e);
            }
            Outcome::Created {
                snapshot,
                result: Ok(room),
            } => {
                tracing::info!("Created room {}", room);
                self.core.create_succeeded(room, snapshot, now_millis());
                if let Some(reply) = self.pending_create.take() {
                    let _ = reply.send(Ok(self.core.link().clone()));
                }
                self.start_polling();

                // edits made while the room was being created
                let state = self.holder.current();
                if let Some(current) = current_snapshot(&state) {
                    self.record_pending(&state, &current);
                    if self.core.should_push(&current) {
                        self.arm_debounce();
                    }
                }
            }
            Outcome::Created {
                result: Err(e), ..
            } => {
                tracing::warn!("Failed to create room: {}", e);
                self.core.create_failed(&e);
                if let Some(reply) = self.pending_create.take() {
                    let _ = reply.send(Err(e.into()));
                }
            }
            Outcome::Pushed {
                snapshot,
                result: Ok(()),
            } => {
                tracing::debug!("Pushed revision {}", snapshot.fingerprint());
                self.core.push_succeeded(snapshot, now_millis());
                self.refresh_pending();
            }
            Outcome::Pushed {
                result: Err(e), ..
            } => {
                tracing::warn!("Push failed, will retry: {}", e);
                self.core.push_failed(&e);
            }
            Outcome::Polled(Ok(state)) => self.apply_poll(state),
            Outcome::Polled(Err(e)) => {
                tracing::warn!("Poll failed: {}", e);
                self.core.poll_failed();
            }
        }
    }

    fn apply_poll(&mut self, fetched_state: ArchiveState) {
        let current_state = self.holder.current();
        let (Some(fetched), Some(current)) = (
            current_snapshot(&fetched_state),
            current_snapshot(&current_state),
        ) else {
            self.core.poll_failed();
            return;
        };

        let first_revision = self.core.snapshot().is_none();
        match self.core.apply_poll(fetched, &current, now_millis()) {
            PollOutcome::RemoteChanged if first_revision => {
                tracing::info!("Room is reachable, adopting its archive");
                self.debounce = None;
                self.adopt(fetched_state);
            }
            PollOutcome::RemoteChanged => {
                tracing::info!("Remote archive changed, replacing local copy");
                self.debounce = None;
                self.holder.replace(fetched_state);
            }
            PollOutcome::Unchanged => {
                if self.debounce.is_none() && self.core.should_push(&current) {
                    tracing::debug!("Unsent change found on poll, scheduling push");
                    self.arm_debounce();
                }
            }
        }
    }

    /// Answers flush waiters once nothing is outstanding.
    fn drive_flush(&mut self) {
        if self.flush_waiters.is_empty() || self.core.is_busy() {
            return;
        }
        if self.core.status() != SyncStatus::Error {
            self.push_now();
            if self.core.is_busy() {
                return;
            }
        }

        let report = self.core.report();
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(report.clone());
        }
    }

    fn arm_debounce(&mut self) {
        self.debounce = Some(Box::pin(tokio::time::sleep(self.config.debounce)));
    }

    fn start_polling(&mut self) {
        let period = self.config.poll_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poll = Some(interval);
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let outcome = call.await;
            let _ = tx.send(Completion { epoch, outcome });
        });
    }

    fn publish(&self) {
        let report = self.core.report();
        self.status_tx.send_if_modified(|status| {
            if *status == report {
                false
            } else {
                *status = report;
                true
            }
        });
    }
}

fn current_snapshot(state: &ArchiveState) -> Option<Snapshot> {
    match Snapshot::of(state) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!("Failed to serialize archive: {}", e);
            None
        }
    }
}

async fn debounce_elapsed(debounce: &mut Option<Pin<Box<Sleep>>>) {
    match debounce {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn poll_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
