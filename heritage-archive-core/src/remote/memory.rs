//! In-process remote store used by tests and offline demos.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use super::{RemoteError, RemoteStore};
use crate::models::ArchiveState;
use crate::room::RoomId;

/// How many times each operation has been invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub creates: usize,
    pub fetches: usize,
    pub replaces: usize,
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<RoomId, String>,
    next_id: u64,
    failing_creates: usize,
    failing_fetches: usize,
    rejected_pushes: usize,
    latency: Duration,
    calls: CallCounts,
    in_flight: usize,
    max_in_flight: usize,
    pushed: Vec<String>,
}

/// A remote store kept in memory, with knobs for latency and failures.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delay applied to every call before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn fail_next_creates(&self, n: usize) {
        self.lock().failing_creates = n;
    }

    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    pub fn reject_next_pushes(&self, n: usize) {
        self.lock().rejected_pushes = n;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Highest number of calls that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Bodies of every accepted replace, oldest first.
    pub fn pushed(&self) -> Vec<String> {
        self.lock().pushed.clone()
    }

    pub fn raw_document(&self, room: &RoomId) -> Option<String> {
        self.lock().docs.get(room).cloned()
    }

    pub fn document(&self, room: &RoomId) -> Option<ArchiveState> {
        self.raw_document(room)
            .and_then(|json| ArchiveState::from_json(&json).ok())
    }

    /// Writes a document directly, as another client would.
    pub fn put_document(&self, room: &RoomId, state: &ArchiveState) -> Result<(), serde_json::Error> {
        let json = state.canonical_json()?;
        self.lock().docs.insert(room.clone(), json);
        Ok(())
    }

    fn begin_call(&self, count: impl FnOnce(&mut CallCounts)) -> Duration {
        let mut inner = self.lock();
        count(&mut inner.calls);
        inner.in_flight += 1;
        inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
        inner.latency
    }

    async fn wait(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn create_room(&self, state: &ArchiveState) -> Result<RoomId, RemoteError> {
        let latency = self.begin_call(|c| c.creates += 1);
        Self::wait(latency).await;

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if inner.failing_creates > 0 {
            inner.failing_creates -= 1;
            return Err(RemoteError::RemoteUnavailable(
                "injected create failure".to_string(),
            ));
        }

        let json = state
            .canonical_json()
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;
        inner.next_id += 1;
        let room = RoomId::new(format!("room-{}", inner.next_id))
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;
        inner.docs.insert(room.clone(), json);
        Ok(room)
    }

    async fn fetch_room(&self, room: &RoomId) -> Result<ArchiveState, RemoteError> {
        let latency = self.begin_call(|c| c.fetches += 1);
        Self::wait(latency).await;

        let json = {
            let mut inner = self.lock();
            inner.in_flight -= 1;
            if inner.failing_fetches > 0 {
                inner.failing_fetches -= 1;
                return Err(RemoteError::RemoteUnavailable(
                    "injected fetch failure".to_string(),
                ));
            }
            inner
                .docs
                .get(room)
                .cloned()
                .ok_or_else(|| RemoteError::RoomNotFound(room.clone()))?
        };

        ArchiveState::from_json(&json).map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))
    }

    async fn replace_room(&self, room: &RoomId, state: &ArchiveState) -> Result<(), RemoteError> {
        let latency = self.begin_call(|c| c.replaces += 1);
        Self::wait(latency).await;

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if inner.rejected_pushes > 0 {
            inner.rejected_pushes -= 1;
            return Err(RemoteError::PushRejected {
                room: room.clone(),
                reason: "injected rejection".to_string(),
            });
        }
        if !inner.docs.contains_key(room) {
            return Err(RemoteError::PushRejected {
                room: room.clone(),
                reason: "unknown room".to_string(),
            });
        }

        let json = state
            .canonical_json()
            .map_err(|e| RemoteError::RemoteUnavailable(e.to_string()))?;
        inner.pushed.push(json.clone());
        inner.docs.insert(room.clone(), json);
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn create<'a>(&'a self, state: &'a ArchiveState) -> BoxFuture<'a, Result<RoomId, RemoteError>> {
        Box::pin(self.create_room(state))
    }

    fn fetch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<ArchiveState, RemoteError>> {
        Box::pin(self.fetch_room(room))
    }

    fn replace<'a>(
        &'a self,
        room: &'a RoomId,
        state: &'a ArchiveState,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.replace_room(room, state))
    }
}
