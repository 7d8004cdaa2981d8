use std::any::Any;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::io::lock::LockError;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch, UserId};

/// Every task of one user, keyed by id, as delivered by the store.
pub type TaskMap = IndexMap<TaskId, Task>;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt task document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid user id: {0:?}")]
    InvalidUser(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What a subscription delivers: a complete snapshot, never a delta.
#[derive(Debug)]
pub enum SnapshotEvent {
    Snapshot(TaskMap),
    Error(StoreError),
}

/// Live feed of snapshots for one user. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::Receiver<SnapshotEvent>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    /// Wrap a receiver. `guard` is kept alive for as long as the
    /// subscription (e.g. the file watcher feeding the channel).
    pub fn new(rx: mpsc::Receiver<SnapshotEvent>, guard: Option<Box<dyn Any + Send>>) -> Self {
        Subscription { rx, _guard: guard }
    }

    /// Non-blocking poll for pending events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<SnapshotEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block up to `timeout` for the next event.
    pub fn wait(&self, timeout: Duration) -> Option<SnapshotEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// The persistence collaborator: a per-user task document with live
/// snapshots.
pub trait TaskStore {
    /// Start receiving full snapshots. The current snapshot is delivered
    /// first.
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError>;

    /// Persist a new task and return its generated id.
    fn create(&self, user: &UserId, fields: &NewTask) -> Result<TaskId, StoreError>;

    fn patch(&self, user: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError>;

    /// Apply several patches as one write.
    fn patch_many(&self, user: &UserId, patches: &[(TaskId, TaskPatch)]) -> Result<(), StoreError>;

    fn delete(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError>;
}

impl<S: TaskStore + ?Sized> TaskStore for &S {
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError> {
        (**self).subscribe(user)
    }

    fn create(&self, user: &UserId, fields: &NewTask) -> Result<TaskId, StoreError> {
        (**self).create(user, fields)
    }

    fn patch(&self, user: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        (**self).patch(user, id, patch)
    }

    fn patch_many(&self, user: &UserId, patches: &[(TaskId, TaskPatch)]) -> Result<(), StoreError> {
        (**self).patch_many(user, patches)
    }

    fn delete(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError> {
        (**self).delete(user, id)
    }
}

/// Apply patches to a task map, failing before any change if an id is
/// missing.
pub fn apply_patches(map: &mut TaskMap, patches: &[(TaskId, TaskPatch)]) -> Result<(), StoreError> {
    if let Some((id, _)) = patches.iter().find(|(id, _)| !map.contains_key(id)) {
        return Err(StoreError::NotFound(id.clone()));
    }
    for (id, patch) in patches {
        if let Some(task) = map.get_mut(id) {
            task.apply(patch);
        }
    }
    Ok(())
}
