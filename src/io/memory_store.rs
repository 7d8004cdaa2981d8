use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::io::store::{
    SnapshotEvent, StoreError, Subscription, TaskMap, TaskStore, apply_patches,
};
use crate::model::task::{NewTask, Task, TaskId, TaskPatch, UserId};

/// In-process store with live snapshot fan-out.
///
/// Writes can be made to fail on demand, which stands in for a network or
/// permission failure of a hosted store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserDoc>,
    offline: bool,
    fail_next: usize,
    fail_batches: bool,
}

#[derive(Default)]
struct UserDoc {
    tasks: TaskMap,
    next_id: u64,
    subscribers: Vec<mpsc::Sender<SnapshotEvent>>,
}

impl UserDoc {
    /// Next free `t{n}` id; seeded documents may already hold some.
    fn allocate_id(&mut self) -> TaskId {
        loop {
            self.next_id += 1;
            let id = TaskId::new(format!("t{}", self.next_id));
            if !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    fn broadcast(&mut self) {
        let snapshot = self.tasks.clone();
        self.subscribers
            .retain(|tx| tx.send(SnapshotEvent::Snapshot(snapshot.clone())).is_ok());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's document with existing tasks.
    pub fn with_tasks(self, user: &UserId, tasks: Vec<Task>) -> Self {
        {
            let mut inner = self.lock();
            let doc = inner.users.entry(user.clone()).or_default();
            for task in tasks {
                doc.tasks.insert(task.id.clone(), task);
            }
        }
        self
    }

    /// While offline every write fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Fail the next `n` writes, then recover.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Make every `patch_many` fail while single writes still succeed.
    pub fn fail_batches(&self, failing: bool) {
        self.lock().fail_batches = failing;
    }

    /// Current document for `user`
    pub fn snapshot(&self, user: &UserId) -> TaskMap {
        self.lock()
            .users
            .get(user)
            .map(|doc| doc.tasks.clone())
            .unwrap_or_default()
    }

    /// Replace a user's document as if another client wrote it, notifying
    /// subscribers.
    pub fn replace_remote(&self, user: &UserId, tasks: Vec<Task>) {
        let mut inner = self.lock();
        let doc = inner.users.entry(user.clone()).or_default();
        doc.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        doc.broadcast();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a write against a user's document and broadcast on success.
    fn write<T>(
        &self,
        user: &UserId,
        op: impl FnOnce(&mut UserDoc) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.lock();
        if inner.offline {
            return Err(StoreError::Unavailable("offline".into()));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        let doc = inner.users.entry(user.clone()).or_default();
        let out = op(doc)?;
        doc.broadcast();
        Ok(out)
    }
}

impl TaskStore for MemoryStore {
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();
        let doc = inner.users.entry(user.clone()).or_default();
        let _ = tx.send(SnapshotEvent::Snapshot(doc.tasks.clone()));
        doc.subscribers.push(tx);
        debug!(user = %user, "memory store subscription opened");
        Ok(Subscription::new(rx, None))
    }

    fn create(&self, user: &UserId, fields: &NewTask) -> Result<TaskId, StoreError> {
        self.write(user, |doc| {
            let id = doc.allocate_id();
            doc.tasks
                .insert(id.clone(), Task::from_new(id.clone(), fields.clone()));
            Ok(id)
        })
    }

    fn patch(&self, user: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.write(user, |doc| {
            let task = doc
                .tasks
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.apply(patch);
            Ok(())
        })
    }

    fn patch_many(&self, user: &UserId, patches: &[(TaskId, TaskPatch)]) -> Result<(), StoreError> {
        if self.lock().fail_batches {
            return Err(StoreError::Unavailable("batch write rejected".into()));
        }
        self.write(user, |doc| apply_patches(&mut doc.tasks, patches))
    }

    fn delete(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError> {
        self.write(user, |doc| {
            doc.tasks
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        })
    }
}
