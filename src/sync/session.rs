use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::io::store::{SnapshotEvent, StoreError, Subscription, TaskMap, TaskStore};
use crate::model::config::SyncConfig;
use crate::model::notification::Notification;
use crate::model::task::{Partition, Task, TaskId, UserId};
use crate::ops::migrate::plan_migration;
use crate::ops::task_ops::{self, Change, Plan, TaskEdit, TaskError};
use crate::util::clock::{Clock, SystemClock};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The intent failed validation; nothing changed.
    #[error(transparent)]
    Rejected(#[from] TaskError),
    /// The store refused the write; local state was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One user's live task list.
///
/// Mutations show up in `tasks()` before the store confirms them. A failed
/// write restores the list as it was before the mutation, and every snapshot
/// from the subscription replaces the list outright.
pub struct Session<S: TaskStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    user: UserId,
    settings: SyncConfig,
    tasks: Arc<Vec<Task>>,
    subscription: Option<Subscription>,
    notifications: Vec<Notification>,
    loaded: bool,
    provisional: u64,
}

impl<S: TaskStore> Session<S> {
    pub fn new(store: S, user: UserId, settings: SyncConfig) -> Self {
        Session::with_clock(store, user, settings, SystemClock)
    }
}

impl<S: TaskStore, C: Clock> Session<S, C> {
    pub fn with_clock(store: S, user: UserId, settings: SyncConfig, clock: C) -> Self {
        Session {
            store,
            clock,
            user,
            settings,
            tasks: Arc::new(Vec::new()),
            subscription: None,
            notifications: Vec::new(),
            loaded: false,
            provisional: 0,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Current list. Cheap to clone and unaffected by later mutations.
    pub fn tasks(&self) -> Arc<Vec<Task>> {
        Arc::clone(&self.tasks)
    }

    /// Notifications raised since the last call, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // -----------------------------------------------------------------------
    // Subscription
    // -----------------------------------------------------------------------

    /// Subscribe to the user's document and load the first snapshot.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let subscription = self.store.subscribe(&self.user)?;
        self.subscription = Some(subscription);
        self.pump()?;
        Ok(())
    }

    /// Apply every queued snapshot. Returns how many were applied.
    pub fn pump(&mut self) -> Result<usize, SessionError> {
        let events = match &self.subscription {
            Some(sub) => sub.poll(),
            None => return Ok(0),
        };
        self.handle_events(events)
    }

    /// Block up to `timeout` for the next snapshot, then drain the queue.
    pub fn wait(&mut self, timeout: Duration) -> Result<usize, SessionError> {
        let first = match &self.subscription {
            Some(sub) => sub.wait(timeout),
            None => return Ok(0),
        };
        let mut events: Vec<SnapshotEvent> = first.into_iter().collect();
        if let Some(sub) = &self.subscription {
            events.extend(sub.poll());
        }
        self.handle_events(events)
    }

    fn handle_events(&mut self, events: Vec<SnapshotEvent>) -> Result<usize, SessionError> {
        let mut applied = 0;
        let mut failure = None;
        for event in events {
            match event {
                SnapshotEvent::Snapshot(map) => {
                    applied += 1;
                    if let Err(e) = self.load_snapshot(map) {
                        failure.get_or_insert(e);
                    }
                }
                SnapshotEvent::Error(e) => {
                    warn!(user = %self.user, error = %e, "subscription error");
                    failure.get_or_insert(SessionError::Store(e));
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    /// Replace local state with a store snapshot, then promote anything
    /// that has come due.
    pub fn load_snapshot(&mut self, snapshot: TaskMap) -> Result<(), SessionError> {
        debug!(user = %self.user, tasks = snapshot.len(), "snapshot loaded");
        self.tasks = Arc::new(snapshot.into_values().collect());
        self.loaded = true;
        if self.settings.auto_migrate {
            self.migrate()?;
        }
        Ok(())
    }

    /// Re-run auto-migration, e.g. when the app returns to the foreground
    /// after midnight.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.loaded && self.settings.auto_migrate {
            self.migrate()?;
        }
        Ok(())
    }

    /// Move every due postponed task into today. Returns how many moved.
    pub fn migrate(&mut self) -> Result<usize, SessionError> {
        let Some(plan) = plan_migration(&self.tasks, self.clock.today()) else {
            return Ok(0);
        };
        let moved = plan.batch.len();
        self.apply_plan(plan)?;
        info!(user = %self.user, moved, "migrated postponed tasks into today");
        Ok(moved)
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Add a task and return the id the store assigned.
    pub fn add_task(
        &mut self,
        text: &str,
        due_date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<TaskId, SessionError> {
        let plan = task_ops::add_task(
            &self.tasks,
            text,
            due_date,
            description,
            self.clock.today(),
            self.clock.now_ms(),
        )?;
        let created = self.apply_plan(plan)?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::Store(StoreError::Unavailable("no id assigned".into())))
    }

    pub fn edit_task(&mut self, id: &TaskId, edit: TaskEdit) -> Result<(), SessionError> {
        let plan = task_ops::edit_task(&self.tasks, id, edit, self.clock.today())?;
        self.apply_plan(plan)?;
        Ok(())
    }

    pub fn toggle_complete(&mut self, id: &TaskId) -> Result<(), SessionError> {
        let plan = task_ops::toggle_complete(&self.tasks, id, self.clock.today())?;
        self.apply_plan(plan)?;
        Ok(())
    }

    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), SessionError> {
        let plan = task_ops::delete_task(&self.tasks, id)?;
        self.apply_plan(plan)?;
        Ok(())
    }

    pub fn move_task(
        &mut self,
        id: &TaskId,
        target: Partition,
        index: usize,
    ) -> Result<(), SessionError> {
        let plan = task_ops::move_task(&self.tasks, id, target, index)?;
        self.apply_plan(plan)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Optimistic apply
    // -----------------------------------------------------------------------

    /// Show `plan` locally, write it, and undo the local part the store
    /// refused. Returns store ids of created tasks.
    pub fn apply_plan(&mut self, plan: Plan) -> Result<Vec<TaskId>, SessionError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            user = %self.user,
            changes = plan.changes.len(),
            batch = plan.batch.len(),
            "applying plan"
        );

        let before = Arc::clone(&self.tasks);
        let mut staged = (*before).clone();
        let counter = &mut self.provisional;
        let provisional = plan.apply_changes(&mut staged, || {
            *counter += 1;
            TaskId::new(format!("pending-{}", counter))
        });
        if !plan.delay_batch {
            plan.apply_batch(&mut staged);
        }
        self.tasks = Arc::new(staged);

        let created = match self.write_changes(&plan.changes) {
            Ok(created) => created,
            Err(e) => {
                warn!(user = %self.user, error = %e, "write failed, rolling back");
                self.tasks = before;
                return Err(e.into());
            }
        };
        for (temp, real) in provisional.iter().zip(&created) {
            self.rename_task(temp, real);
        }

        if !plan.batch.is_empty() {
            if plan.delay_batch {
                if self.settings.cascade_delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(self.settings.cascade_delay_ms));
                }
                plan.apply_batch(Arc::make_mut(&mut self.tasks).as_mut_slice());
            }
            if let Err(e) = self.store.patch_many(&self.user, &plan.batch) {
                warn!(user = %self.user, error = %e, "batch write failed, rolling back batch");
                self.restore_from(&before, plan.batch.iter().map(|(id, _)| id));
                return Err(e.into());
            }
        }

        if let Some(notification) = plan.notification {
            self.notifications.push(notification);
        }
        Ok(created)
    }

    /// Issue the sequential writes. Returns ids of created tasks in order.
    fn write_changes(&self, changes: &[Change]) -> Result<Vec<TaskId>, StoreError> {
        let mut created = Vec::new();
        for change in changes {
            match change {
                Change::Create(fields) => created.push(self.store.create(&self.user, fields)?),
                Change::Patch { id, patch } => self.store.patch(&self.user, id, patch)?,
                Change::Delete(id) => self.store.delete(&self.user, id)?,
            }
        }
        Ok(created)
    }

    fn rename_task(&mut self, from: &TaskId, to: &TaskId) {
        let tasks = Arc::make_mut(&mut self.tasks);
        for task in tasks.iter_mut() {
            if &task.id == from {
                task.id = to.clone();
            }
            if task.blocked_by.as_ref() == Some(from) {
                task.blocked_by = Some(to.clone());
            }
        }
    }

    /// Put the listed tasks back the way they were in `snapshot`.
    fn restore_from<'a>(&mut self, snapshot: &[Task], ids: impl Iterator<Item = &'a TaskId>) {
        let tasks = Arc::make_mut(&mut self.tasks);
        for id in ids {
            let Some(old) = snapshot.iter().find(|t| &t.id == id) else {
                continue;
            };
            if let Some(slot) = tasks.iter_mut().find(|t| &t.id == id) {
                *slot = old.clone();
            }
        }
    }
}
