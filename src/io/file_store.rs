use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::lock::FileLock;
use crate::io::store::{
    SnapshotEvent, StoreError, Subscription, TaskMap, TaskStore, apply_patches,
};
use crate::io::watcher::DocumentWatcher;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch, UserId};

const TASKS_FILE: &str = "tasks.json";

/// On-disk document for one user: `users/<user>/tasks.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    tasks: TaskMap,
}

impl Document {
    fn allocate_id(&mut self) -> TaskId {
        loop {
            self.next_id += 1;
            let id = TaskId::new(format!("t{}", self.next_id));
            if !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Task store backed by one JSON document per user under a data directory.
///
/// Every write is a locked read-modify-write followed by an atomic rename,
/// so concurrent `tf` processes see either the old or the new document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Self {
        FileStore {
            root: data_dir.to_path_buf(),
        }
    }

    /// Directory holding `user`'s document. User ids become directory
    /// names, so anything that could escape `users/` is refused.
    pub fn user_dir(&self, user: &UserId) -> Result<PathBuf, StoreError> {
        let id = user.as_str();
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
        if !valid {
            return Err(StoreError::InvalidUser(id.to_string()));
        }
        Ok(self.root.join("users").join(id))
    }

    /// Read the current document without subscribing.
    pub fn load(&self, user: &UserId) -> Result<TaskMap, StoreError> {
        let path = self.user_dir(user)?.join(TASKS_FILE);
        Ok(read_document(&path)?.tasks)
    }

    fn modify<T>(
        &self,
        user: &UserId,
        op: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let dir = self.user_dir(user)?;
        fs::create_dir_all(&dir).map_err(|source| StoreError::WriteError {
            path: dir.clone(),
            source,
        })?;
        let _lock = FileLock::acquire_default(&dir)?;

        let path = dir.join(TASKS_FILE);
        let mut doc = read_document(&path)?;
        let out = op(&mut doc)?;
        let content = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&path, &content).map_err(|source| StoreError::WriteError {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), tasks = doc.tasks.len(), "wrote task document");
        Ok(out)
    }
}

/// Read a task document; a missing file is an empty document.
fn read_document(path: &Path) -> Result<Document, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
        Err(source) => {
            return Err(StoreError::ReadError {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let mut doc: Document =
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    // The map key is authoritative
    for (id, task) in doc.tasks.iter_mut() {
        if task.id != *id {
            task.id = id.clone();
        }
    }
    Ok(doc)
}

/// Write to a temp file in the same directory, then rename over `path`.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl TaskStore for FileStore {
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError> {
        let dir = self.user_dir(user)?;
        fs::create_dir_all(&dir).map_err(|source| StoreError::WriteError {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(TASKS_FILE);

        let (tx, rx) = mpsc::channel();
        let initial = read_document(&path)?.tasks;
        let _ = tx.send(SnapshotEvent::Snapshot(initial.clone()));

        // Only forward documents that differ from the last one sent
        let last = Mutex::new(initial);
        let watched = path.clone();
        let watcher = DocumentWatcher::start(&dir, TASKS_FILE, move |change| {
            let event = match change.map_err(StoreError::from) {
                Ok(()) => match read_document(&watched) {
                    Ok(doc) => {
                        let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
                        if *last == doc.tasks {
                            return;
                        }
                        *last = doc.tasks.clone();
                        SnapshotEvent::Snapshot(doc.tasks)
                    }
                    Err(e) => SnapshotEvent::Error(e),
                },
                Err(e) => SnapshotEvent::Error(e),
            };
            if let SnapshotEvent::Error(e) = &event {
                warn!(path = %watched.display(), error = %e, "task document reload failed");
            }
            let _ = tx.send(event);
        })?;
        debug!(user = %user, path = %path.display(), "watching task document");
        Ok(Subscription::new(rx, Some(Box::new(watcher))))
    }

    fn create(&self, user: &UserId, fields: &NewTask) -> Result<TaskId, StoreError> {
        self.modify(user, |doc| {
            let id = doc.allocate_id();
            doc.tasks
                .insert(id.clone(), Task::from_new(id.clone(), fields.clone()));
            Ok(id)
        })
    }

    fn patch(&self, user: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.modify(user, |doc| {
            let task = doc
                .tasks
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.apply(patch);
            Ok(())
        })
    }

    fn patch_many(&self, user: &UserId, patches: &[(TaskId, TaskPatch)]) -> Result<(), StoreError> {
        if patches.is_empty() {
            return Ok(());
        }
        self.modify(user, |doc| apply_patches(&mut doc.tasks, patches))
    }

    fn delete(&self, user: &UserId, id: &TaskId) -> Result<(), StoreError> {
        self.modify(user, |doc| {
            doc.tasks
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        })
    }
}
