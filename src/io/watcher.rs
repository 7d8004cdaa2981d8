use std::ffi::OsString;
use std::path::Path;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches one file inside a directory and calls back when it changes.
///
/// The directory is watched rather than the file because atomic writes
/// replace the file by rename.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
}

impl DocumentWatcher {
    /// Start watching `dir/file_name`. `on_change` runs on the watcher
    /// thread; a watch error is passed through instead of a change.
    pub fn start<F>(dir: &Path, file_name: &str, on_change: F) -> Result<Self, notify::Error>
    where
        F: Fn(Result<(), notify::Error>) + Send + 'static,
    {
        let target = OsString::from(file_name);

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => return on_change(Err(e)),
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                // Skip the lock file and temp files from atomic writes
                let relevant = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(target.as_os_str()));
                if relevant {
                    on_change(Ok(()));
                }
            },
            Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(DocumentWatcher { _watcher: watcher })
    }
}
