use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{activity::SignalOutcome, session::MonitorHandle};

/// Tracked file path → its live session. Shared by handle between the watch
/// state and the coordinator's event loop; the lock is never held across an
/// await.
#[derive(Clone, Default)]
pub struct TrackedFiles {
    inner: Arc<Mutex<HashMap<PathBuf, MonitorHandle>>>,
}

impl TrackedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MonitorHandle>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// True while a session for `path` is registered and still running.
    pub fn is_live(&self, path: &Path) -> bool {
        self.lock()
            .get(path)
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Register a session. Sessions that have already finished are dropped
    /// first, so the map holds live sessions plus those that ended since the
    /// last registration.
    pub fn insert(&self, path: PathBuf, handle: MonitorHandle) {
        let mut sessions = self.lock();
        sessions.retain(|_, existing| !existing.is_finished());
        sessions.insert(path, handle);
    }

    /// Drop every session that has already finished; returns how many went.
    pub fn prune_finished(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, existing| !existing.is_finished());
        before - sessions.len()
    }

    /// Forward an activity signal; `None` when the path is not tracked.
    pub fn signal(&self, path: &Path) -> Option<SignalOutcome> {
        self.lock().get(path).map(MonitorHandle::signal_activity)
    }

    /// Remove every entry, handing the sessions to the caller.
    pub fn drain(&self) -> Vec<(PathBuf, MonitorHandle)> {
        self.lock().drain().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// The single process-wide watch: which directory, which coordinator, which
/// files. Mutated only by the control handler while it holds the state lock.
#[derive(Default)]
pub struct WatchState {
    pub current_dir: Option<PathBuf>,
    pub coordinator: Option<super::DirectoryWatcher>,
    pub tracked: TrackedFiles,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }
}
