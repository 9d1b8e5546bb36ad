use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::{FileMonitor, SessionContext, SessionOutcome};

use super::state::TrackedFiles;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Watches one directory (non-recursively). New log files get their own
/// session; modifications of tracked files become activity signals.
pub struct DirectoryWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    cancel_token: CancellationToken,
    event_loop: Option<JoinHandle<()>>,
    tracked: TrackedFiles,
}

impl DirectoryWatcher {
    pub fn start(path: PathBuf, ctx: SessionContext, tracked: TrackedFiles) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // notify calls back on its own thread; hand events to the async side.
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => log::error!("directory watch error: {err:?}"),
            }
        })
        .context("failed to create directory watcher")?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;

        let cancel_token = CancellationToken::new();
        let event_loop = tokio::spawn(event_loop(
            event_rx,
            ctx,
            tracked.clone(),
            cancel_token.clone(),
        ));

        log_info!("Now watching directory {}", path.display());

        Ok(Self {
            path,
            watcher: Some(watcher),
            cancel_token,
            event_loop: Some(event_loop),
            tracked,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tracked(&self) -> &TrackedFiles {
        &self.tracked
    }

    /// Stop watching, then cancel every still-running session and wait until
    /// each one has been finalized. Sessions that had already closed on their
    /// own were finalized back then and are not reported again.
    pub async fn shutdown(mut self) -> Vec<SessionOutcome> {
        log_info!("Stopping directory watcher for {}", self.path.display());

        self.watcher.take();
        self.cancel_token.cancel();
        if let Some(event_loop) = self.event_loop.take() {
            if let Err(err) = event_loop.await {
                log_error!("directory event loop failed to join: {err}");
            }
        }

        let sessions: Vec<_> = self
            .tracked
            .drain()
            .into_iter()
            .filter(|(_, handle)| !handle.is_finished())
            .collect();
        for (_, handle) in &sessions {
            handle.cancel();
        }

        let mut outcomes = Vec::with_capacity(sessions.len());
        for (path, handle) in sessions {
            match handle.join().await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => log_error!("session for {} ended abnormally: {err:?}", path.display()),
            }
        }

        log_info!(
            "Directory watcher for {} stopped, {} sessions finalized",
            self.path.display(),
            outcomes.len()
        );
        outcomes
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        // Without an orderly shutdown, at least make sure nothing keeps running.
        self.cancel_token.cancel();
        if self.event_loop.is_some() {
            for (_, handle) in self.tracked.drain() {
                handle.cancel();
            }
        }
    }
}

async fn event_loop(
    mut events: mpsc::UnboundedReceiver<Event>,
    ctx: SessionContext,
    tracked: TrackedFiles,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            received = events.recv() => match received {
                Some(event) => dispatch(event, &ctx, &tracked),
                None => break,
            },
        }
    }
}

/// Apply one filesystem event to the tracked set.
pub(crate) fn dispatch(event: Event, ctx: &SessionContext, tracked: &TrackedFiles) {
    match event.kind {
        EventKind::Create(_) => {
            for path in event.paths {
                if !ctx.settings.filter.is_log_file(&path) || tracked.is_live(&path) {
                    continue;
                }

                log_info!("New log file detected: {}", path.display());
                let handle = FileMonitor::new(path.clone(), ctx.clone()).spawn();
                tracked.insert(path, handle);
            }
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                if !ctx.settings.filter.matches_name(path) {
                    continue;
                }
                if let Some(outcome) = tracked.signal(path) {
                    log_debug!("activity on {}: {outcome:?}", path.display());
                }
            }
        }
        _ => {}
    }
}
