use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{SubsecRound, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    activity::{activity_channel, ActivitySender, ActivityTracker, CloseReason, SignalOutcome},
    hashing::file_digest_async,
    metrics::{ResourceSampler, SampleSeries},
    models::Session,
};

use super::finalize::{finalize_session, SessionOutcome};
use super::SessionContext;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Runs one session end to end: hash, sample while the file stays active,
/// then finalize exactly once however the session was closed.
pub struct FileMonitor {
    session: Session,
    started: Instant,
    ctx: SessionContext,
    activity_tx: ActivitySender,
    tracker: ActivityTracker,
    cancel_token: CancellationToken,
    sampler: ResourceSampler,
    file_watcher: Option<RecommendedWatcher>,
}

impl FileMonitor {
    pub fn new(file_path: PathBuf, ctx: SessionContext) -> Self {
        let (activity_tx, activity_rx) = activity_channel();
        let tracker = ActivityTracker::new(activity_rx, ctx.settings.inactivity);

        Self {
            session: Session::new(file_path, Utc::now().trunc_subsecs(3)),
            started: Instant::now(),
            ctx,
            activity_tx,
            tracker,
            cancel_token: CancellationToken::new(),
            sampler: ResourceSampler::new(),
            file_watcher: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn file_path(&self) -> &Path {
        &self.session.file_path
    }

    pub fn activity_sender(&self) -> ActivitySender {
        self.activity_tx.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the session as its own task.
    pub fn spawn(self) -> MonitorHandle {
        let session_id = self.session.id.clone();
        let activity = self.activity_sender();
        let cancel_token = self.cancel_token();

        MonitorHandle {
            session_id,
            activity,
            cancel_token,
            task: Some(tokio::spawn(self.run())),
        }
    }

    pub async fn run(mut self) -> SessionOutcome {
        log_info!("Monitoring started for {}", self.session.file_path.display());

        self.session.hash_before = file_digest_async(&self.session.file_path).await;
        self.start();

        let reason = self.tracker.run(&self.cancel_token).await;
        match reason {
            CloseReason::Inactive => {
                log_info!(
                    "No activity for {}s on {}, finalizing",
                    self.ctx.settings.inactivity.as_secs_f64(),
                    self.session.file_path.display()
                )
            }
            CloseReason::Cancelled => {
                log_info!("Monitoring cancelled for {}", self.session.file_path.display())
            }
        }

        self.session.series = self.shutdown_children().await;

        let elapsed = self.started.elapsed();
        finalize_session(self.session, elapsed, &self.ctx, reason).await
    }

    fn start(&mut self) {
        let probe = (self.ctx.probes)();
        if let Err(err) = self.sampler.start(probe, self.ctx.settings.sample_interval) {
            log_error!("resource sampler failed to start for session {}: {err:?}", self.session.id);
        }

        if self.ctx.settings.watch_file_directly {
            match watch_single_file(&self.session.file_path, self.activity_tx.clone()) {
                Ok(watcher) => self.file_watcher = Some(watcher),
                Err(err) => log_warn!(
                    "per-file watch unavailable for {}: {err:?}",
                    self.session.file_path.display()
                ),
            }
        }
    }

    /// Stop the sampler and wait for it, then drop the per-file watch.
    async fn shutdown_children(&mut self) -> SampleSeries {
        let series = match self.sampler.stop().await {
            Ok(series) => series,
            Err(err) => {
                log_error!("sampler for session {} did not stop cleanly: {err:?}", self.session.id);
                SampleSeries::new()
            }
        };
        self.file_watcher.take();
        series
    }
}

/// Forward modifications of exactly `path` into its activity channel.
fn watch_single_file(path: &Path, activity: ActivitySender) -> Result<RecommendedWatcher> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?
        .to_path_buf();
    let target = path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Modify(_))
                && event.paths.iter().any(|changed| *changed == target)
            {
                activity.signal();
            }
        }
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&parent, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", parent.display()))?;

    Ok(watcher)
}

/// What the coordinator keeps for a running session.
#[derive(Debug)]
pub struct MonitorHandle {
    session_id: String,
    activity: ActivitySender,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl MonitorHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fire-and-forget; dropped when a signal is already pending.
    pub fn signal_activity(&self) -> SignalOutcome {
        self.activity.signal()
    }

    /// Force the session closed. Cancelling twice, or after the session
    /// already ended, does nothing.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait until the session has been finalized.
    pub async fn join(mut self) -> Result<SessionOutcome> {
        let task = self
            .task
            .take()
            .ok_or_else(|| anyhow!("session {} was already joined", self.session_id))?;
        task.await
            .with_context(|| format!("session {} task failed", self.session_id))
    }
}
