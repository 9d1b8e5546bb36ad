use std::{path::PathBuf, sync::Arc};

use log::{info, warn};
use tokio::sync::Mutex;

use crate::{
    session::{SessionContext, SessionOutcome},
    watch::{DirectoryWatcher, TrackedFiles, WatchState},
};

use super::protocol::{parse_command, ControlCommand, ControlError, ControlResponse};

/// Serializes every watch change in the process. Clones share one state.
#[derive(Clone)]
pub struct WatchController {
    state: Arc<Mutex<WatchState>>,
    ctx: SessionContext,
}

impl WatchController {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            state: Arc::new(Mutex::new(WatchState::new())),
            ctx,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// One request in, one response out. Never fails.
    pub async fn handle_message(&self, text: &str) -> ControlResponse {
        match parse_command(text) {
            Ok(command) => self.execute(command).await,
            Err(err) => {
                warn!("Rejected control message: {err}");
                ControlResponse::error(&err)
            }
        }
    }

    pub async fn execute(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::SetWatchPath { path } => {
                info!("Command received: watch path {path}");
                match self.set_watch_path(PathBuf::from(path)).await {
                    Ok(path) => ControlResponse::ok(format!("Now watching {}", path.display())),
                    Err(err) => {
                        warn!("SetWatchPath failed: {err}");
                        ControlResponse::error(&err)
                    }
                }
            }
        }
    }

    /// Switch the watch to `path`.
    ///
    /// The state lock is held for the whole switch, so a concurrent command
    /// waits until every session of the previous watch has been finalized
    /// and the new watch is installed. An invalid path leaves the current
    /// watch untouched.
    pub async fn set_watch_path(&self, path: PathBuf) -> Result<PathBuf, ControlError> {
        let mut state = self.state.lock().await;

        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ControlError::NotADirectory(path.display().to_string()));
        }

        if let Some(previous) = state.coordinator.take() {
            let outcomes = previous.shutdown().await;
            info!("Previous watch stopped, {} sessions finalized", outcomes.len());
        }
        state.current_dir = None;
        state.tracked.clear();

        let coordinator = DirectoryWatcher::start(path.clone(), self.ctx.clone(), state.tracked.clone())
            .map_err(|err| ControlError::WatchFailed(format!("{err:#}")))?;

        state.coordinator = Some(coordinator);
        state.current_dir = Some(path.clone());
        Ok(path)
    }

    pub async fn current_dir(&self) -> Option<PathBuf> {
        self.state.lock().await.current_dir.clone()
    }

    pub async fn tracked_files(&self) -> TrackedFiles {
        self.state.lock().await.tracked.clone()
    }

    /// Tear down the current watch, finalizing its sessions.
    pub async fn shutdown(&self) -> Vec<SessionOutcome> {
        let mut state = self.state.lock().await;
        state.current_dir = None;
        match state.coordinator.take() {
            Some(coordinator) => coordinator.shutdown().await,
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ResourceSample, SystemProbe};
    use crate::output::{OutputLayout, OutputStore};
    use crate::settings::MonitorSettings;
    use notify::event::CreateKind;
    use notify::{Event, EventKind};
    use std::sync::Arc;
    use std::time::Duration;

    struct ZeroProbe;

    impl SystemProbe for ZeroProbe {
        fn sample(&self) -> ResourceSample {
            ResourceSample {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            }
        }
    }

    fn controller(outdir: &std::path::Path) -> WatchController {
        let layout = OutputLayout::prepare(outdir, chrono::Local::now()).unwrap();
        let settings = MonitorSettings {
            inactivity: Duration::from_secs(60),
            sample_interval: Duration::from_millis(50),
            ..MonitorSettings::default()
        };
        WatchController::new(SessionContext::new(
            settings,
            OutputStore::open(layout).unwrap(),
            Arc::new(|| Arc::new(ZeroProbe) as Arc<dyn SystemProbe>),
        ))
    }

    fn set_watch(path: &std::path::Path) -> String {
        serde_json::json!({ "command": "SetWatchPath", "path": path }).to_string()
    }

    #[tokio::test]
    async fn invalid_directory_keeps_current_watch() {
        let outdir = tempfile::tempdir().unwrap();
        let watched = tempfile::tempdir().unwrap();
        let controller = controller(outdir.path());

        assert!(controller.handle_message(&set_watch(watched.path())).await.is_ok());

        let response = controller
            .handle_message(r#"{"command":"SetWatchPath","path":"/not/a/dir"}"#)
            .await;
        assert!(!response.is_ok());
        assert_eq!(response.message, "not a valid directory: /not/a/dir");
        assert_eq!(controller.current_dir().await, Some(watched.path().to_path_buf()));

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_messages_do_not_touch_state() {
        let outdir = tempfile::tempdir().unwrap();
        let controller = controller(outdir.path());

        let response = controller.handle_message("{oops").await;
        assert_eq!(response.message, "invalid format");
        let response = controller.handle_message(r#"{"command":"Reboot"}"#).await;
        assert_eq!(response.message, "unknown command");

        assert_eq!(controller.current_dir().await, None);
    }

    #[tokio::test]
    async fn switching_finalizes_active_sessions_before_success() {
        let outdir = tempfile::tempdir().unwrap();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let controller = controller(outdir.path());

        assert!(controller.handle_message(&set_watch(first.path())).await.is_ok());

        let tracked = controller.tracked_files().await;
        for name in ["a.log", "b.log", "c.txt"] {
            let path = first.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            let event = Event::new(EventKind::Create(CreateKind::File)).add_path(path);
            crate::watch::dispatch(event, controller.context(), &tracked);
        }
        assert_eq!(tracked.len(), 3);

        let response = controller.handle_message(&set_watch(second.path())).await;
        assert!(response.is_ok(), "{response:?}");

        let rows = csv::Reader::from_path(controller.context().output.results_path())
            .unwrap()
            .records()
            .count();
        assert_eq!(rows, 3);
        assert!(tracked.is_empty());
        assert_eq!(controller.current_dir().await, Some(second.path().to_path_buf()));

        controller.shutdown().await;
    }
}
