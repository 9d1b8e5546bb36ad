use std::path::PathBuf;

use chrono::Duration as ChronoDuration;
use tokio::time::Duration;

use crate::{
    activity::CloseReason,
    hashing::file_digest_async,
    models::{RawLog, ResultRecord, Session},
};

use super::SessionContext;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// What happened to one session, reported once it has been finalized.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub file_path: PathBuf,
    pub reason: CloseReason,
    pub duration_ms: i64,
    pub samples: usize,
    pub record_written: bool,
    pub raw_log_path: Option<PathBuf>,
}

/// Close the session for good: stamp the end time, hash the file again, then
/// write the result row and the raw log. Write failures are logged and
/// reflected in the outcome; nothing is retried.
pub(crate) async fn finalize_session(
    mut session: Session,
    elapsed: Duration,
    ctx: &SessionContext,
    reason: CloseReason,
) -> SessionOutcome {
    // Whole milliseconds on a monotonic clock: t1 - t0 is exact and never negative.
    let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
    session.ended_at = Some(session.started_at + ChronoDuration::milliseconds(elapsed_ms));
    session.hash_after = Some(file_digest_async(&session.file_path).await);

    let record_written = match ResultRecord::from_session(&session, &ctx.settings.labels) {
        Ok(record) => match ctx.output.append_result(record).await {
            Ok(()) => true,
            Err(err) => {
                log_error!("failed to save results for {}: {err:?}", session.file_path.display());
                false
            }
        },
        Err(err) => {
            log_error!("failed to build result record for session {}: {err:?}", session.id);
            false
        }
    };

    let raw_log_path = match RawLog::from_session(&session) {
        Ok(raw_log) => match ctx.output.write_raw_log(raw_log).await {
            Ok(path) => Some(path),
            Err(err) => {
                log_error!("failed to write raw log for session {}: {err:?}", session.id);
                None
            }
        },
        Err(err) => {
            log_error!("failed to build raw log for session {}: {err:?}", session.id);
            None
        }
    };

    if record_written {
        log_info!("Results saved for {}", session.file_path.display());
    }

    SessionOutcome {
        duration_ms: session.duration_ms().unwrap_or_default(),
        samples: session.series.len(),
        session_id: session.id,
        file_path: session.file_path,
        reason,
        record_written,
        raw_log_path,
    }
}
