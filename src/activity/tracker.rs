use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_debug;

// Stand-in deadline when `last_activity + window` does not fit in an Instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A full inactivity window passed without a consumed signal.
    Inactive,
    /// Forced closed from outside (watch switch, shutdown).
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    /// A signal was already pending; this one was dropped.
    Coalesced,
    /// The tracker is gone.
    Closed,
}

/// Producer side of a tracker's capacity-one activity channel.
#[derive(Debug, Clone)]
pub struct ActivitySender {
    tx: mpsc::Sender<()>,
}

impl ActivitySender {
    /// Non-blocking. Never fails; a full channel drops the signal.
    pub fn signal(&self) -> SignalOutcome {
        match self.tx.try_send(()) {
            Ok(()) => SignalOutcome::Delivered,
            Err(TrySendError::Full(())) => SignalOutcome::Coalesced,
            Err(TrySendError::Closed(())) => SignalOutcome::Closed,
        }
    }
}

pub fn activity_channel() -> (ActivitySender, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (ActivitySender { tx }, rx)
}

/// Liveness of one file: ACTIVE until the inactivity window elapses with no
/// consumed signal, or until cancelled. CLOSED is terminal.
#[derive(Debug)]
pub struct ActivityTracker {
    signals: mpsc::Receiver<()>,
    window: Duration,
    last_activity: Instant,
    closed: Option<CloseReason>,
}

impl ActivityTracker {
    pub fn new(signals: mpsc::Receiver<()>, window: Duration) -> Self {
        Self {
            signals,
            window,
            last_activity: Instant::now(),
            closed: None,
        }
    }

    pub fn state(&self) -> ActivityState {
        if self.closed.is_some() {
            ActivityState::Closed
        } else {
            ActivityState::Active
        }
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Wait until the tracker closes and report why.
    ///
    /// A consumed signal restarts the window from the moment it was consumed.
    /// A timer wakeup only closes the tracker once the full window has really
    /// elapsed since the last consumed signal. Running a closed tracker again
    /// returns the original reason immediately.
    pub async fn run(&mut self, cancel_token: &CancellationToken) -> CloseReason {
        if let Some(reason) = self.closed {
            return reason;
        }

        let mut signals_open = true;

        loop {
            let deadline = self
                .last_activity
                .checked_add(self.window)
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE);

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    return self.close(CloseReason::Cancelled);
                }
                received = self.signals.recv(), if signals_open => {
                    match received {
                        Some(()) => {
                            self.last_activity = Instant::now();
                            log_debug!("activity consumed, window restarted");
                        }
                        // Every producer is gone; only the timer can close us now.
                        None => signals_open = false,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    if self.last_activity.elapsed() >= self.window {
                        return self.close(CloseReason::Inactive);
                    }
                    log_debug!("early inactivity wakeup ignored");
                }
            }
        }
    }

    fn close(&mut self, reason: CloseReason) -> CloseReason {
        self.closed = Some(reason);
        self.signals.close();
        reason
    }
}
