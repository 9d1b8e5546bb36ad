mod tracker;

pub use tracker::{
    activity_channel, ActivitySender, ActivityState, ActivityTracker, CloseReason, SignalOutcome,
};
