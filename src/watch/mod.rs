mod coordinator;
mod filter;
mod state;

pub use coordinator::DirectoryWatcher;
#[cfg(test)]
pub(crate) use coordinator::dispatch;
pub use filter::LogFileFilter;
pub use state::{TrackedFiles, WatchState};
