mod finalize;
mod monitor;

pub use finalize::SessionOutcome;
pub use monitor::{FileMonitor, MonitorHandle};

use std::sync::Arc;

use crate::{metrics::ProbeFactory, output::OutputStore, settings::MonitorSettings};

/// Everything a session needs from the outside world. Cheap to clone.
#[derive(Clone)]
pub struct SessionContext {
    pub settings: Arc<MonitorSettings>,
    pub output: OutputStore,
    pub probes: ProbeFactory,
}

impl SessionContext {
    pub fn new(settings: MonitorSettings, output: OutputStore, probes: ProbeFactory) -> Self {
        Self {
            settings: Arc::new(settings),
            output,
            probes,
        }
    }
}
