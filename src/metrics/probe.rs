use std::sync::{Arc, Mutex};

use sysinfo::System;

use super::types::ResourceSample;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of host CPU/RAM readings. Called from the blocking pool.
pub trait SystemProbe: Send + Sync {
    fn sample(&self) -> ResourceSample;
}

/// Builds one probe per session so CPU deltas are measured against that
/// session's own previous refresh.
pub type ProbeFactory = Arc<dyn Fn() -> Arc<dyn SystemProbe> + Send + Sync>;

pub fn sysinfo_probe_factory() -> ProbeFactory {
    Arc::new(|| Arc::new(SysinfoProbe::new()) as Arc<dyn SystemProbe>)
}

/// Host-wide probe backed by `sysinfo`.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Initial refresh to establish baseline for CPU calculation
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for SysinfoProbe {
    fn sample(&self) -> ResourceSample {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpus = system.cpus();
        let cpu_percent = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        ResourceSample {
            cpu_percent,
            memory_mb: system.used_memory() as f64 / BYTES_PER_MB,
        }
    }
}
