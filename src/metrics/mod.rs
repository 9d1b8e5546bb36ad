mod probe;
mod sampler;
mod types;

pub use probe::{sysinfo_probe_factory, ProbeFactory, SysinfoProbe, SystemProbe};
pub use sampler::{sampling_loop, ResourceSampler};
pub use types::{ResourceSample, SampleSeries, SeriesStats};
